use ndarray::prelude::*;

use crate::base::*;
use crate::reduction::*;

fn check_same_shape(a: &ArrayView2<f64>, b: &ArrayView2<f64>) -> Result<()> {
    if a.dim() != b.dim() {
        return Err(PcaError::ShapeMismatch {
            expected: a.shape().to_vec(),
            found: b.shape().to_vec(),
        });
    }
    Ok(())
}

fn check_not_empty(a: &ArrayView2<f64>) -> Result<()> {
    if a.is_empty() {
        return Err(PcaError::InvalidInput(
            "cannot average over an empty matrix".to_owned(),
        ));
    }
    Ok(())
}

/// Sum of squared differences per row
fn squared_error_per_row(
    a: ArrayView2<f64>,
    b: ArrayView2<f64>,
    chunks: &RowChunks,
) -> Result<Vec<f64>> {
    reduce_rows(a.nrows(), chunks, |i| {
        a.row(i)
            .iter()
            .zip(b.row(i).iter())
            .fold(0.0, |sum, (&x, &y)| sum + (x - y).powi(2))
    })
}

/// Root mean squared error between two matrices of the same shape
pub fn rmse(a: ArrayView2<f64>, b: ArrayView2<f64>, chunks: &RowChunks) -> Result<f64> {
    check_same_shape(&a, &b)?;
    check_not_empty(&a)?;
    let per_row = squared_error_per_row(a, b, chunks)?;
    Ok((per_row.iter().sum::<f64>() / a.len() as f64).sqrt())
}

/// Root mean squared error between two vectors, reduced as single-column matrices
pub fn rmse_1d(a: ArrayView1<f64>, b: ArrayView1<f64>, chunks: &RowChunks) -> Result<f64> {
    rmse(a.insert_axis(Axis(1)), b.insert_axis(Axis(1)), chunks)
}

/// Mean absolute error between two matrices of the same shape
pub fn mae(a: ArrayView2<f64>, b: ArrayView2<f64>, chunks: &RowChunks) -> Result<f64> {
    check_same_shape(&a, &b)?;
    check_not_empty(&a)?;
    let per_row = reduce_rows(a.nrows(), chunks, |i| {
        a.row(i)
            .iter()
            .zip(b.row(i).iter())
            .fold(0.0, |sum, (&x, &y)| sum + (x - y).abs())
    })?;
    Ok(per_row.iter().sum::<f64>() / a.len() as f64)
}

/// Frobenius norm of the difference between two matrices of the same shape
pub fn frobenius_distance(
    a: ArrayView2<f64>,
    b: ArrayView2<f64>,
    chunks: &RowChunks,
) -> Result<f64> {
    check_same_shape(&a, &b)?;
    let per_row = squared_error_per_row(a, b, chunks)?;
    Ok(per_row.iter().sum::<f64>().sqrt())
}

pub fn frobenius_norm(a: ArrayView2<f64>, chunks: &RowChunks) -> Result<f64> {
    let per_row = reduce_rows(a.nrows(), chunks, |i| {
        a.row(i).iter().fold(0.0, |sum, &x| sum + x.powi(2))
    })?;
    Ok(per_row.iter().sum::<f64>().sqrt())
}
