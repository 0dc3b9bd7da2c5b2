use ndarray::prelude::*;
use ndarray_linalg::{Eigh, UPLO};

use crate::base::*;

/// Default selection of the number of principal components.
///
/// Under no structure the eigenvalues of the covariance of n individuals across m standardised
/// sites follow the Marchenko-Pastur law, whose upper edge is sigma^2 (1 + sqrt(n/m))^2. Noise
/// variance sigma^2 is taken as the mean eigenvalue, which overestimates it in the presence of
/// structure and so errs on the side of fewer components. Components above the edge are retained.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MarchenkoPasturEdge;

impl MarchenkoPasturEdge {
    pub fn edge(&self, eigenvalues: ArrayView1<f64>, n_individuals: usize, n_sites: usize) -> f64 {
        let noise = eigenvalues.mean().unwrap_or(0.0);
        let ratio = n_individuals as f64 / n_sites.max(1) as f64;
        noise * (1.00 + ratio.sqrt()).powi(2)
    }
}

impl SelectComponentCount for MarchenkoPasturEdge {
    fn select_component_count(
        &self,
        eigenvalues: ArrayView1<f64>,
        n_individuals: usize,
        n_sites: usize,
    ) -> usize {
        let edge = self.edge(eigenvalues, n_individuals, n_sites);
        if !(edge > 0.0) {
            return 0;
        }
        eigenvalues.iter().take_while(|&&x| x > edge).count()
    }
}

/// Eigenvalues in decreasing order and the matching eigenvectors as columns
pub fn symmetric_eigendecomposition(covariance: &Array2<f64>) -> Result<(Array1<f64>, Array2<f64>)> {
    if !covariance.is_square() {
        return Err(PcaError::ShapeMismatch {
            expected: vec![covariance.nrows(), covariance.nrows()],
            found: covariance.shape().to_vec(),
        });
    }
    if covariance.iter().any(|x| !x.is_finite()) {
        return Err(PcaError::Eigendecomposition(
            "the covariance matrix has non-finite entries".to_owned(),
        ));
    }
    let (values, vectors) = covariance
        .eigh(UPLO::Lower)
        .map_err(|e| PcaError::Eigendecomposition(e.to_string()))?;
    if values.iter().any(|x| !x.is_finite()) {
        return Err(PcaError::Eigendecomposition(
            "non-finite eigenvalues".to_owned(),
        ));
    }
    // LAPACK returns the eigenvalues in ascending order
    let order = (0..values.len()).rev().collect::<Vec<usize>>();
    Ok((values.select(Axis(0), &order), vectors.select(Axis(1), &order)))
}

/// The top `k` eigenvectors (n x k) of the covariance matrix
pub fn leading_eigenvectors(covariance: &Array2<f64>, k: usize) -> Result<Array2<f64>> {
    let (_, vectors) = symmetric_eigendecomposition(covariance)?;
    if k > vectors.ncols() {
        return Err(PcaError::TooManyComponents {
            requested: k,
            maximum: vectors.ncols(),
        });
    }
    Ok(vectors.slice(s![.., ..k]).to_owned())
}

/// Number of components chosen by `selector` from the spectrum of `covariance`, capped at n - 1
pub fn select_component_count<S>(
    covariance: &Array2<f64>,
    n_sites: usize,
    selector: &S,
) -> Result<usize>
where
    S: SelectComponentCount + ?Sized,
{
    let (values, _) = symmetric_eigendecomposition(covariance)?;
    let n = values.len();
    let k = selector.select_component_count(values.view(), n, n_sites);
    Ok(k.min(n.saturating_sub(1)))
}
