use std::ops::Range;
use std::thread;

use crate::base::*;

impl RowChunks {
    /// Split `n_rows` into at most `n_workers` contiguous chunks of equal width (the last one may be shorter)
    pub fn new(n_rows: usize, n_workers: usize) -> Result<Self> {
        if n_workers == 0 {
            return Err(PcaError::InvalidThreadCount);
        }
        let width = ((n_rows + n_workers - 1) / n_workers).max(1);
        let starts = (0..n_rows).step_by(width).collect::<Vec<usize>>();
        Ok(RowChunks { starts, width })
    }

    pub fn n_chunks(&self) -> usize {
        self.starts.len()
    }

    /// Every row in 0..n_rows must belong to exactly one chunk
    pub fn validate(&self, n_rows: usize) -> Result<()> {
        let invalid = |reason: String| PcaError::InvalidChunking { n_rows, reason };
        if self.width == 0 {
            return Err(invalid("chunk width is zero".to_owned()));
        }
        let mut expected_start: usize = 0;
        for &start in self.starts.iter() {
            if start >= n_rows {
                return Err(invalid(format!("chunk start {} is out of range", start)));
            }
            if start < expected_start {
                return Err(invalid(format!("chunk starting at {} overlaps the previous chunk", start)));
            }
            if start > expected_start {
                return Err(invalid(format!("rows {}..{} are not covered", expected_start, start)));
            }
            expected_start = (start + self.width).min(n_rows);
        }
        if expected_start != n_rows {
            return Err(invalid(format!("rows {}..{} are not covered", expected_start, n_rows)));
        }
        Ok(())
    }

    pub fn ranges(&self, n_rows: usize) -> Vec<Range<usize>> {
        self.starts
            .iter()
            .map(|&start| start..(start + self.width).min(n_rows))
            .collect()
    }
}

/// Evaluate `row_statistic` for every row, one scoped worker thread per chunk.
/// Each worker writes only the accumulator slots of its own rows; all workers are joined before returning.
pub fn reduce_rows<F>(n_rows: usize, chunks: &RowChunks, row_statistic: F) -> Result<Vec<f64>>
where
    F: Fn(usize) -> f64 + Sync,
{
    chunks.validate(n_rows)?;
    let mut accumulator: Vec<f64> = vec![0.0; n_rows];
    let row_statistic = &row_statistic;
    thread::scope(|scope| {
        let mut remaining: &mut [f64] = &mut accumulator;
        for range in chunks.ranges(n_rows) {
            let (slots, rest) = std::mem::take(&mut remaining).split_at_mut(range.len());
            remaining = rest;
            scope.spawn(move || {
                for (slot, i) in slots.iter_mut().zip(range) {
                    *slot = row_statistic(i);
                }
            });
        }
    });
    Ok(accumulator)
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_row_chunks() {
        let chunks = RowChunks::new(10, 3).unwrap();
        assert_eq!(chunks.width, 4);
        assert_eq!(chunks.starts, vec![0, 4, 8]);
        assert_eq!(chunks.ranges(10), vec![0..4, 4..8, 8..10]);
        assert!(chunks.validate(10).is_ok());
        // More workers than rows
        let chunks = RowChunks::new(2, 8).unwrap();
        assert_eq!(chunks.n_chunks(), 2);
        assert!(chunks.validate(2).is_ok());
        // No rows at all
        let chunks = RowChunks::new(0, 4).unwrap();
        assert_eq!(chunks.n_chunks(), 0);
        assert!(chunks.validate(0).is_ok());
        assert!(matches!(
            RowChunks::new(10, 0),
            Err(PcaError::InvalidThreadCount)
        ));
    }

    #[test]
    fn test_invalid_row_chunks() {
        let gap = RowChunks {
            starts: vec![0, 5],
            width: 3,
        };
        let overlap = RowChunks {
            starts: vec![0, 2, 4],
            width: 3,
        };
        let short = RowChunks {
            starts: vec![0],
            width: 3,
        };
        let out_of_range = RowChunks {
            starts: vec![0, 6],
            width: 6,
        };
        let zero_width = RowChunks {
            starts: vec![0],
            width: 0,
        };
        for chunks in [gap, overlap, short, out_of_range, zero_width] {
            assert!(matches!(
                chunks.validate(6),
                Err(PcaError::InvalidChunking { n_rows: 6, .. })
            ));
            assert!(reduce_rows(6, &chunks, |i| i as f64).is_err());
        }
    }

    #[test]
    fn test_every_row_written_once() {
        let n_rows = 37;
        for n_workers in 1..=8 {
            let chunks = RowChunks::new(n_rows, n_workers).unwrap();
            let out = reduce_rows(n_rows, &chunks, |i| i as f64 + 1.0).unwrap();
            assert_eq!(
                out,
                (1..=n_rows).map(|i| i as f64).collect::<Vec<f64>>()
            );
        }
    }
}
