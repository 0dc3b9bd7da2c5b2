//! Genotype likelihood container and the posterior quantities every estimator builds on

use ndarray::{prelude::*, Zip};
use rayon::ThreadPool;

use crate::base::*;

impl GenotypeLikelihoods {
    pub fn new(likelihoods: Array3<f64>) -> Result<Self> {
        let (n, m, k) = likelihoods.dim();
        if k != 3 {
            return Err(PcaError::ShapeMismatch {
                expected: vec![n, m, 3],
                found: vec![n, m, k],
            });
        }
        if likelihoods.iter().any(|&x| !x.is_finite() || (x < 0.0)) {
            return Err(PcaError::InvalidInput(
                "genotype likelihoods must be finite and non-negative".to_owned(),
            ));
        }
        Ok(GenotypeLikelihoods { likelihoods })
    }

    /// From an individuals x (3 x sites) matrix where site j occupies columns 3j, 3j+1, and 3j+2
    pub fn from_interleaved(matrix: &Array2<f64>) -> Result<Self> {
        let (n, c) = matrix.dim();
        if c % 3 != 0 {
            return Err(PcaError::InvalidInput(format!(
                "the number of likelihood columns ({}) is not a multiple of 3",
                c
            )));
        }
        let m = c / 3;
        GenotypeLikelihoods::new(Array3::from_shape_fn((n, m, 3), |(i, j, k)| {
            matrix[(i, (3 * j) + k)]
        }))
    }

    /// From three individuals x sites matrices, one per genotype class
    pub fn from_genotype_classes(
        hom_ref: &Array2<f64>,
        het: &Array2<f64>,
        hom_alt: &Array2<f64>,
    ) -> Result<Self> {
        let dim = hom_ref.dim();
        for other in [het, hom_alt] {
            if other.dim() != dim {
                return Err(PcaError::ShapeMismatch {
                    expected: vec![dim.0, dim.1],
                    found: other.shape().to_vec(),
                });
            }
        }
        GenotypeLikelihoods::new(Array3::from_shape_fn(
            (dim.0, dim.1, 3),
            |(i, j, k)| match k {
                0 => hom_ref[(i, j)],
                1 => het[(i, j)],
                _ => hom_alt[(i, j)],
            },
        ))
    }

    pub fn n_individuals(&self) -> usize {
        self.likelihoods.dim().0
    }

    pub fn n_sites(&self) -> usize {
        self.likelihoods.dim().1
    }

    /// Likelihoods of all individuals at one site (n x 3)
    pub fn site(&self, j: usize) -> ArrayView2<f64> {
        self.likelihoods.index_axis(Axis(1), j)
    }

    pub fn select_sites(&self, idx: &[usize]) -> Self {
        GenotypeLikelihoods {
            likelihoods: self.likelihoods.select(Axis(1), idx),
        }
    }

    fn check_priors(&self, priors: &ArrayView2<f64>) -> Result<()> {
        let expected = (self.n_individuals(), self.n_sites());
        if priors.dim() != expected {
            return Err(PcaError::ShapeMismatch {
                expected: vec![expected.0, expected.1],
                found: priors.shape().to_vec(),
            });
        }
        Ok(())
    }

    /// Posterior mean dosages (n x m) under per-individual, per-site allele frequency priors (n x m)
    pub fn posterior_dosages(
        &self,
        priors: ArrayView2<f64>,
        pool: &ThreadPool,
    ) -> Result<Array2<f64>> {
        self.check_priors(&priors)?;
        let mut dosages: Array2<f64> = Array2::zeros(priors.dim());
        pool.install(|| {
            Zip::indexed(&mut dosages)
                .and(priors)
                .par_for_each(|(i, j), d, &a| {
                    *d = posterior_dosage(self.likelihoods.slice(s![i, j, ..]), a);
                })
        });
        Ok(dosages)
    }

    /// Posterior genotype probabilities (n x m x 3) under per-individual, per-site priors (n x m)
    pub fn posterior_probabilities(
        &self,
        priors: ArrayView2<f64>,
        pool: &ThreadPool,
    ) -> Result<Array3<f64>> {
        self.check_priors(&priors)?;
        let mut posteriors: Array3<f64> = Array3::zeros(self.likelihoods.dim());
        pool.install(|| {
            Zip::indexed(posteriors.lanes_mut(Axis(2)))
                .and(priors)
                .par_for_each(|(i, j), mut p, &a| {
                    let q = posterior_genotype_probabilities(self.likelihoods.slice(s![i, j, ..]), a);
                    for k in 0..3 {
                        p[k] = q[k];
                    }
                })
        });
        Ok(posteriors)
    }
}

/// Population allele frequencies repeated for every individual, clipped to valid priors
pub fn population_priors(frequencies: &Array1<f64>, n_individuals: usize) -> Array2<f64> {
    Array2::from_shape_fn((n_individuals, frequencies.len()), |(_, j)| {
        clip_frequency(frequencies[j])
    })
}
