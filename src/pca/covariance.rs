use ndarray::{prelude::*, Zip};
use rayon::ThreadPool;

use crate::base::*;

fn check_sites(n_sites: usize, frequencies: &Array1<f64>) -> Result<()> {
    if frequencies.len() != n_sites {
        return Err(PcaError::ShapeMismatch {
            expected: vec![n_sites],
            found: vec![frequencies.len()],
        });
    }
    Ok(())
}

/// Per-site binomial standard deviations, failing on the first site that cannot be standardised
fn dosage_scales(frequencies: &Array1<f64>) -> Result<Vec<f64>> {
    frequencies
        .iter()
        .enumerate()
        .map(|(j, &f)| {
            let sd = dosage_standard_deviation(f);
            if (sd > 0.0) && sd.is_finite() {
                Ok(sd)
            } else {
                Err(PcaError::DegenerateSite(j))
            }
        })
        .collect()
}

/// Centre dosages by 2f and scale by sqrt(2f(1-f)) using the population allele frequencies
pub fn standardise_dosages(
    dosages: &Array2<f64>,
    frequencies: &Array1<f64>,
    pool: &ThreadPool,
) -> Result<Array2<f64>> {
    check_sites(dosages.ncols(), frequencies)?;
    let scales = dosage_scales(frequencies)?;
    let mut standardised: Array2<f64> = Array2::zeros(dosages.dim());
    pool.install(|| {
        Zip::indexed(&mut standardised)
            .and(dosages)
            .par_for_each(|(_, j), x, &e| {
                *x = (e - 2.00 * clip_frequency(frequencies[j])) / scales[j];
            })
    });
    Ok(standardised)
}

/// Expected squared standardised genotype of each individual averaged across sites,
/// with genotype posteriors computed under per-individual priors
pub fn posterior_diagonal(
    likelihoods: &GenotypeLikelihoods,
    priors: ArrayView2<f64>,
    frequencies: &Array1<f64>,
    pool: &ThreadPool,
) -> Result<Array1<f64>> {
    let (n, m) = (likelihoods.n_individuals(), likelihoods.n_sites());
    check_sites(m, frequencies)?;
    if priors.dim() != (n, m) {
        return Err(PcaError::ShapeMismatch {
            expected: vec![n, m],
            found: priors.shape().to_vec(),
        });
    }
    let scales = dosage_scales(frequencies)?;
    let mut diagonal: Array1<f64> = Array1::zeros(n);
    pool.install(|| {
        Zip::indexed(&mut diagonal).par_for_each(|i, d| {
            let mut sum = 0.0;
            for j in 0..m {
                let centre = 2.00 * clip_frequency(frequencies[j]);
                let p = posterior_genotype_probabilities(
                    likelihoods.likelihoods.slice(s![i, j, ..]),
                    priors[(i, j)],
                );
                let expected_square = (p[0] * centre.powi(2))
                    + (p[1] * (1.00 - centre).powi(2))
                    + (p[2] * (2.00 - centre).powi(2));
                sum += expected_square / scales[j].powi(2);
            }
            *d = sum / m as f64;
        })
    });
    Ok(diagonal)
}

/// Individual x individual covariance of standardised dosages, X X' / m, symmetric by construction
pub fn covariance_matrix(standardised: &Array2<f64>) -> Array2<f64> {
    let m = standardised.ncols().max(1) as f64;
    let c = standardised.dot(&standardised.t()) / m;
    (&c + &c.t()) / 2.00
}

/// Covariance matrix for one step of the structure engine. Dosages are standardised with the
/// population frequencies, and the diagonal optionally uses the posterior expectation under `priors`.
pub fn estimate_covariance(
    likelihoods: &GenotypeLikelihoods,
    dosages: &Array2<f64>,
    priors: ArrayView2<f64>,
    frequencies: &Array1<f64>,
    use_posterior_diagonal: bool,
    pool: &ThreadPool,
) -> Result<Array2<f64>> {
    let standardised = standardise_dosages(dosages, frequencies, pool)?;
    let mut covariance = covariance_matrix(&standardised);
    if use_posterior_diagonal {
        let diagonal = posterior_diagonal(likelihoods, priors, frequencies, pool)?;
        covariance.diag_mut().assign(&diagonal);
    }
    Ok(covariance)
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_standardise_dosages() {
        let pool = build_thread_pool(2).unwrap();
        let dosages = array![[0.0, 1.0], [2.0, 1.0]];
        let frequencies = array![0.5, 0.5];
        let x = standardise_dosages(&dosages, &frequencies, &pool).unwrap();
        let s = 0.5f64.sqrt();
        assert!((x[(0, 0)] + 1.0 / s).abs() < 1e-12);
        assert!((x[(1, 0)] - 1.0 / s).abs() < 1e-12);
        assert_eq!(x[(0, 1)], 0.0);
        // Frequencies at the boundary are clipped rather than dividing by zero
        let boundary = standardise_dosages(&dosages, &array![0.0, 1.0], &pool).unwrap();
        assert!(boundary.iter().all(|x| x.is_finite()));
        assert!(matches!(
            standardise_dosages(&dosages, &array![f64::NAN, 0.5], &pool),
            Err(PcaError::DegenerateSite(0))
        ));
        assert!(matches!(
            standardise_dosages(&dosages, &array![0.5], &pool),
            Err(PcaError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_covariance_matrix() {
        let x = array![[1.0, -1.0, 2.0], [0.5, 0.0, -1.0], [-1.5, 1.0, -1.0]];
        let c = covariance_matrix(&x);
        assert_eq!(c.dim(), (3, 3));
        assert_eq!(c, c.t());
        assert!((c[(0, 0)] - 2.0).abs() < 1e-12);
        assert!((c[(0, 1)] - (0.5 - 2.0) / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_posterior_diagonal() {
        let pool = build_thread_pool(1).unwrap();
        // Certain genotypes: the expected square equals the square of the standardised genotype
        let likelihoods = GenotypeLikelihoods::from_interleaved(&array![
            [1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0]
        ])
        .unwrap();
        let frequencies = array![0.5];
        let priors = population_priors(&frequencies, 2);
        let diagonal = posterior_diagonal(&likelihoods, priors.view(), &frequencies, &pool).unwrap();
        assert!((diagonal[0] - 2.0).abs() < 1e-12);
        assert!((diagonal[1] - 2.0).abs() < 1e-12);
        // Uninformative likelihoods: the expectation under Hardy-Weinberg is exactly one
        let flat = GenotypeLikelihoods::new(Array3::ones((2, 1, 3))).unwrap();
        let diagonal = posterior_diagonal(&flat, priors.view(), &frequencies, &pool).unwrap();
        assert!((diagonal[0] - 1.0).abs() < 1e-12);
        let dosages = flat.posterior_dosages(priors.view(), &pool).unwrap();
        let c = estimate_covariance(&flat, &dosages, priors.view(), &frequencies, true, &pool).unwrap();
        assert!((c[(0, 0)] - 1.0).abs() < 1e-12);
        assert_eq!(c[(0, 1)], 0.0);
        let c = estimate_covariance(&flat, &dosages, priors.view(), &frequencies, false, &pool).unwrap();
        assert_eq!(c[(0, 0)], 0.0);
    }
}
