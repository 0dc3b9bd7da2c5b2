use log::{debug, info, warn};
use ndarray::{prelude::*, Zip};
use rayon::ThreadPool;

use crate::base::*;
use crate::reduction::*;

/// Starting frequencies: mean over individuals of the likelihood-weighted dosage under a flat genotype prior
fn initial_frequencies(likelihoods: &GenotypeLikelihoods, pool: &ThreadPool) -> Array1<f64> {
    let n = likelihoods.n_individuals() as f64;
    let mut frequencies: Array1<f64> = Array1::zeros(likelihoods.n_sites());
    pool.install(|| {
        Zip::indexed(&mut frequencies).par_for_each(|j, f| {
            let sum = likelihoods
                .site(j)
                .outer_iter()
                .fold(0.0, |sum, l| {
                    let total = l[0] + l[1] + l[2];
                    if total > 0.0 {
                        sum + (l[1] + 2.00 * l[2]) / (2.00 * total)
                    } else {
                        sum + 0.5
                    }
                });
            *f = clip_frequency(sum / n);
        })
    });
    frequencies
}

/// One EM update: the mean posterior dosage across individuals, halved
fn em_step(
    likelihoods: &GenotypeLikelihoods,
    frequencies: &Array1<f64>,
    pool: &ThreadPool,
) -> Array1<f64> {
    let n = likelihoods.n_individuals() as f64;
    let mut updated: Array1<f64> = Array1::zeros(frequencies.len());
    pool.install(|| {
        Zip::indexed(&mut updated)
            .and(frequencies)
            .par_for_each(|j, f_new, &f| {
                let sum = likelihoods
                    .site(j)
                    .outer_iter()
                    .fold(0.0, |sum, l| sum + posterior_dosage(l, f));
                *f_new = clip_frequency(sum / (2.00 * n));
            })
    });
    updated
}

/// Population-level alternate allele frequency per site, maximising the likelihood of the
/// genotype likelihoods under Hardy-Weinberg equilibrium.
/// Stops when the RMSE between successive estimates drops below the tolerance or after
/// `max_iterations` updates, whichever comes first.
pub fn estimate_allele_frequencies(
    likelihoods: &GenotypeLikelihoods,
    params: &EmParameters,
) -> Result<AlleleFrequencyEstimate> {
    params.validate()?;
    let (n, m) = (likelihoods.n_individuals(), likelihoods.n_sites());
    if (n == 0) | (m == 0) {
        return Err(PcaError::InvalidInput(format!(
            "genotype likelihoods of {} individuals across {} sites",
            n, m
        )));
    }
    let pool = build_thread_pool(params.n_threads)?;
    let chunks = RowChunks::new(m, params.n_threads)?;
    let mut frequencies = initial_frequencies(likelihoods, &pool);
    let mut status = ConvergenceStatus::MaxIterationsReached;
    let mut iterations: usize = 0;
    for iteration in 1..=params.max_iterations {
        let updated = em_step(likelihoods, &frequencies, &pool);
        let diff = rmse_1d(updated.view(), frequencies.view(), &chunks)?;
        frequencies = updated;
        iterations = iteration;
        debug!("Allele frequency EM iteration {}: RMSE={:e}", iteration, diff);
        if diff < params.tolerance {
            status = ConvergenceStatus::Converged;
            break;
        }
    }
    match status {
        ConvergenceStatus::Converged => info!(
            "Allele frequency EM converged after {} iteration(s) across {} sites",
            iterations, m
        ),
        ConvergenceStatus::MaxIterationsReached => warn!(
            "Allele frequency EM stopped at the iteration cap ({}) before reaching a tolerance of {:e}",
            params.max_iterations, params.tolerance
        ),
    }
    Ok(AlleleFrequencyEstimate {
        frequencies,
        iterations,
        status,
    })
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::*;

    #[test]
    fn test_two_subpopulations_average_to_one_half() {
        let likelihoods = two_subpopulations_likelihoods();
        let estimate = estimate_allele_frequencies(&likelihoods, &EmParameters::default()).unwrap();
        assert_eq!(estimate.frequencies.len(), 10);
        assert_eq!(estimate.status, ConvergenceStatus::Converged);
        for &f in estimate.frequencies.iter() {
            assert!((f - 0.5).abs() < 0.05);
        }
    }

    #[test]
    fn test_frequencies_bounded_and_deterministic() {
        let sim = simulate_likelihoods(&SimulationParameters {
            population_sizes: vec![15, 15],
            population_frequencies: draw_population_frequencies(2, 300, 0.0, 1.0, 7).unwrap(),
            mean_depth: 2.0,
            error_rate: 0.01,
            seed: 7,
        })
        .unwrap();
        let params = EmParameters {
            n_threads: 3,
            ..Default::default()
        };
        let a = estimate_allele_frequencies(&sim.likelihoods, &params).unwrap();
        let b = estimate_allele_frequencies(&sim.likelihoods, &params).unwrap();
        let c = estimate_allele_frequencies(
            &sim.likelihoods,
            &EmParameters {
                n_threads: 1,
                ..params
            },
        )
        .unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert!(a.frequencies.iter().all(|&f| (f > 0.0) & (f < 1.0)));
        // Close to the sample allele frequencies of the simulated genotypes
        let sample_frequencies = sim.genotypes.mapv(|g| g as f64).mean_axis(Axis(0)).unwrap() / 2.0;
        let chunks = RowChunks::new(300, 1).unwrap();
        let error = rmse_1d(a.frequencies.view(), sample_frequencies.view(), &chunks).unwrap();
        assert!(error < 0.1, "RMSE to sample frequencies: {}", error);
    }

    #[test]
    fn test_monomorphic_sites_stay_inside_unit_interval() {
        // Everyone is certainly homozygous for the reference allele at the first site and for the alternate at the second
        let likelihoods = GenotypeLikelihoods::from_interleaved(&Array2::from_shape_fn(
            (5, 6),
            |(_, c)| match c {
                0 | 5 => 1.0,
                _ => 0.0,
            },
        ))
        .unwrap();
        let estimate = estimate_allele_frequencies(&likelihoods, &EmParameters::default()).unwrap();
        assert_eq!(estimate.frequencies[0], FREQUENCY_CLIP);
        assert_eq!(estimate.frequencies[1], 1.0 - FREQUENCY_CLIP);
    }

    #[test]
    fn test_iteration_cap_is_not_an_error() {
        let likelihoods = two_subpopulations_likelihoods();
        let capped = estimate_allele_frequencies(
            &likelihoods,
            &EmParameters {
                max_iterations: 1,
                tolerance: 0.0,
                n_threads: 2,
            },
        )
        .unwrap();
        assert_eq!(capped.iterations, 1);
        assert_eq!(capped.status, ConvergenceStatus::MaxIterationsReached);
        let none = estimate_allele_frequencies(
            &likelihoods,
            &EmParameters {
                max_iterations: 0,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(none.iterations, 0);
        assert_eq!(none.frequencies.len(), 10);
        assert!(matches!(
            estimate_allele_frequencies(
                &likelihoods,
                &EmParameters {
                    n_threads: 0,
                    ..Default::default()
                }
            ),
            Err(PcaError::InvalidThreadCount)
        ));
    }
}
