use log::info;
use ndarray::{prelude::*, Zip};

use crate::base::*;

/// Code of a genotype whose posterior probability does not reach the calling threshold
pub const MISSING_GENOTYPE: i8 = -9;

/// Call the genotype (0, 1, or 2 alternate alleles) with the highest posterior probability under the
/// individual allele frequencies as priors, or MISSING_GENOTYPE if that probability is below `threshold`.
pub fn call_genotypes(
    likelihoods: &GenotypeLikelihoods,
    individual_frequencies: &Array2<f64>,
    threshold: f64,
    n_threads: usize,
) -> Result<Array2<i8>> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(PcaError::InvalidInput(format!(
            "the genotype calling threshold must be within [0, 1], got {}",
            threshold
        )));
    }
    let pool = build_thread_pool(n_threads)?;
    let posteriors = likelihoods.posterior_probabilities(individual_frequencies.view(), &pool)?;
    let mut genotypes: Array2<i8> = Array2::from_elem(individual_frequencies.dim(), MISSING_GENOTYPE);
    pool.install(|| {
        Zip::from(&mut genotypes)
            .and(posteriors.lanes(Axis(2)))
            .par_for_each(|g, p| {
                let (best, probability) = p
                    .iter()
                    .enumerate()
                    .fold((0, f64::NEG_INFINITY), |(best, max), (k, &x)| {
                        if x > max {
                            (k, x)
                        } else {
                            (best, max)
                        }
                    });
                if probability >= threshold {
                    *g = best as i8;
                }
            })
    });
    let n_missing = genotypes.iter().filter(|&&g| g == MISSING_GENOTYPE).count();
    info!(
        "Called genotypes with a posterior threshold of {}: {} of {} missing",
        threshold,
        n_missing,
        genotypes.len()
    );
    Ok(genotypes)
}
