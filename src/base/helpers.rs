use ndarray::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::base::{PcaError, Result};

/// Allele frequencies used as Hardy-Weinberg priors are kept inside [FREQUENCY_CLIP, 1 - FREQUENCY_CLIP]
pub const FREQUENCY_CLIP: f64 = 1e-4;

pub fn clip_frequency(x: f64) -> f64 {
    x.clamp(FREQUENCY_CLIP, 1.00 - FREQUENCY_CLIP)
}

/// Hardy-Weinberg genotype probabilities (0, 1, and 2 alternate alleles) given the allele frequency
pub fn hardy_weinberg_priors(frequency: f64) -> [f64; 3] {
    let q = 1.00 - frequency;
    [q * q, 2.00 * frequency * q, frequency * frequency]
}

/// Posterior genotype probabilities given the 3 genotype likelihoods of one individual at one site.
/// Falls back to the prior when the likelihoods carry no information (all zero).
pub fn posterior_genotype_probabilities(likelihoods: ArrayView1<f64>, frequency: f64) -> [f64; 3] {
    let prior = hardy_weinberg_priors(frequency);
    let mut posterior = [
        likelihoods[0] * prior[0],
        likelihoods[1] * prior[1],
        likelihoods[2] * prior[2],
    ];
    let total = posterior[0] + posterior[1] + posterior[2];
    if !(total > 0.0) || !total.is_finite() {
        return prior;
    }
    for p in posterior.iter_mut() {
        *p /= total;
    }
    posterior
}

/// Posterior mean number of alternate alleles, in [0, 2]
pub fn posterior_dosage(likelihoods: ArrayView1<f64>, frequency: f64) -> f64 {
    let p = posterior_genotype_probabilities(likelihoods, frequency);
    p[1] + 2.00 * p[2]
}

/// Binomial standard deviation of the dosage, sqrt(2f(1-f)), after clipping f
pub fn dosage_standard_deviation(frequency: f64) -> f64 {
    let f = clip_frequency(frequency);
    (2.00 * f * (1.00 - f)).sqrt()
}

pub fn build_thread_pool(n_threads: usize) -> Result<ThreadPool> {
    if n_threads == 0 {
        return Err(PcaError::InvalidThreadCount);
    }
    Ok(ThreadPoolBuilder::new().num_threads(n_threads).build()?)
}
