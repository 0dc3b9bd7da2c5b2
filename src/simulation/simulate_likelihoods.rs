use ndarray::prelude::*;
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use statrs::distribution::{Binomial, Poisson, Uniform};

use crate::base::*;

// Simulate low-coverage sequencing of individuals from discrete sub-populations

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationParameters {
    pub population_sizes: Vec<usize>,        // number of individuals per sub-population
    pub population_frequencies: Array2<f64>, // sub-populations x sites
    pub mean_depth: f64,                     // Poisson mean of the read depth per individual and site
    pub error_rate: f64,                     // probability that a read shows the other allele
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedLikelihoods {
    pub likelihoods: GenotypeLikelihoods,
    pub genotypes: Array2<u8>,   // individuals x sites, true number of alternate alleles
    pub populations: Vec<usize>, // sub-population of each individual
}

/// Sub-population x site allele frequencies drawn uniformly from [low, high)
pub fn draw_population_frequencies(
    n_populations: usize,
    n_sites: usize,
    low: f64,
    high: f64,
    seed: u64,
) -> Result<Array2<f64>> {
    if (low < 0.0) | (high > 1.0) {
        return Err(PcaError::InvalidInput(format!(
            "allele frequencies must be drawn from within [0, 1], got [{}, {})",
            low, high
        )));
    }
    let dist = Uniform::new(low, high).map_err(|e| PcaError::InvalidInput(e.to_string()))?;
    let mut rng = StdRng::seed_from_u64(seed);
    Ok(Array2::from_shape_fn((n_populations, n_sites), |_| {
        dist.sample(&mut rng)
    }))
}

/// Normalised likelihoods of the 3 genotypes given the counts of reference and alternate reads
fn read_likelihoods(n_ref: u64, n_alt: u64, error_rate: f64) -> [f64; 3] {
    let mut likelihoods = [0.0; 3];
    for (g, l) in likelihoods.iter_mut().enumerate() {
        let p_alt = ((g as f64 / 2.00) * (1.00 - error_rate)) + ((1.00 - (g as f64 / 2.00)) * error_rate);
        *l = p_alt.powi(n_alt as i32) * (1.00 - p_alt).powi(n_ref as i32);
    }
    let total = likelihoods.iter().sum::<f64>();
    if total > 0.0 {
        for l in likelihoods.iter_mut() {
            *l /= total;
        }
    } else {
        likelihoods = [1.0 / 3.0; 3];
    }
    likelihoods
}

pub fn simulate_likelihoods(params: &SimulationParameters) -> Result<SimulatedLikelihoods> {
    let (n_populations, m) = params.population_frequencies.dim();
    if params.population_sizes.len() != n_populations {
        return Err(PcaError::ShapeMismatch {
            expected: vec![n_populations],
            found: vec![params.population_sizes.len()],
        });
    }
    if !(0.0..0.5).contains(&params.error_rate) {
        return Err(PcaError::InvalidInput(format!(
            "the sequencing error rate must be within [0, 0.5), got {}",
            params.error_rate
        )));
    }
    let depth = Poisson::new(params.mean_depth).map_err(|e| {
        PcaError::InvalidInput(format!("read depth of mean {}: {}", params.mean_depth, e))
    })?;
    let populations = params
        .population_sizes
        .iter()
        .enumerate()
        .flat_map(|(k, &size)| std::iter::repeat(k).take(size))
        .collect::<Vec<usize>>();
    let n = populations.len();
    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut genotypes: Array2<u8> = Array2::zeros((n, m));
    let mut likelihoods: Array3<f64> = Array3::zeros((n, m, 3));
    for (i, &k) in populations.iter().enumerate() {
        for j in 0..m {
            let frequency = params.population_frequencies[(k, j)];
            let binomial = Binomial::new(frequency, 2).map_err(|e| {
                PcaError::InvalidInput(format!("allele frequency {}: {}", frequency, e))
            })?;
            let g = binomial.sample(&mut rng) as u8;
            let n_reads = depth.sample(&mut rng) as u64;
            let mut n_alt: u64 = 0;
            for _ in 0..n_reads {
                let carries_alt = rng.gen::<f64>() < (g as f64 / 2.00);
                let flipped = rng.gen::<f64>() < params.error_rate;
                if carries_alt != flipped {
                    n_alt += 1;
                }
            }
            genotypes[(i, j)] = g;
            let l = read_likelihoods(n_reads - n_alt, n_alt, params.error_rate);
            for c in 0..3 {
                likelihoods[(i, j, c)] = l[c];
            }
        }
    }
    Ok(SimulatedLikelihoods {
        likelihoods: GenotypeLikelihoods::new(likelihoods)?,
        genotypes,
        populations,
    })
}

/// Deterministic toy data: 4 individuals x 10 sites from two sub-populations at allele frequencies
/// 0.2 (individuals 0 and 1) and 0.8 (individuals 2 and 3). Individuals 2 and 3 carry the mirror
/// images (2 - g) of the genotypes of individuals 0 and 1, so the pooled frequency is one half at every site.
pub fn two_subpopulations_likelihoods() -> GenotypeLikelihoods {
    let first: [u8; 10] = [0, 1, 0, 0, 1, 0, 1, 0, 0, 1];
    let second: [u8; 10] = [1, 0, 0, 1, 0, 0, 0, 1, 0, 1];
    let genotype = |i: usize, j: usize| match i {
        0 => first[j],
        1 => second[j],
        2 => 2 - first[j],
        _ => 2 - second[j],
    };
    GenotypeLikelihoods {
        likelihoods: Array3::from_shape_fn((4, 10, 3), |(i, j, k)| {
            if genotype(i, j) as usize == k {
                0.9
            } else {
                0.05
            }
        }),
    }
}
