use ndarray::prelude::*;

use crate::base::{PcaError, Result};

///////////////////////////////////////////////////////////////////////////////
// STRUCTS
///////////////////////////////////////////////////////////////////////////////

/// Genotype likelihoods as an individuals x sites x 3 table, where the last axis holds the
/// likelihoods of carrying 0, 1, and 2 copies of the alternate allele.
/// Values are non-negative but need not sum to one per individual and site.
#[derive(Debug, Clone, PartialEq)]
pub struct GenotypeLikelihoods {
    pub likelihoods: Array3<f64>,
}

/// Contiguous partition of row indices across workers: chunk `k` covers
/// `starts[k]..min(starts[k] + width, n_rows)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowChunks {
    pub starts: Vec<usize>,
    pub width: usize,
}

/// Stopping rule and parallelism of an EM loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmParameters {
    pub max_iterations: usize,
    pub tolerance: f64,
    pub n_threads: usize,
}

/// Sites are informative if their population allele frequency lies strictly inside (lower, 1 - lower)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SiteBand {
    pub lower: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EigenvectorPolicy {
    /// Select the number of eigenvectors from the spectrum of the initial covariance matrix
    Auto,
    /// Use exactly this many eigenvectors
    Fixed(usize),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StructureParameters {
    pub eigenvectors: EigenvectorPolicy,
    pub max_iterations: usize,
    pub tolerance: f64,
    pub n_threads: usize,
    /// Replace the covariance diagonal with the posterior expectation of the squared standardised genotype
    pub posterior_diagonal: bool,
}

/// Parameters of the whole frequency -> mask -> structure pipeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PcaConfig {
    pub allele_frequency: EmParameters,
    pub band: SiteBand,
    pub structure: StructureParameters,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceStatus {
    Converged,
    MaxIterationsReached,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlleleFrequencyEstimate {
    pub frequencies: Array1<f64>, // one per site
    pub iterations: usize,
    pub status: ConvergenceStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilteredSites {
    pub likelihoods: GenotypeLikelihoods,
    pub frequencies: Array1<f64>,
    pub mask: Vec<bool>, // one per original site
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructureEstimate {
    pub covariance: Array2<f64>,             // n individuals x n individuals
    pub individual_frequencies: Array2<f64>, // n individuals x m sites
    pub n_components: usize,
    pub expected_dosages: Array2<f64>, // n individuals x m sites
    pub iterations: usize,
    pub status: ConvergenceStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub population_frequencies: AlleleFrequencyEstimate, // all sites, before filtering
    pub filtered: FilteredSites,
    pub structure: StructureEstimate,
}

///////////////////////////////////////////////////////////////////////////////
// TRAITS
///////////////////////////////////////////////////////////////////////////////

/// Number of principal components to keep given the eigenvalues of the initial covariance
/// matrix, sorted in decreasing order.
pub trait SelectComponentCount {
    fn select_component_count(
        &self,
        eigenvalues: ArrayView1<f64>,
        n_individuals: usize,
        n_sites: usize,
    ) -> usize;
}

impl<F> SelectComponentCount for F
where
    F: Fn(ArrayView1<f64>, usize, usize) -> usize,
{
    fn select_component_count(
        &self,
        eigenvalues: ArrayView1<f64>,
        n_individuals: usize,
        n_sites: usize,
    ) -> usize {
        self(eigenvalues, n_individuals, n_sites)
    }
}

///////////////////////////////////////////////////////////////////////////////
// DEFAULTS AND VALIDATION
///////////////////////////////////////////////////////////////////////////////

impl Default for EmParameters {
    fn default() -> Self {
        EmParameters {
            max_iterations: 200,
            tolerance: 5e-5,
            n_threads: 1,
        }
    }
}

impl EmParameters {
    pub fn validate(&self) -> Result<()> {
        if self.n_threads == 0 {
            return Err(PcaError::InvalidThreadCount);
        }
        if !(self.tolerance >= 0.0) {
            return Err(PcaError::InvalidInput(format!(
                "the convergence tolerance must be non-negative, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

impl Default for SiteBand {
    fn default() -> Self {
        SiteBand { lower: 0.05 }
    }
}

impl SiteBand {
    pub fn new(lower: f64) -> Result<Self> {
        if !(0.0..0.5).contains(&lower) {
            return Err(PcaError::InvalidInput(format!(
                "the lower bound of the allele frequency band must be in [0, 0.5), got {}",
                lower
            )));
        }
        Ok(SiteBand { lower })
    }

    pub fn upper(&self) -> f64 {
        1.00 - self.lower
    }

    pub fn contains(&self, frequency: f64) -> bool {
        (frequency > self.lower) & (frequency < self.upper())
    }
}

impl Default for StructureParameters {
    fn default() -> Self {
        StructureParameters {
            eigenvectors: EigenvectorPolicy::Auto,
            max_iterations: 100,
            tolerance: 5e-5,
            n_threads: 1,
            posterior_diagonal: true,
        }
    }
}

impl StructureParameters {
    pub fn validate(&self, n_individuals: usize) -> Result<()> {
        if self.n_threads == 0 {
            return Err(PcaError::InvalidThreadCount);
        }
        if !(self.tolerance >= 0.0) {
            return Err(PcaError::InvalidInput(format!(
                "the convergence tolerance must be non-negative, got {}",
                self.tolerance
            )));
        }
        if let EigenvectorPolicy::Fixed(k) = self.eigenvectors {
            if k == 0 {
                return Err(PcaError::InvalidComponentCount);
            }
            let maximum = n_individuals.saturating_sub(1);
            if k > maximum {
                return Err(PcaError::TooManyComponents {
                    requested: k,
                    maximum,
                });
            }
        }
        Ok(())
    }
}

impl Default for PcaConfig {
    fn default() -> Self {
        PcaConfig {
            allele_frequency: EmParameters::default(),
            band: SiteBand::default(),
            structure: StructureParameters::default(),
        }
    }
}

impl PcaConfig {
    /// Use the same number of threads in every stage
    pub fn with_threads(mut self, n_threads: usize) -> Self {
        self.allele_frequency.n_threads = n_threads;
        self.structure.n_threads = n_threads;
        self
    }
}
