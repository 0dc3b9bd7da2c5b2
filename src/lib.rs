//! Population structure from genotype likelihoods of low-coverage sequencing data.
//!
//! Population allele frequencies are estimated by EM, sites outside the minor allele frequency
//! band are dropped, and an iterative EM-PCA estimates the covariance matrix between individuals
//! together with individual allele frequencies.

pub mod base;
pub mod genotypes;
pub mod pca;
pub mod pipeline;
pub mod popgen;
pub mod reduction;
pub mod simulation;

pub use base::{
    ConvergenceStatus, EigenvectorPolicy, EmParameters, GenotypeLikelihoods, PcaConfig, PcaError,
    PipelineOutput, Result, RowChunks, SiteBand, StructureEstimate, StructureParameters,
};
pub use pipeline::{run_pipeline, run_pipeline_with};
