use log::info;

use crate::base::*;
use crate::pca::*;
use crate::popgen::*;

/// Population allele frequencies by EM, then the band mask, then the EM-PCA structure estimate
pub fn run_pipeline(likelihoods: &GenotypeLikelihoods, config: &PcaConfig) -> Result<PipelineOutput> {
    run_pipeline_with(likelihoods, config, &MarchenkoPasturEdge)
}

pub fn run_pipeline_with<S>(
    likelihoods: &GenotypeLikelihoods,
    config: &PcaConfig,
    selector: &S,
) -> Result<PipelineOutput>
where
    S: SelectComponentCount + ?Sized,
{
    info!(
        "Genotype likelihoods of {} individuals across {} sites",
        likelihoods.n_individuals(),
        likelihoods.n_sites()
    );
    let population_frequencies = estimate_allele_frequencies(likelihoods, &config.allele_frequency)?;
    let filtered = filter_sites(likelihoods, &population_frequencies.frequencies, &config.band)?;
    let structure = estimate_structure_with(
        &filtered.likelihoods,
        &filtered.frequencies,
        &config.structure,
        selector,
    )?;
    Ok(PipelineOutput {
        population_frequencies,
        filtered,
        structure,
    })
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::*;
    use ndarray::prelude::*;

    #[test]
    fn test_run_pipeline() {
        let _ = env_logger::builder().is_test(true).try_init();
        let likelihoods = two_subpopulations_likelihoods();
        let config = PcaConfig {
            structure: StructureParameters {
                eigenvectors: EigenvectorPolicy::Fixed(1),
                ..Default::default()
            },
            ..Default::default()
        }
        .with_threads(2);
        let output = run_pipeline(&likelihoods, &config).unwrap();
        assert_eq!(output.population_frequencies.frequencies.len(), 10);
        assert_eq!(output.filtered.mask, vec![true; 10]);
        assert_eq!(output.structure.covariance.dim(), (4, 4));
        assert_eq!(output.structure.individual_frequencies.dim(), (4, 10));
        assert_eq!(output.structure.n_components, 1);
        // Stage by stage gives the same answer
        let frequencies = estimate_allele_frequencies(&likelihoods, &config.allele_frequency).unwrap();
        let filtered = filter_sites(&likelihoods, &frequencies.frequencies, &config.band).unwrap();
        let structure =
            estimate_structure(&filtered.likelihoods, &filtered.frequencies, &config.structure).unwrap();
        assert_eq!(output.structure, structure);
    }

    fn one(_eigenvalues: ArrayView1<f64>, _n_individuals: usize, _n_sites: usize) -> usize {
        1
    }

    #[test]
    fn test_run_pipeline_errors() {
        let likelihoods = two_subpopulations_likelihoods();
        let output = run_pipeline_with(&likelihoods, &PcaConfig::default(), &one).unwrap();
        assert_eq!(output.structure.n_components, 1);
        assert!(matches!(
            run_pipeline(&likelihoods, &PcaConfig::default().with_threads(0)),
            Err(PcaError::InvalidThreadCount)
        ));
        let monomorphic = GenotypeLikelihoods::new(Array3::from_shape_fn((4, 5, 3), |(_, _, k)| {
            if k == 2 {
                1.0
            } else {
                0.0
            }
        }))
        .unwrap();
        assert!(matches!(
            run_pipeline(&monomorphic, &PcaConfig::default()),
            Err(PcaError::NoSitesRetained)
        ));
    }
}
