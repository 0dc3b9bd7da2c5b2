//! Iterative estimation of the individual covariance matrix and individual allele frequencies.
//!
//! Initialising: posterior dosages under the population frequencies give the first covariance
//! matrix, and from it the number of principal components, which is then frozen.
//! Refining: the top eigenvectors of the covariance matrix fit the standardised dosages of every
//! site, the fit gives individual allele frequencies, these are the priors of new posterior
//! dosages, and the dosages give a new covariance matrix. The loop stops once successive
//! covariance matrices differ by less than the tolerance in Frobenius norm, or at the iteration cap.

use log::{debug, info, warn};
use ndarray::{prelude::*, Zip};
use rayon::ThreadPool;

use crate::base::*;
use crate::pca::*;
use crate::reduction::*;

/// Snapshot of the loop state, replaced wholesale at every iteration
#[derive(Debug, Clone)]
struct StructureState {
    covariance: Array2<f64>,
    individual_frequencies: Array2<f64>,
    expected_dosages: Array2<f64>,
}

fn check_inputs(
    likelihoods: &GenotypeLikelihoods,
    frequencies: &Array1<f64>,
    params: &StructureParameters,
) -> Result<()> {
    let (n, m) = (likelihoods.n_individuals(), likelihoods.n_sites());
    if m == 0 {
        return Err(PcaError::NoSitesRetained);
    }
    if n == 0 {
        return Err(PcaError::InvalidInput(
            "no individuals in the genotype likelihoods".to_owned(),
        ));
    }
    if frequencies.len() != m {
        return Err(PcaError::ShapeMismatch {
            expected: vec![m],
            found: vec![frequencies.len()],
        });
    }
    params.validate(n)
}

/// Individual allele frequencies (n x m) from the least squares fit of the standardised dosages
/// onto the orthonormal eigenvectors V, i.e. V V' X, mapped back to the frequency scale and clipped.
pub fn individual_allele_frequencies(
    eigenvectors: &Array2<f64>,
    dosages: &Array2<f64>,
    frequencies: &Array1<f64>,
    pool: &ThreadPool,
) -> Result<Array2<f64>> {
    let standardised = standardise_dosages(dosages, frequencies, pool)?;
    let (n, m) = standardised.dim();
    if eigenvectors.nrows() != n {
        return Err(PcaError::ShapeMismatch {
            expected: vec![n, eigenvectors.ncols()],
            found: eigenvectors.shape().to_vec(),
        });
    }
    let fitted: Array2<f64> = if eigenvectors.ncols() == 0 {
        Array2::zeros((n, m))
    } else {
        eigenvectors.dot(&eigenvectors.t().dot(&standardised))
    };
    let mut individual_frequencies: Array2<f64> = Array2::zeros((n, m));
    pool.install(|| {
        Zip::indexed(&mut individual_frequencies)
            .and(&fitted)
            .par_for_each(|(_, j), a, &x| {
                let f = clip_frequency(frequencies[j]);
                *a = clip_frequency(f + (0.5 * dosage_standard_deviation(f) * x));
            })
    });
    Ok(individual_frequencies)
}

fn refine(
    likelihoods: &GenotypeLikelihoods,
    frequencies: &Array1<f64>,
    initial: StructureState,
    n_components: usize,
    params: &StructureParameters,
    pool: &ThreadPool,
) -> Result<StructureEstimate> {
    let chunks = RowChunks::new(likelihoods.n_individuals(), params.n_threads)?;
    let mut state = initial;
    let mut status = ConvergenceStatus::MaxIterationsReached;
    let mut iterations: usize = 0;
    for iteration in 1..=params.max_iterations {
        let eigenvectors = leading_eigenvectors(&state.covariance, n_components)?;
        let individual_frequencies = individual_allele_frequencies(
            &eigenvectors,
            &state.expected_dosages,
            frequencies,
            pool,
        )?;
        let expected_dosages =
            likelihoods.posterior_dosages(individual_frequencies.view(), pool)?;
        let covariance = estimate_covariance(
            likelihoods,
            &expected_dosages,
            individual_frequencies.view(),
            frequencies,
            params.posterior_diagonal,
            pool,
        )?;
        let diff = frobenius_distance(covariance.view(), state.covariance.view(), &chunks)?;
        state = StructureState {
            covariance,
            individual_frequencies,
            expected_dosages,
        };
        iterations = iteration;
        debug!(
            "Covariance matrix iteration {}: Frobenius distance={:e}",
            iteration, diff
        );
        if diff < params.tolerance {
            status = ConvergenceStatus::Converged;
            break;
        }
    }
    match status {
        ConvergenceStatus::Converged => info!(
            "Covariance matrix converged after {} iteration(s) using {} eigenvector(s)",
            iterations, n_components
        ),
        ConvergenceStatus::MaxIterationsReached => warn!(
            "Covariance matrix estimation stopped at the iteration cap ({}) before reaching a tolerance of {:e}",
            params.max_iterations, params.tolerance
        ),
    }
    Ok(StructureEstimate {
        covariance: state.covariance,
        individual_frequencies: state.individual_frequencies,
        n_components,
        expected_dosages: state.expected_dosages,
        iterations,
        status,
    })
}

/// Estimate population structure from the filtered genotype likelihoods and population allele
/// frequencies, choosing the number of components with the default `MarchenkoPasturEdge` when
/// the eigenvector policy is `Auto`.
pub fn estimate_structure(
    likelihoods: &GenotypeLikelihoods,
    frequencies: &Array1<f64>,
    params: &StructureParameters,
) -> Result<StructureEstimate> {
    estimate_structure_with(likelihoods, frequencies, params, &MarchenkoPasturEdge)
}

/// Same as `estimate_structure` with a custom component count selector
pub fn estimate_structure_with<S>(
    likelihoods: &GenotypeLikelihoods,
    frequencies: &Array1<f64>,
    params: &StructureParameters,
    selector: &S,
) -> Result<StructureEstimate>
where
    S: SelectComponentCount + ?Sized,
{
    check_inputs(likelihoods, frequencies, params)?;
    let (n, m) = (likelihoods.n_individuals(), likelihoods.n_sites());
    let pool = build_thread_pool(params.n_threads)?;
    let priors = population_priors(frequencies, n);
    let expected_dosages = likelihoods.posterior_dosages(priors.view(), &pool)?;
    let covariance = estimate_covariance(
        likelihoods,
        &expected_dosages,
        priors.view(),
        frequencies,
        params.posterior_diagonal,
        &pool,
    )?;
    let n_components = match params.eigenvectors {
        EigenvectorPolicy::Fixed(k) => k,
        EigenvectorPolicy::Auto => {
            let k = select_component_count(&covariance, m, selector)?;
            info!("Selected {} eigenvector(s) from the initial covariance matrix", k);
            k
        }
    };
    info!(
        "Estimating the covariance matrix of {} individuals across {} sites",
        n, m
    );
    let initial = StructureState {
        covariance,
        individual_frequencies: priors,
        expected_dosages,
    };
    refine(likelihoods, frequencies, initial, n_components, params, &pool)
}

/// Continue refining from a previous estimate, keeping its number of components.
/// The eigenvector policy in `params` is ignored.
pub fn refine_structure(
    likelihoods: &GenotypeLikelihoods,
    frequencies: &Array1<f64>,
    seed: &StructureEstimate,
    params: &StructureParameters,
) -> Result<StructureEstimate> {
    let params = StructureParameters {
        eigenvectors: EigenvectorPolicy::Auto,
        ..*params
    };
    check_inputs(likelihoods, frequencies, &params)?;
    let (n, m) = (likelihoods.n_individuals(), likelihoods.n_sites());
    if seed.covariance.dim() != (n, n) {
        return Err(PcaError::ShapeMismatch {
            expected: vec![n, n],
            found: seed.covariance.shape().to_vec(),
        });
    }
    for seeded in [&seed.expected_dosages, &seed.individual_frequencies] {
        if seeded.dim() != (n, m) {
            return Err(PcaError::ShapeMismatch {
                expected: vec![n, m],
                found: seeded.shape().to_vec(),
            });
        }
    }
    let maximum = n.saturating_sub(1);
    if seed.n_components > maximum {
        return Err(PcaError::TooManyComponents {
            requested: seed.n_components,
            maximum,
        });
    }
    let pool = build_thread_pool(params.n_threads)?;
    let initial = StructureState {
        covariance: seed.covariance.clone(),
        individual_frequencies: seed.individual_frequencies.clone(),
        expected_dosages: seed.expected_dosages.clone(),
    };
    refine(likelihoods, frequencies, initial, seed.n_components, &params, &pool)
}
