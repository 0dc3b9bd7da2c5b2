use log::info;
use ndarray::prelude::*;

use crate::base::*;

/// Keep the sites whose population allele frequency lies strictly inside the band, in their original order.
/// Returns the subset likelihoods and frequencies along with the per-site mask so that callers can
/// subset their own per-site metadata.
pub fn filter_sites(
    likelihoods: &GenotypeLikelihoods,
    frequencies: &Array1<f64>,
    band: &SiteBand,
) -> Result<FilteredSites> {
    let m = likelihoods.n_sites();
    if frequencies.len() != m {
        return Err(PcaError::ShapeMismatch {
            expected: vec![m],
            found: vec![frequencies.len()],
        });
    }
    let mask = frequencies
        .iter()
        .map(|&f| band.contains(f))
        .collect::<Vec<bool>>();
    let idx = mask
        .iter()
        .enumerate()
        .filter(|&(_, &keep)| keep)
        .map(|(j, _)| j)
        .collect::<Vec<usize>>();
    info!(
        "Number of sites retained: {} of {} (allele frequencies within ({}, {}))",
        idx.len(),
        m,
        band.lower,
        band.upper()
    );
    if idx.is_empty() {
        return Err(PcaError::NoSitesRetained);
    }
    Ok(FilteredSites {
        likelihoods: likelihoods.select_sites(&idx),
        frequencies: frequencies.select(Axis(0), &idx),
        mask,
    })
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use super::*;
    use crate::popgen::*;
    use crate::simulation::*;

    #[test]
    fn test_filter_sites() {
        let likelihoods = GenotypeLikelihoods::new(Array3::from_shape_fn((2, 5, 3), |(i, j, k)| {
            (i + j + k) as f64
        }))
        .unwrap();
        let frequencies = array![0.01, 0.5, 0.05, 0.3, 0.99];
        let filtered = filter_sites(&likelihoods, &frequencies, &SiteBand::default()).unwrap();
        assert_eq!(filtered.mask, vec![false, true, false, true, false]);
        assert_eq!(filtered.frequencies, array![0.5, 0.3]);
        assert_eq!(filtered.likelihoods.n_sites(), 2);
        assert_eq!(filtered.likelihoods.site(0), likelihoods.site(1));
        assert_eq!(filtered.likelihoods.site(1), likelihoods.site(3));
        assert!(matches!(
            filter_sites(&likelihoods, &array![0.5, 0.5], &SiteBand::default()),
            Err(PcaError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_site_at_one_half_is_always_kept() {
        // Uninformative likelihoods keep the frequency wherever the EM starts, which is 0.5 here
        let likelihoods = GenotypeLikelihoods::new(Array3::ones((6, 4, 3))).unwrap();
        let estimate = estimate_allele_frequencies(&likelihoods, &EmParameters::default()).unwrap();
        assert!(estimate.frequencies.iter().all(|&f| (f - 0.5).abs() < 1e-12));
        let filtered =
            filter_sites(&likelihoods, &estimate.frequencies, &SiteBand::default()).unwrap();
        assert_eq!(filtered.likelihoods.n_sites(), 4);
        let estimate =
            estimate_allele_frequencies(&two_subpopulations_likelihoods(), &EmParameters::default())
                .unwrap();
        let filtered = filter_sites(
            &two_subpopulations_likelihoods(),
            &estimate.frequencies,
            &SiteBand::default(),
        )
        .unwrap();
        assert_eq!(filtered.mask, vec![true; 10]);
    }

    #[test]
    fn test_no_informative_sites_is_fatal() {
        // Every individual is certainly homozygous for the reference allele at every site
        let likelihoods = GenotypeLikelihoods::new(Array3::from_shape_fn((4, 10, 3), |(_, _, k)| {
            if k == 0 {
                1.0
            } else {
                0.0
            }
        }))
        .unwrap();
        let estimate = estimate_allele_frequencies(&likelihoods, &EmParameters::default()).unwrap();
        assert!(matches!(
            filter_sites(&likelihoods, &estimate.frequencies, &SiteBand::default()),
            Err(PcaError::NoSitesRetained)
        ));
    }
}
