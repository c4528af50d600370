//! Algorithm selection: factor-weighted eligibility.

use crate::positioning::algorithms::PositioningAlgorithm;
use crate::positioning::factors::FactorSet;

/// An algorithm that survived selection, with its normalized weight.
pub struct SelectedAlgorithm<'a> {
    pub algorithm: &'a dyn PositioningAlgorithm,
    pub weight: f64,
}

/// Compute `W(A) = base × quality × geometry × distribution` for every
/// algorithm, drop the zeros, and normalize the survivors. An empty result
/// means the context defeats every algorithm.
pub fn select_algorithms<'a>(
    registry: &'a [Box<dyn PositioningAlgorithm>],
    factors: &FactorSet,
) -> Vec<SelectedAlgorithm<'a>> {
    let mut selected: Vec<SelectedAlgorithm<'a>> = registry
        .iter()
        .filter_map(|algorithm| {
            let weight = algorithm.base_weight(factors.ap_count)
                * algorithm.signal_multiplier(factors.signal_quality)
                * algorithm.geometry_multiplier(factors.geometry)
                * algorithm.distribution_multiplier(factors.signal_distribution);
            (weight > 0.0).then_some(SelectedAlgorithm {
                algorithm: algorithm.as_ref(),
                weight,
            })
        })
        .collect();

    let total: f64 = selected.iter().map(|s| s.weight).sum();
    if total > 0.0 {
        for entry in &mut selected {
            entry.weight /= total;
        }
    }
    selected
}
