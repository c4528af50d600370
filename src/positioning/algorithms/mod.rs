//! The closed set of positioning algorithms.
//!
//! Five algorithms, one trait, no runtime plugins. Each algorithm carries
//! its own weight tables: a base weight per AP-count bucket and a
//! multiplier in `[0, 2]` per factor value (0 disables it outright). The
//! selector multiplies the four lookups into the final weight.

mod centroid;
mod max_likelihood;
mod proximity;
mod rssi_ratio;
mod trilateration;

pub use centroid::WeightedCentroid;
pub use max_likelihood::MaximumLikelihood;
pub use proximity::Proximity;
pub use rssi_ratio::RssiRatio;
pub use trilateration::Trilateration;

use crate::config::PositioningConfig;
use crate::positioning::factors::{
    ApCountFactor, GeometryFactor, SignalDistributionFactor, SignalQualityFactor,
};
use crate::positioning::ScanContext;
use crate::types::Position;

/// Identity of an algorithm in reports and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum AlgorithmKind {
    Proximity,
    RssiRatio,
    WeightedCentroid,
    Trilateration,
    MaximumLikelihood,
}

impl std::fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Proximity => "proximity",
            Self::RssiRatio => "rssi-ratio",
            Self::WeightedCentroid => "weighted-centroid",
            Self::Trilateration => "trilateration",
            Self::MaximumLikelihood => "maximum-likelihood",
        };
        write!(f, "{name}")
    }
}

/// Common surface of the five algorithms.
pub trait PositioningAlgorithm: Send + Sync {
    fn kind(&self) -> AlgorithmKind;

    /// Base weight per AP-count bucket; 0 removes the algorithm from the
    /// candidate set for that bucket.
    fn base_weight(&self, ap_count: ApCountFactor) -> f64;

    /// Multiplier for the signal-quality factor, `[0, 2]`.
    fn signal_multiplier(&self, quality: SignalQualityFactor) -> f64;

    /// Multiplier for the signal-distribution factor, `[0, 2]`.
    fn distribution_multiplier(&self, distribution: SignalDistributionFactor) -> f64;

    /// Multiplier for the geometry factor, `[0, 2]`.
    fn geometry_multiplier(&self, geometry: GeometryFactor) -> f64;

    /// Produce a position, or `None` when this context defeats the
    /// algorithm (unknown strongest AP, singular geometry, divergence).
    fn estimate(&self, ctx: &ScanContext<'_>, config: &PositioningConfig) -> Option<Position>;
}

/// The fixed registry, in selector evaluation order.
pub fn registry() -> Vec<Box<dyn PositioningAlgorithm>> {
    vec![
        Box::new(Proximity),
        Box::new(RssiRatio),
        Box::new(WeightedCentroid),
        Box::new(Trilateration),
        Box::new(MaximumLikelihood),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_holds_the_five_algorithms_once() {
        let kinds: Vec<AlgorithmKind> = registry().iter().map(|a| a.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                AlgorithmKind::Proximity,
                AlgorithmKind::RssiRatio,
                AlgorithmKind::WeightedCentroid,
                AlgorithmKind::Trilateration,
                AlgorithmKind::MaximumLikelihood,
            ]
        );
    }

    #[test]
    fn multipliers_stay_inside_the_closed_interval() {
        use ApCountFactor::*;
        use GeometryFactor::*;
        use SignalDistributionFactor::*;
        use SignalQualityFactor::*;

        for algorithm in registry() {
            for count in [Single, Two, Three, FourPlus] {
                assert!((0.0..=2.0).contains(&algorithm.base_weight(count)));
            }
            for quality in [Strong, Medium, Weak, VeryWeak] {
                assert!((0.0..=2.0).contains(&algorithm.signal_multiplier(quality)));
            }
            for distribution in [Uniform, Mixed, Outliers] {
                assert!((0.0..=2.0).contains(&algorithm.distribution_multiplier(distribution)));
            }
            for geometry in [Excellent, Good, Fair, Poor, Collinear] {
                assert!((0.0..=2.0).contains(&algorithm.geometry_multiplier(geometry)));
            }
        }
    }

    #[test]
    fn mandated_zero_rules_hold() {
        use AlgorithmKind::*;

        for algorithm in registry() {
            // Trilateration cannot run under three APs.
            if algorithm.kind() == Trilateration {
                assert_eq!(algorithm.base_weight(ApCountFactor::Single), 0.0);
                assert_eq!(algorithm.base_weight(ApCountFactor::Two), 0.0);
            }
            // Collinear constellations disable the geometric solvers.
            if matches!(algorithm.kind(), Trilateration | MaximumLikelihood) {
                assert_eq!(algorithm.geometry_multiplier(GeometryFactor::Collinear), 0.0);
            }
            // Only proximity survives a very weak context.
            if algorithm.kind() != Proximity {
                assert_eq!(
                    algorithm.signal_multiplier(SignalQualityFactor::VeryWeak),
                    0.0
                );
            }
        }
    }
}
