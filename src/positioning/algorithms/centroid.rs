//! Weighted Centroid: mW-weighted mean of the matched AP positions.
//!
//! Weights are linear power (`10^(rssi/10)`), the same weighting the
//! classifier uses for its geometry centroid, so a strong nearby AP
//! dominates the estimate instead of merely nudging it.

use crate::config::PositioningConfig;
use crate::positioning::algorithms::{AlgorithmKind, PositioningAlgorithm};
use crate::positioning::factors::{
    ApCountFactor, GeometryFactor, SignalDistributionFactor, SignalQualityFactor,
};
use crate::positioning::{geometry, ScanContext};
use crate::types::Position;

/// Reported accuracy when an AP record carries no usable accuracy.
const DEFAULT_AP_ACCURACY_M: f64 = 15.0;
/// Confidence ceiling and coverage coefficient.
const CONFIDENCE_CEIL: f64 = 0.8;
const COVERAGE_COEFF: f64 = 0.7;

pub struct WeightedCentroid;

impl PositioningAlgorithm for WeightedCentroid {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::WeightedCentroid
    }

    fn base_weight(&self, ap_count: ApCountFactor) -> f64 {
        match ap_count {
            ApCountFactor::Single | ApCountFactor::Two => 0.0,
            ApCountFactor::Three => 1.0,
            ApCountFactor::FourPlus => 1.3,
        }
    }

    fn signal_multiplier(&self, quality: SignalQualityFactor) -> f64 {
        match quality {
            SignalQualityFactor::Strong | SignalQualityFactor::Medium => 1.0,
            SignalQualityFactor::Weak => 0.9,
            SignalQualityFactor::VeryWeak => 0.0,
        }
    }

    fn distribution_multiplier(&self, distribution: SignalDistributionFactor) -> f64 {
        match distribution {
            SignalDistributionFactor::Uniform | SignalDistributionFactor::Mixed => 1.0,
            SignalDistributionFactor::Outliers => 0.8,
        }
    }

    fn geometry_multiplier(&self, geometry: GeometryFactor) -> f64 {
        match geometry {
            GeometryFactor::Excellent | GeometryFactor::Good => 1.0,
            GeometryFactor::Fair => 1.1,
            // The centroid is the robust fallback when solvers cannot run.
            GeometryFactor::Poor | GeometryFactor::Collinear => 1.2,
        }
    }

    fn estimate(&self, ctx: &ScanContext<'_>, _config: &PositioningConfig) -> Option<Position> {
        let matched = ctx.matched;
        if matched.is_empty() {
            return None;
        }

        let (latitude, longitude) = geometry::weighted_centroid(matched);

        // Altitude averaged only over APs that know theirs, weighted the
        // same way as the horizontal fix.
        let mut alt_sum = 0.0;
        let mut alt_weight = 0.0;
        for m in matched {
            if let Some(altitude) = m.ap.altitude_m {
                let w = geometry::mw_weight(m.scan.rssi_dbm);
                alt_sum += w * altitude;
                alt_weight += w;
            }
        }
        let altitude_m = (alt_weight > 0.0).then(|| alt_sum / alt_weight);

        let accuracy_m = matched
            .iter()
            .map(|m| {
                if m.ap.horizontal_accuracy_m > 0.0 {
                    m.ap.horizontal_accuracy_m
                } else {
                    DEFAULT_AP_ACCURACY_M
                }
            })
            .sum::<f64>()
            / matched.len() as f64;

        let coverage = matched.len() as f64 / ctx.scans.len().max(1) as f64;
        let confidence = (coverage * COVERAGE_COEFF).min(CONFIDENCE_CEIL);

        Some(Position {
            latitude,
            longitude,
            altitude_m,
            accuracy_m,
            confidence,
        })
    }
}
