//! RSSI-Ratio: pairwise power-ratio interpolation.
//!
//! For each AP pair the signal difference maps to a distance ratio
//! `r = 10^((RSSI_i − RSSI_j) / pathLossCoeff)`, and the pair contributes
//! the split point `(P_i + r·P_j) / (1 + r)`. The final estimate is the
//! mean over all pairs. The split is symmetric in the pair order, so
//! iteration order does not matter.

use crate::config::PositioningConfig;
use crate::positioning::algorithms::{AlgorithmKind, PositioningAlgorithm};
use crate::positioning::factors::{
    ApCountFactor, GeometryFactor, SignalDistributionFactor, SignalQualityFactor,
};
use crate::positioning::{geometry, ScanContext};
use crate::types::Position;

/// Accuracy model: base meters plus degradation per dB below −50 dBm.
const BASE_ACCURACY_M: f64 = 15.0;
const ACCURACY_PER_DB: f64 = 0.5;
const MAX_ACCURACY_M: f64 = 60.0;
/// Confidence ceiling; the ratio model never beats a converged solver.
const CONFIDENCE_CEIL: f64 = 0.75;

pub struct RssiRatio;

impl PositioningAlgorithm for RssiRatio {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::RssiRatio
    }

    fn base_weight(&self, ap_count: ApCountFactor) -> f64 {
        match ap_count {
            ApCountFactor::Single => 0.0,
            ApCountFactor::Two => 1.2,
            ApCountFactor::Three => 0.8,
            ApCountFactor::FourPlus => 0.3,
        }
    }

    fn signal_multiplier(&self, quality: SignalQualityFactor) -> f64 {
        match quality {
            SignalQualityFactor::Strong | SignalQualityFactor::Medium => 1.0,
            SignalQualityFactor::Weak => 0.7,
            SignalQualityFactor::VeryWeak => 0.0,
        }
    }

    fn distribution_multiplier(&self, distribution: SignalDistributionFactor) -> f64 {
        match distribution {
            SignalDistributionFactor::Uniform => 1.0,
            SignalDistributionFactor::Mixed => 0.9,
            // Ratios against an outlier reading are dominated by it.
            SignalDistributionFactor::Outliers => 0.6,
        }
    }

    fn geometry_multiplier(&self, geometry: GeometryFactor) -> f64 {
        match geometry {
            GeometryFactor::Excellent | GeometryFactor::Good | GeometryFactor::Fair => 1.0,
            GeometryFactor::Poor | GeometryFactor::Collinear => 0.9,
        }
    }

    fn estimate(&self, ctx: &ScanContext<'_>, config: &PositioningConfig) -> Option<Position> {
        let matched = ctx.matched;
        if matched.len() < 2 {
            return None;
        }

        let mut lat_sum = 0.0;
        let mut lon_sum = 0.0;
        let mut pairs = 0usize;
        for i in 0..matched.len() {
            for j in (i + 1)..matched.len() {
                let a = &matched[i];
                let b = &matched[j];
                let ratio = 10f64
                    .powf((a.scan.rssi_dbm - b.scan.rssi_dbm) / config.path_loss_coeff);
                lat_sum += (a.ap.latitude + ratio * b.ap.latitude) / (1.0 + ratio);
                lon_sum += (a.ap.longitude + ratio * b.ap.longitude) / (1.0 + ratio);
                pairs += 1;
            }
        }

        let mean = geometry::mean_rssi(matched);
        let accuracy =
            (BASE_ACCURACY_M + ((-mean - 50.0).max(0.0) * ACCURACY_PER_DB)).min(MAX_ACCURACY_M);
        let confidence = CONFIDENCE_CEIL * geometry::signal_strength_factor(mean);

        Some(Position {
            latitude: lat_sum / pairs as f64,
            longitude: lon_sum / pairs as f64,
            altitude_m: geometry::mean_known_altitude(matched),
            accuracy_m: accuracy,
            confidence,
        })
    }
}
