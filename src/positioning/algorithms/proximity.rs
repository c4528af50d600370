//! Proximity: the position of the strongest-signal AP.
//!
//! The only algorithm usable with a single AP and the only one kept alive
//! in very weak signal. Fails when the strongest scanned AP is not in the
//! reference set: falling back to the second-strongest would silently
//! report the wrong venue.

use crate::config::PositioningConfig;
use crate::positioning::algorithms::{AlgorithmKind, PositioningAlgorithm};
use crate::positioning::factors::{
    ApCountFactor, GeometryFactor, SignalDistributionFactor, SignalQualityFactor,
};
use crate::positioning::ScanContext;
use crate::types::Position;

/// RSSI anchors for the confidence map.
const CONFIDENCE_RSSI_FLOOR: f64 = -89.0;
const CONFIDENCE_RSSI_CEIL: f64 = -35.0;
/// Confidence range the anchors map onto.
const CONFIDENCE_MIN: f64 = 0.10;
const CONFIDENCE_MAX: f64 = 0.85;
/// Floor for the reported accuracy; a single AP never localizes better
/// than its own coverage radius.
const MIN_ACCURACY_M: f64 = 10.0;

pub struct Proximity;

impl PositioningAlgorithm for Proximity {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Proximity
    }

    fn base_weight(&self, ap_count: ApCountFactor) -> f64 {
        match ap_count {
            ApCountFactor::Single => 1.0,
            ApCountFactor::Two => 0.0,
            ApCountFactor::Three | ApCountFactor::FourPlus => 0.3,
        }
    }

    fn signal_multiplier(&self, quality: SignalQualityFactor) -> f64 {
        match quality {
            SignalQualityFactor::Strong => 1.2,
            SignalQualityFactor::Medium => 1.0,
            SignalQualityFactor::Weak => 0.8,
            SignalQualityFactor::VeryWeak => 0.6,
        }
    }

    fn distribution_multiplier(&self, distribution: SignalDistributionFactor) -> f64 {
        match distribution {
            SignalDistributionFactor::Uniform | SignalDistributionFactor::Mixed => 1.0,
            // An outlier is usually one AP much closer than the rest,
            // which is exactly the proximity signal.
            SignalDistributionFactor::Outliers => 1.1,
        }
    }

    fn geometry_multiplier(&self, _geometry: GeometryFactor) -> f64 {
        1.0
    }

    fn estimate(&self, ctx: &ScanContext<'_>, _config: &PositioningConfig) -> Option<Position> {
        // Strongest over the raw scans, not the matched subset.
        let strongest = ctx
            .scans
            .iter()
            .max_by(|a, b| a.rssi_dbm.total_cmp(&b.rssi_dbm))?;
        let matched = ctx.matched.iter().find(|m| m.scan.mac == strongest.mac)?;

        let span = CONFIDENCE_RSSI_CEIL - CONFIDENCE_RSSI_FLOOR;
        let normalized = ((strongest.rssi_dbm - CONFIDENCE_RSSI_FLOOR) / span).clamp(0.0, 1.0);
        let confidence = CONFIDENCE_MIN + normalized * (CONFIDENCE_MAX - CONFIDENCE_MIN);

        Some(Position {
            latitude: matched.ap.latitude,
            longitude: matched.ap.longitude,
            altitude_m: matched.ap.altitude_m,
            accuracy_m: matched.ap.horizontal_accuracy_m.max(MIN_ACCURACY_M),
            confidence,
        })
    }
}
