//! Context classification: four orthogonal factors describing a scan.

use serde::Serialize;

use crate::config::PositioningConfig;
use crate::positioning::{geometry, MatchedObservation};

/// How many scans matched eligible reference APs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ApCountFactor {
    Single,
    Two,
    Three,
    FourPlus,
}

/// Mean signal strength band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SignalQualityFactor {
    Strong,
    Medium,
    Weak,
    VeryWeak,
}

/// Shape of the RSSI distribution across the matched set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SignalDistributionFactor {
    Uniform,
    Mixed,
    Outliers,
}

/// AP constellation quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum GeometryFactor {
    Excellent,
    Good,
    Fair,
    Poor,
    Collinear,
}

/// The four factors for one scan context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FactorSet {
    pub ap_count: ApCountFactor,
    pub signal_quality: SignalQualityFactor,
    pub signal_distribution: SignalDistributionFactor,
    pub geometry: GeometryFactor,
}

/// Maps a matched scan set to its factor classification.
pub struct ContextClassifier {
    config: PositioningConfig,
}

impl ContextClassifier {
    pub fn new(config: PositioningConfig) -> Self {
        Self { config }
    }

    /// Classify a non-empty matched set.
    pub fn classify(&self, matched: &[MatchedObservation]) -> FactorSet {
        FactorSet {
            ap_count: Self::ap_count(matched.len()),
            signal_quality: self.signal_quality(matched),
            signal_distribution: self.signal_distribution(matched),
            geometry: self.geometry(matched),
        }
    }

    fn ap_count(count: usize) -> ApCountFactor {
        match count {
            0 | 1 => ApCountFactor::Single,
            2 => ApCountFactor::Two,
            3 => ApCountFactor::Three,
            _ => ApCountFactor::FourPlus,
        }
    }

    fn signal_quality(&self, matched: &[MatchedObservation]) -> SignalQualityFactor {
        let mean = geometry::mean_rssi(matched);
        if mean > self.config.rssi_strong_dbm {
            SignalQualityFactor::Strong
        } else if mean > self.config.rssi_medium_dbm {
            SignalQualityFactor::Medium
        } else if mean > self.config.rssi_weak_dbm {
            SignalQualityFactor::Weak
        } else {
            SignalQualityFactor::VeryWeak
        }
    }

    /// UNIFORM when the spread is tight and nothing sticks out, OUTLIERS
    /// when any z-score exceeds the threshold, MIXED otherwise.
    fn signal_distribution(&self, matched: &[MatchedObservation]) -> SignalDistributionFactor {
        if matched.len() < 2 {
            return SignalDistributionFactor::Uniform;
        }
        let mean = geometry::mean_rssi(matched);
        let variance = matched
            .iter()
            .map(|m| (m.scan.rssi_dbm - mean).powi(2))
            .sum::<f64>()
            / matched.len() as f64;
        let stddev = variance.sqrt();
        if stddev < 1e-9 {
            return SignalDistributionFactor::Uniform;
        }

        let max_abs_z = matched
            .iter()
            .map(|m| ((m.scan.rssi_dbm - mean) / stddev).abs())
            .fold(0.0f64, f64::max);
        if max_abs_z > self.config.outlier_z_threshold {
            SignalDistributionFactor::Outliers
        } else if stddev <= self.config.uniform_stddev_max_db {
            SignalDistributionFactor::Uniform
        } else {
            SignalDistributionFactor::Mixed
        }
    }

    /// GDOP thresholds, with COLLINEAR overriding whenever the matched
    /// positions are degenerate. One AP has no geometry (POOR); two are
    /// always a line.
    fn geometry(&self, matched: &[MatchedObservation]) -> GeometryFactor {
        match matched.len() {
            0 | 1 => return GeometryFactor::Poor,
            2 => return GeometryFactor::Collinear,
            _ => {}
        }

        if geometry::minor_axis_variance(matched) < self.config.collinearity_variance_epsilon_m2 {
            return GeometryFactor::Collinear;
        }

        match geometry::gdop(matched) {
            Some(gdop) if gdop < self.config.gdop_excellent => GeometryFactor::Excellent,
            Some(gdop) if gdop < self.config.gdop_good => GeometryFactor::Good,
            Some(gdop) if gdop < self.config.gdop_fair => GeometryFactor::Fair,
            Some(_) => GeometryFactor::Poor,
            // Singular normal matrix without a collinearity hit: treat as
            // collinear, the solvers cannot use it either way.
            None => GeometryFactor::Collinear,
        }
    }
}
