//! Trilateration: non-linear least squares over path-loss ranges.
//!
//! Ranges come from the log-distance model; the solve is iterative
//! Gauss-Newton on the 2×2 normal equations (Cramer's rule is exact and
//! fast in 2D), run in a local meter frame centered on the weighted
//! centroid. Singular geometry (collinear or degenerate constellations)
//! fails the solve rather than producing a wild fix.

use crate::config::PositioningConfig;
use crate::positioning::algorithms::{AlgorithmKind, PositioningAlgorithm};
use crate::positioning::factors::{
    ApCountFactor, GeometryFactor, SignalDistributionFactor, SignalQualityFactor,
};
use crate::positioning::{geometry, ScanContext};
use crate::types::Position;

const MAX_ITERATIONS: u32 = 10;
/// Stop when the position update falls below this (meters).
const CONVERGENCE_M: f64 = 0.01;
/// Normal-matrix determinant below this is singular.
const SINGULAR_DET: f64 = 1e-12;
/// Accuracy model coefficients.
const RANGE_ACCURACY_COEFF: f64 = 0.1;
const MIN_ACCURACY_M: f64 = 10.0;
const MAX_ACCURACY_M: f64 = 150.0;

pub struct Trilateration;

impl PositioningAlgorithm for Trilateration {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Trilateration
    }

    fn base_weight(&self, ap_count: ApCountFactor) -> f64 {
        match ap_count {
            ApCountFactor::Single | ApCountFactor::Two => 0.0,
            ApCountFactor::Three => 1.3,
            ApCountFactor::FourPlus => 1.5,
        }
    }

    fn signal_multiplier(&self, quality: SignalQualityFactor) -> f64 {
        match quality {
            SignalQualityFactor::Strong => 1.2,
            SignalQualityFactor::Medium => 1.0,
            SignalQualityFactor::Weak => 0.7,
            SignalQualityFactor::VeryWeak => 0.0,
        }
    }

    fn distribution_multiplier(&self, distribution: SignalDistributionFactor) -> f64 {
        match distribution {
            SignalDistributionFactor::Uniform => 1.1,
            SignalDistributionFactor::Mixed => 1.0,
            SignalDistributionFactor::Outliers => 0.7,
        }
    }

    fn geometry_multiplier(&self, geometry: GeometryFactor) -> f64 {
        match geometry {
            GeometryFactor::Excellent => 1.2,
            GeometryFactor::Good => 1.1,
            GeometryFactor::Fair => 0.8,
            GeometryFactor::Poor => 0.5,
            GeometryFactor::Collinear => 0.0,
        }
    }

    fn estimate(&self, ctx: &ScanContext<'_>, config: &PositioningConfig) -> Option<Position> {
        let matched = ctx.matched;
        if matched.len() < 3 {
            return None;
        }
        if geometry::minor_axis_variance(matched) < config.collinearity_variance_epsilon_m2 {
            return None;
        }

        let (centroid_lat, centroid_lon) = geometry::weighted_centroid(matched);
        let frame = geometry::LocalFrame::centered_at(centroid_lat, centroid_lon);

        let sites: Vec<(f64, f64, f64)> = matched
            .iter()
            .map(|m| {
                let (x, y) = frame.to_local(m.ap.latitude, m.ap.longitude);
                let range = geometry::estimate_distance_m(
                    m.scan.rssi_dbm,
                    config.reference_rssi_dbm,
                    config.path_loss_coeff,
                );
                (x, y, range)
            })
            .collect();

        // Per-iteration step ceiling: the AP span keeps a bad first
        // Jacobian from launching the estimate out of the constellation.
        let span = max_pairwise_distance(&sites).max(1.0);

        let mut px = 0.0;
        let mut py = 0.0;
        let mut converged = false;

        for _ in 0..MAX_ITERATIONS {
            let mut jtj = [[0.0f64; 2]; 2];
            let mut jtr = [0.0f64; 2];

            for &(ax, ay, range) in &sites {
                let dx = px - ax;
                let dy = py - ay;
                let dist = (dx * dx + dy * dy).sqrt().max(0.001);
                let residual = range - dist;

                // Jacobian of the predicted range: (p − a) / ‖p − a‖.
                let jx = dx / dist;
                let jy = dy / dist;

                jtj[0][0] += jx * jx;
                jtj[0][1] += jx * jy;
                jtj[1][0] += jy * jx;
                jtj[1][1] += jy * jy;
                jtr[0] += jx * residual;
                jtr[1] += jy * residual;
            }

            let det = jtj[0][0] * jtj[1][1] - jtj[0][1] * jtj[1][0];
            if det.abs() < SINGULAR_DET {
                return None;
            }
            let mut step_x = (jtj[1][1] * jtr[0] - jtj[0][1] * jtr[1]) / det;
            let mut step_y = (jtj[0][0] * jtr[1] - jtj[1][0] * jtr[0]) / det;

            let step_norm = (step_x * step_x + step_y * step_y).sqrt();
            if step_norm > span {
                let scale = span / step_norm;
                step_x *= scale;
                step_y *= scale;
            }

            px += step_x;
            py += step_y;

            if step_norm < CONVERGENCE_M {
                converged = true;
                break;
            }
        }

        let (latitude, longitude) = frame.to_geo(px, py);
        let mean_range = sites.iter().map(|s| s.2).sum::<f64>() / sites.len() as f64;
        let mean_accuracy = matched
            .iter()
            .map(|m| m.ap.horizontal_accuracy_m)
            .sum::<f64>()
            / matched.len() as f64;
        let accuracy_m = (mean_accuracy + RANGE_ACCURACY_COEFF * mean_range)
            .clamp(MIN_ACCURACY_M, MAX_ACCURACY_M);

        let signal = geometry::signal_strength_factor(geometry::mean_rssi(matched));
        let confidence = if converged { 0.75 * signal } else { 0.45 * signal }.clamp(0.05, 0.9);

        Some(Position {
            latitude,
            longitude,
            altitude_m: geometry::mean_known_altitude(matched),
            accuracy_m,
            confidence,
        })
    }
}

fn max_pairwise_distance(sites: &[(f64, f64, f64)]) -> f64 {
    let mut max = 0.0f64;
    for i in 0..sites.len() {
        for j in (i + 1)..sites.len() {
            let dx = sites[i].0 - sites[j].0;
            let dy = sites[i].1 - sites[j].1;
            max = max.max((dx * dx + dy * dy).sqrt());
        }
    }
    max
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::positioning::MatchedObservation;
    use crate::types::{ApRecord, ApStatus, ScanObservation};

    fn matched(mac: &str, rssi: f64, lat: f64, lon: f64) -> MatchedObservation {
        MatchedObservation {
            scan: ScanObservation {
                mac: mac.to_string(),
                rssi_dbm: rssi,
                frequency_mhz: None,
                ssid: None,
            },
            ap: ApRecord {
                mac: mac.to_string(),
                latitude: lat,
                longitude: lon,
                altitude_m: None,
                horizontal_accuracy_m: 10.0,
                vertical_accuracy_m: None,
                status: ApStatus::Active,
                confidence: 0.9,
            },
        }
    }

    fn estimate(matched: &[MatchedObservation]) -> Option<Position> {
        let scans: Vec<ScanObservation> = matched.iter().map(|m| m.scan.clone()).collect();
        Trilateration.estimate(
            &ScanContext {
                scans: &scans,
                matched,
            },
            &PositioningConfig::default(),
        )
    }

    /// Consistent ranges around a small indoor constellation: the solve
    /// should land near the true position.
    #[test]
    fn recovers_a_synthetic_position() {
        let config = PositioningConfig::default();
        // True position: center of a ~40 m triangle around (37.7749, -122.4194).
        let truth = (37.77495, -122.41935);
        let frame = geometry::LocalFrame::centered_at(truth.0, truth.1);
        let aps = [(-20.0, -12.0), (22.0, -10.0), (0.0, 18.0)];

        let set: Vec<MatchedObservation> = aps
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| {
                let (lat, lon) = frame.to_geo(x, y);
                let dist = (x * x + y * y).sqrt();
                // Invert the path-loss model for a noiseless reading.
                let rssi = config.reference_rssi_dbm - config.path_loss_coeff * dist.log10();
                matched(&format!("00:11:22:33:44:0{i}"), rssi, lat, lon)
            })
            .collect();

        let position = estimate(&set).unwrap();
        let (x, y) = frame.to_local(position.latitude, position.longitude);
        let error = (x * x + y * y).sqrt();
        assert!(error < 2.0, "solve missed truth by {error} m");
        assert!(position.confidence > 0.3);
    }

    #[test]
    fn refuses_collinear_constellations() {
        let line: Vec<MatchedObservation> = (1..=4)
            .map(|i| matched(&format!("00:11:22:33:44:0{i}"), -70.0, i as f64, i as f64))
            .collect();
        assert!(estimate(&line).is_none());
    }

    #[test]
    fn refuses_fewer_than_three_aps() {
        let pair = vec![
            matched("00:11:22:33:44:01", -60.0, 1.0, 1.0),
            matched("00:11:22:33:44:02", -70.0, 1.0, 2.0),
        ];
        assert!(estimate(&pair).is_none());
    }
}
