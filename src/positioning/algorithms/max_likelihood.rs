//! Maximum Likelihood: gradient ascent on the RSSI log-likelihood.
//!
//! Model: observed RSSI is Gaussian around the log-distance prediction
//! `μ(d) = P0 − coeff·log10(d)` with σ = 6 dB. The ascent starts from the
//! weighted centroid and is bounded in both iterations and per-step
//! displacement; confidence reflects convergence, signal strength, and
//! how well the final residuals fit the noise model.

use statrs::distribution::{Continuous, Normal};

use crate::config::PositioningConfig;
use crate::positioning::algorithms::{AlgorithmKind, PositioningAlgorithm};
use crate::positioning::factors::{
    ApCountFactor, GeometryFactor, SignalDistributionFactor, SignalQualityFactor,
};
use crate::positioning::{geometry, ScanContext};
use crate::types::Position;

/// RSSI noise stddev in dB.
const SIGMA_DB: f64 = 6.0;
const MAX_ITERATIONS: u32 = 100;
/// Gradient scale (m² per dB²) and per-iteration displacement ceiling.
const LEARNING_RATE: f64 = 100.0;
const MAX_STEP_M: f64 = 10.0;
/// Stop when a step falls below this (meters).
const CONVERGENCE_M: f64 = 0.01;
/// Accuracy model coefficients.
const RANGE_COEFF: f64 = 0.6;
const AP_ACCURACY_COEFF: f64 = 0.5;
const MIN_ACCURACY_M: f64 = 8.0;
const MAX_ACCURACY_M: f64 = 120.0;
const CONFIDENCE_CEIL: f64 = 0.85;

pub struct MaximumLikelihood;

impl PositioningAlgorithm for MaximumLikelihood {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::MaximumLikelihood
    }

    fn base_weight(&self, ap_count: ApCountFactor) -> f64 {
        match ap_count {
            ApCountFactor::Single => 0.0,
            ApCountFactor::Two => 0.5,
            ApCountFactor::Three => 1.0,
            ApCountFactor::FourPlus => 1.4,
        }
    }

    fn signal_multiplier(&self, quality: SignalQualityFactor) -> f64 {
        match quality {
            SignalQualityFactor::Strong => 1.2,
            SignalQualityFactor::Medium => 1.0,
            SignalQualityFactor::Weak => 0.6,
            SignalQualityFactor::VeryWeak => 0.0,
        }
    }

    fn distribution_multiplier(&self, distribution: SignalDistributionFactor) -> f64 {
        match distribution {
            SignalDistributionFactor::Uniform => 1.1,
            SignalDistributionFactor::Mixed => 1.0,
            SignalDistributionFactor::Outliers => 0.8,
        }
    }

    fn geometry_multiplier(&self, geometry: GeometryFactor) -> f64 {
        match geometry {
            GeometryFactor::Excellent => 1.2,
            GeometryFactor::Good => 1.1,
            GeometryFactor::Fair => 0.9,
            GeometryFactor::Poor => 0.6,
            GeometryFactor::Collinear => 0.0,
        }
    }

    fn estimate(&self, ctx: &ScanContext<'_>, config: &PositioningConfig) -> Option<Position> {
        let matched = ctx.matched;
        if matched.len() < 2 {
            return None;
        }

        let (start_lat, start_lon) = geometry::weighted_centroid(matched);
        let frame = geometry::LocalFrame::centered_at(start_lat, start_lon);
        let sites: Vec<(f64, f64, f64)> = matched
            .iter()
            .map(|m| {
                let (x, y) = frame.to_local(m.ap.latitude, m.ap.longitude);
                (x, y, m.scan.rssi_dbm)
            })
            .collect();

        let coeff = config.path_loss_coeff;
        let p0 = config.reference_rssi_dbm;
        let sigma_sq = SIGMA_DB * SIGMA_DB;
        let ln10 = std::f64::consts::LN_10;

        let mut px = 0.0;
        let mut py = 0.0;
        let mut converged = false;

        for _ in 0..MAX_ITERATIONS {
            let mut grad_x = 0.0;
            let mut grad_y = 0.0;
            for &(ax, ay, rssi) in &sites {
                let dx = px - ax;
                let dy = py - ay;
                let dist = (dx * dx + dy * dy).sqrt().max(1.0);
                let predicted = p0 - coeff * dist.log10();
                let residual = rssi - predicted;
                // ∂μ/∂p = −coeff / (ln10 · d²) · (p − a); ascent direction
                // of Σ −residual²/2σ².
                let scale = -(residual / sigma_sq) * coeff / (ln10 * dist * dist);
                grad_x += scale * dx;
                grad_y += scale * dy;
            }

            let mut step_x = LEARNING_RATE * grad_x;
            let mut step_y = LEARNING_RATE * grad_y;
            let step_norm = (step_x * step_x + step_y * step_y).sqrt();
            if step_norm > MAX_STEP_M {
                let scale = MAX_STEP_M / step_norm;
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

        // Residual fit against the noise model at the final estimate.
        let noise = Normal::new(0.0, SIGMA_DB).ok()?;
        let mean_log_likelihood = sites
            .iter()
            .map(|&(ax, ay, rssi)| {
                let dist = ((px - ax).powi(2) + (py - ay).powi(2)).sqrt().max(1.0);
                let predicted = p0 - coeff * dist.log10();
                noise.ln_pdf(rssi - predicted)
            })
            .sum::<f64>()
            / sites.len() as f64;
        // ln_pdf at one sigma; residuals inside it count as a good fit.
        let good_fit = mean_log_likelihood > noise.ln_pdf(SIGMA_DB);

        let signal = geometry::signal_strength_factor(geometry::mean_rssi(matched));
        let mut confidence = 0.35 + 0.3 * signal;
        if converged {
            confidence += 0.1;
        }
        if good_fit {
            confidence += 0.1;
        }
        let confidence = confidence.min(CONFIDENCE_CEIL);

        let mean_range = sites
            .iter()
            .map(|&(_, _, rssi)| geometry::estimate_distance_m(rssi, p0, coeff))
            .sum::<f64>()
            / sites.len() as f64;
        let mean_accuracy = matched
            .iter()
            .map(|m| m.ap.horizontal_accuracy_m)
            .sum::<f64>()
            / matched.len() as f64;
        let accuracy_m = (RANGE_COEFF * mean_range + AP_ACCURACY_COEFF * mean_accuracy)
            .clamp(MIN_ACCURACY_M, MAX_ACCURACY_M);

        let (latitude, longitude) = frame.to_geo(px, py);
        Some(Position {
            latitude,
            longitude,
            altitude_m: geometry::mean_known_altitude(matched),
            accuracy_m,
            confidence,
        })
    }
}
