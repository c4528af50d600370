//! Weighted fusion of per-algorithm positions.

use crate::positioning::algorithms::AlgorithmKind;
use crate::types::Position;

/// One algorithm's output with its selection weight.
pub struct Candidate {
    pub kind: AlgorithmKind,
    pub weight: f64,
    pub position: Position,
}

/// Fuse candidate positions by weight.
///
/// Latitude, longitude, accuracy, and confidence are weight-averaged over
/// every candidate (weights renormalized over those that actually
/// produced a position); altitude only over candidates that reported one.
/// Returns `None` for an empty candidate set.
pub fn fuse(candidates: &[Candidate]) -> Option<Position> {
    let total: f64 = candidates.iter().map(|c| c.weight).sum();
    if candidates.is_empty() || total <= 0.0 {
        return None;
    }

    let mut latitude = 0.0;
    let mut longitude = 0.0;
    let mut accuracy = 0.0;
    let mut confidence = 0.0;
    let mut alt_sum = 0.0;
    let mut alt_weight = 0.0;

    for candidate in candidates {
        let w = candidate.weight / total;
        latitude += w * candidate.position.latitude;
        longitude += w * candidate.position.longitude;
        accuracy += w * candidate.position.accuracy_m;
        confidence += w * candidate.position.confidence;
        if let Some(altitude) = candidate.position.altitude_m {
            alt_sum += candidate.weight * altitude;
            alt_weight += candidate.weight;
        }
    }

    Some(Position {
        latitude,
        longitude,
        altitude_m: (alt_weight > 0.0).then(|| alt_sum / alt_weight),
        accuracy_m: accuracy,
        confidence: confidence.min(1.0),
    })
}
