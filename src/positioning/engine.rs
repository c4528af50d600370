//! The positioning engine facade.
//!
//! `locate` is a pure function of the scan list and the AP store snapshot:
//! match scans to eligible reference APs, classify the four factors,
//! select and weigh algorithms, run them, fuse. Stateless and freely
//! parallel.

use tracing::debug;

use crate::config::PositioningConfig;
use crate::error::PositioningError;
use crate::positioning::algorithms::{registry, AlgorithmKind, PositioningAlgorithm};
use crate::positioning::factors::{ContextClassifier, FactorSet};
use crate::positioning::fuser::{self, Candidate};
use crate::positioning::selector::select_algorithms;
use crate::positioning::{ApStore, MatchedObservation, ScanContext};
use crate::types::{Position, ScanObservation};

/// Result of a successful fusion.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FusionReport {
    pub position: Position,
    pub factors: FactorSet,
    /// Normalized selection weights, before algorithm failures.
    pub weights: Vec<(AlgorithmKind, f64)>,
    /// Algorithms whose outputs made it into the fusion.
    pub contributing: Vec<AlgorithmKind>,
}

pub struct PositioningEngine {
    config: PositioningConfig,
    classifier: ContextClassifier,
    registry: Vec<Box<dyn PositioningAlgorithm>>,
}

impl PositioningEngine {
    pub fn new(config: PositioningConfig) -> Self {
        let classifier = ContextClassifier::new(config.clone());
        Self {
            config,
            classifier,
            registry: registry(),
        }
    }

    /// Estimate a position for one scan set.
    pub fn locate(
        &self,
        scans: &[ScanObservation],
        store: &dyn ApStore,
    ) -> Result<FusionReport, PositioningError> {
        let matched: Vec<MatchedObservation> = scans
            .iter()
            .filter_map(|scan| {
                store
                    .lookup(&scan.mac)
                    .filter(|ap| ap.status.eligible())
                    .map(|ap| MatchedObservation {
                        scan: scan.clone(),
                        ap,
                    })
            })
            .collect();

        if matched.is_empty() {
            return Err(PositioningError::NoMatchedAps);
        }

        let factors = self.classifier.classify(&matched);
        let selected = select_algorithms(&self.registry, &factors);
        if selected.is_empty() {
            debug!(?factors, "Every algorithm weighted to zero");
            return Err(PositioningError::Unresolvable);
        }

        let weights: Vec<(AlgorithmKind, f64)> = selected
            .iter()
            .map(|s| (s.algorithm.kind(), s.weight))
            .collect();

        let ctx = ScanContext {
            scans,
            matched: &matched,
        };
        let candidates: Vec<Candidate> = selected
            .iter()
            .filter_map(|s| {
                s.algorithm.estimate(&ctx, &self.config).map(|position| Candidate {
                    kind: s.algorithm.kind(),
                    weight: s.weight,
                    position,
                })
            })
            .collect();

        let Some(position) = fuser::fuse(&candidates) else {
            debug!(?factors, "No selected algorithm produced a position");
            return Err(PositioningError::Unresolvable);
        };

        let contributing: Vec<AlgorithmKind> = candidates.iter().map(|c| c.kind).collect();
        debug!(
            matched = matched.len(),
            algorithms = contributing.len(),
            confidence = position.confidence,
            "Position fused"
        );

        Ok(FusionReport {
            position,
            factors,
            weights,
            contributing,
        })
    }
}
