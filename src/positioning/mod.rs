//! Positioning engine: context classification, algorithm selection, and
//! weighted fusion.
//!
//! The engine is stateless and freely parallel: one immutable registry of
//! five algorithms, a rule table per algorithm, and a pure fusion step.
//! AP reference data is read through [`ApStore`], whose in-memory
//! implementation swaps immutable snapshots atomically on reload.

pub mod algorithms;
mod ap_store;
mod engine;
mod factors;
mod fuser;
mod geometry;
mod selector;

pub use ap_store::{ApStore, InMemoryApStore};
pub use engine::{FusionReport, PositioningEngine};
pub use factors::{
    ApCountFactor, ContextClassifier, FactorSet, GeometryFactor, SignalDistributionFactor,
    SignalQualityFactor,
};
pub use selector::select_algorithms;

use crate::types::{ApRecord, ScanObservation};

/// One scan observation matched to an eligible reference AP.
#[derive(Debug, Clone)]
pub struct MatchedObservation {
    pub scan: ScanObservation,
    pub ap: ApRecord,
}

/// Inputs shared by every algorithm: the raw scan list (for coverage
/// ratios and strongest-signal checks) and the matched subset.
#[derive(Debug, Clone, Copy)]
pub struct ScanContext<'a> {
    pub scans: &'a [ScanObservation],
    pub matched: &'a [MatchedObservation],
}
