//! Stage-1 record transformation.
//!
//! A feed processor parses each object line into a [`RawUpload`]; the
//! [`RecordTransformer`] applies the sanity filter, per-observation RSSI
//! bounds, MAC normalization, quality-weight assignment, and the optional
//! OUI hotspot policy, emitting zero or more normalized [`Measurement`]s.
//! Dropped data is counted, never propagated as an error: validation
//! failures must not fail the containing message.

mod oui;
mod serializer;
mod transformer;

pub use oui::{is_valid_oui, normalize_mac, oui_prefix, HotspotDecision, HotspotPolicy};
pub use serializer::RecordSerializer;
pub use transformer::{RawObservation, RawUpload, RecordTransformer};
