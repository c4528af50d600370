//! Pipeline Configuration Module
//!
//! All tunable thresholds for filtering, batching, delivery, memory
//! management, and positioning live here as TOML-loadable values.
//!
//! ## Loading Order
//!
//! 1. Explicit path (`--config` flag)
//! 2. `WIFI_LOCATE_CONFIG` environment variable
//! 3. `wifi_locate.toml` in the current working directory
//! 4. Built-in defaults
//!
//! There is no global config singleton: the composition root loads and
//! validates one [`PipelineConfig`] and passes it (or the relevant
//! section) to each component it constructs. An out-of-range value is a
//! fatal startup error, surfaced as process exit code 1.

pub mod defaults;
mod settings;
pub mod validation;

pub use settings::{
    DeliveryConfig, FeedsConfig, FilteringConfig, HotspotAction, MemoryConfig,
    MobileHotspotConfig, ObjectConfig, PipelineConfig, PositioningConfig, QueueConfig,
};
