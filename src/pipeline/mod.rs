//! Pipeline orchestration.
//!
//! ```text
//! poll → parse event → route → stream lines → transform → serialize
//!      → batch → deliver (retry) → terminal outcome → ack
//! ```
//!
//! The runtime is the composition root for the pipeline side: it builds
//! every component from the validated config and the injected ports, wires
//! the bounded channel between the consumer and the worker pool, and owns
//! the graceful stop sequence.

mod runtime;
mod stats;
mod worker;

pub use runtime::PipelineRuntime;
pub use stats::PipelineStats;
pub use worker::MessageWorker;
