//! Work-queue consumption and acknowledgement.
//!
//! [`WorkQueue`] is the port over the upstream at-least-once queue;
//! [`QueueConsumer`] owns the long-poll loop and feeds the bounded
//! in-process channel; [`AckCoordinator`] tracks derived records per
//! message and deletes a message only once every record has reached a
//! terminal state.

mod ack;
mod consumer;

pub use ack::AckCoordinator;
pub use consumer::{QueueConsumer, WorkQueue};
