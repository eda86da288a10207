//! Synchronization primitives: bitmask event and bounded byte queue

pub mod event;
pub mod queue;

pub use event::{Event, Mask};
pub use queue::{Queue, QueueStats};
