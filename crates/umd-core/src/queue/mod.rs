//! Thread-safe job registry and lifecycle state machine.
//!
//! Every mutation happens under one lock and keeps the aggregate counters
//! consistent: `total == pending + active + completed`. Cancelled jobs leave
//! the denominator instead of counting as completed.

mod manager;
mod state;

pub use manager::QueueManager;
pub use state::{DeferredEntry, QueueId, QueueItem, QueueState, QueueStats};
