//! # Messaging Module
//!
//! Tasks and the per-worker queues that carry them. Each worker has exactly
//! one queue; the [`WorkerManager`](crate::worker::WorkerManager) is its only
//! producer.

pub mod queue;
pub mod task;

pub use queue::{QueueKind, TaskQueue, TaskReceiver};
pub use task::{ActionMode, Task};
