//! # Worker Module
//!
//! Worker kinds, their shared receive loop and replica maintenance, and the
//! [`WorkerManager`] that spawns them and fans tasks out to their queues.
//!
//! ## Lifecycle
//!
//! 1. `add_evaluator_workers` / `add_api_workers` spawn one thread per worker
//! 2. `wait_for_worker_start` returns once the joinable workers are looping
//! 3. `submit_read_db_graph` rebuilds every replica from storage
//! 4. `submit_enable_evaluations` or `submit_start_evaluations` turns on evaluation
//! 5. `follow_graph_changes` keeps the replicas in step with the authoritative graph
//! 6. `shutdown` stops every receive loop

pub mod api_worker;
pub mod base;
pub mod evaluator_worker;
pub mod manager;
pub mod replica;
pub mod status;

pub use api_worker::ApiWorker;
pub use base::{run_receive_loop, TaskHandler};
pub use evaluator_worker::EvaluatorWorker;
pub use manager::WorkerManager;
pub use replica::ReplicaApplier;
pub use status::{TaskCounters, WorkerKind, WorkerStatus};
