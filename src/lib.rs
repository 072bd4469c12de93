#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Entity Graph Workers
//!
//! Worker coordination and graph replication for an entity-graph evaluation
//! service.
//!
//! ## Overview
//!
//! A [`WorkerManager`] spawns two pools of long-lived workers. Each worker
//! owns a private replica of the authoritative entity graph and a single task
//! queue. The manager broadcasts every authoritative mutation to every queue,
//! in commit order, so the replicas converge on the authoritative content.
//!
//! - **Evaluator workers** run a scenario evaluator over their replica and
//!   their shard of the scenario repository.
//! - **API workers** serve read endpoints over their replica through an RPC
//!   server, serialized against graph updates by the API lock.
//!
//! ## Module Organization
//!
//! - [`graph`] - Vertices, edges, the entity graph and its change feed
//! - [`messaging`] - Tasks and joinable / plain task queues
//! - [`worker`] - Worker kinds, receive loop, replica maintenance, manager
//! - [`evaluator`] - Scenario repository, evaluator, action execution
//! - [`api`] - Endpoint objects, RPC server and client
//! - [`storage`] - Snapshot, event, template and webhook stores
//! - [`notifier`] - Outbound notifications
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use entity_graph_workers::config::WorkersConfig;
//! use entity_graph_workers::graph::Vertex;
//! use entity_graph_workers::notifier::BroadcastNotifier;
//! use entity_graph_workers::storage::Storage;
//! use entity_graph_workers::WorkerManager;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut manager = WorkerManager::new(
//!     WorkersConfig::default(),
//!     Storage::in_memory(),
//!     Arc::new(BroadcastNotifier::default()),
//! );
//! manager.add_evaluator_workers(2)?;
//! manager.add_api_workers(1)?;
//! manager.wait_for_worker_start().await?;
//!
//! manager
//!     .submit_graph_update(None, Some(Vertex::new("host-1").into()), true)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod constants;
pub mod error;
pub mod evaluator;
pub mod graph;
pub mod logging;
pub mod messaging;
pub mod notifier;
pub mod storage;
pub mod worker;

pub use config::{ConfigManager, WorkersConfig};
pub use error::{GraphWorkersError, GraphWorkersResult};
pub use graph::{Edge, EntityGraph, GraphElement, Vertex};
pub use messaging::{ActionMode, Task, TaskQueue};
pub use storage::Storage;
pub use worker::{WorkerManager, WorkerStatus};
