//! # Worker Configuration
//!
//! Typed configuration for the worker manager and its pools. Values are layered
//! by [`ConfigManager`]: built-in defaults, then `config/graph_workers.yaml`,
//! then `config/graph_workers.{environment}.yaml`, then `GRAPH_WORKERS__*`
//! environment variables.
//!
//! ```rust,no_run
//! use entity_graph_workers::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigManager::load()?;
//! let evaluators = config.config().workers.evaluator_workers;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring graph_workers.yaml
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct WorkersConfig {
    /// Worker pool sizes
    pub workers: WorkerPoolConfig,
    /// API worker RPC server settings
    pub rpc: RpcConfig,
    /// Notification publishing settings
    pub notifier: NotifierConfig,
    /// Shutdown behavior
    pub shutdown: ShutdownConfig,
    /// Log output format
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct WorkerPoolConfig {
    pub evaluator_workers: usize,
    pub api_workers: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            evaluator_workers: 1,
            api_workers: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RpcConfig {
    /// Target topic the API workers' RPC servers are bound to
    pub topic: String,
    /// Capacity of each RPC server's request channel
    pub request_buffer_size: usize,
    /// Threads in each API worker's RPC runtime
    pub server_threads: usize,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            topic: crate::constants::topics::RPC_API.to_string(),
            request_buffer_size: 256,
            server_threads: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct NotifierConfig {
    pub topic: String,
    pub buffer_size: usize,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            topic: crate::constants::topics::NOTIFICATIONS.to_string(),
            buffer_size: 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ShutdownConfig {
    pub graceful_timeout_seconds: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            graceful_timeout_seconds: 10,
        }
    }
}

impl ShutdownConfig {
    pub fn graceful_timeout(&self) -> Duration {
        Duration::from_secs(self.graceful_timeout_seconds)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl WorkersConfig {
    /// Reject configurations the manager cannot run with
    pub fn validate(&self) -> ConfigResult<()> {
        if self.workers.evaluator_workers == 0 {
            return Err(ConfigurationError::invalid_value(
                "workers.evaluator_workers",
                0,
                "at least one evaluator worker is required",
            ));
        }
        if self.rpc.request_buffer_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "rpc.request_buffer_size",
                0,
                "must be greater than zero",
            ));
        }
        if self.rpc.server_threads == 0 {
            return Err(ConfigurationError::invalid_value(
                "rpc.server_threads",
                0,
                "must be greater than zero",
            ));
        }
        if self.rpc.topic.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "rpc.topic",
                "",
                "topic must not be empty",
            ));
        }
        if self.notifier.topic.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "notifier.topic",
                "",
                "topic must not be empty",
            ));
        }
        if self.notifier.buffer_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "notifier.buffer_size",
                0,
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}
