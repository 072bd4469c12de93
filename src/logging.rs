//! # Structured Logging Module
//!
//! Environment-aware console logging using the tracing ecosystem. Worker
//! threads log through the same global subscriber, so every line carries the
//! thread name (`evaluator-worker-0`, `api-worker-1`, ...) that emitted it.

use chrono::Utc;
use std::io::IsTerminal;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::constants::environments;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
///
/// `RUST_LOG` wins over the environment default. Safe to call more than once.
pub fn init_structured_logging(environment: &str, json: bool) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let log_level = get_log_level(environment);
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));

        let layer = if json {
            fmt::layer()
                .json()
                .with_target(true)
                .with_thread_names(true)
                .with_level(true)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_names(true)
                .with_level(true)
                .with_ansi(std::io::stdout().is_terminal())
                .boxed()
        };

        let subscriber = tracing_subscriber::registry().with(layer.with_filter(filter));

        // A global subscriber may already be set by an embedding application
        if subscriber.try_init().is_err() {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            level = %log_level,
            json = json,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        environments::PRODUCTION => "info".to_string(),
        environments::TEST | environments::DEVELOPMENT => "debug".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log a replica-affecting task failure
pub fn log_task_failure(worker_kind: &str, worker_id: usize, task_kind: &str, error: &str) {
    tracing::warn!(
        worker_kind = %worker_kind,
        worker_id = worker_id,
        task_kind = %task_kind,
        error = %error,
        timestamp = %Utc::now().to_rfc3339(),
        "⚠️ WORKER: Task failed, graph may not be in sync"
    );
}

/// Log a template lifecycle transition
pub fn log_template_operation(
    operation: &str,
    template_name: &str,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        template_name = %template_name,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📚 TEMPLATE_OPERATION"
    );
}
