//! # Worker Receive Loop
//!
//! Every worker runs the same loop: take the next task from its queue, hand
//! it to the worker kind's [`TaskHandler`], and acknowledge it. A failing or
//! panicking task is logged and counted; the loop moves on to the next task
//! and the acknowledgement is still sent, so no `join` ever hangs on it.

use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::thread;
use tracing::{debug, info, warn};

use super::status::{TaskCounters, WorkerKind, WorkerStatus};
use crate::error::{GraphWorkersError, GraphWorkersResult};
use crate::logging::log_task_failure;
use crate::messaging::{Task, TaskReceiver};

/// Kind-specific task handling plugged into the receive loop
#[async_trait]
pub trait TaskHandler: Send + Sync {
    fn kind(&self) -> WorkerKind;

    fn worker_id(&self) -> usize;

    /// Handle one task; `ReportStatus` and `Shutdown` never reach this
    async fn do_task(&mut self, task: Task) -> GraphWorkersResult<()>;

    async fn status(&self, counters: TaskCounters) -> WorkerStatus;
}

/// Run the receive loop until a `Shutdown` task arrives or the manager drops
/// its queue handle
pub async fn run_receive_loop<H: TaskHandler>(handler: &mut H, mut receiver: TaskReceiver) {
    let kind = handler.kind();
    let worker_id = handler.worker_id();
    let mut counters = TaskCounters::default();

    loop {
        let task = match receiver.get().await {
            Ok(task) => task,
            Err(e) => {
                debug!(worker_kind = %kind, worker_id, error = %e, "Task queue closed");
                break;
            }
        };

        let shutdown = match task {
            Task::Shutdown => true,
            Task::ReportStatus { reply } => {
                // The manager may have stopped waiting for replies
                let _ = reply.send(handler.status(counters).await);
                false
            }
            task => {
                let task_kind = task.kind();
                let outcome = AssertUnwindSafe(handler.do_task(task)).catch_unwind().await;
                match outcome {
                    Ok(Ok(())) => counters.processed += 1,
                    Ok(Err(e)) => {
                        counters.failed += 1;
                        log_task_failure(kind.as_str(), worker_id, task_kind, &e.to_string());
                    }
                    Err(panic) => {
                        counters.failed += 1;
                        log_task_failure(kind.as_str(), worker_id, task_kind, &panic_message(&*panic));
                    }
                }
                false
            }
        };

        if let Err(e) = receiver.task_done() {
            warn!(worker_kind = %kind, worker_id, error = %e, "Failed to acknowledge task");
        }
        if shutdown {
            info!(worker_kind = %kind, worker_id, "🛑 WORKER: Shutdown requested, leaving receive loop");
            break;
        }
    }

    info!(
        worker_kind = %kind,
        worker_id,
        tasks_processed = counters.processed,
        tasks_failed = counters.failed,
        "✅ WORKER: Receive loop stopped"
    );
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("task panicked: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("task panicked: {message}")
    } else {
        "task panicked".to_string()
    }
}

/// Start a named OS thread for one worker
///
/// `body` builds the worker's own runtime and runs it to completion.
pub fn spawn_worker_thread<F>(
    kind: WorkerKind,
    worker_id: usize,
    body: F,
) -> GraphWorkersResult<thread::JoinHandle<()>>
where
    F: FnOnce() -> GraphWorkersResult<()> + Send + 'static,
{
    let name = kind.thread_name(worker_id);
    thread::Builder::new()
        .name(name.clone())
        .spawn(move || {
            if let Err(e) = body() {
                tracing::error!(worker_kind = %kind, worker_id, error = %e, "❌ WORKER: Worker exited with error");
            }
        })
        .map_err(|e| GraphWorkersError::Worker(format!("failed to spawn {name}: {e}")))
}
