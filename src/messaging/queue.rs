//! # Task Queues
//!
//! FIFO channels carrying [`Task`]s from the manager to exactly one worker.
//!
//! A *joinable* queue counts unfinished items: `put` increments the count,
//! the consumer's `task_done` decrements it, and the producer's `join` waits
//! until it is back to zero. A *plain* queue is fire-and-forget and its
//! `join` returns immediately.

use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::debug;

use super::task::Task;
use crate::error::{GraphWorkersError, GraphWorkersResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    Joinable,
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct JoinState {
    unfinished: usize,
    consumer_alive: bool,
}

/// Producer handle of a task queue
#[derive(Debug, Clone)]
pub struct TaskQueue {
    name: Arc<str>,
    kind: QueueKind,
    sender: mpsc::UnboundedSender<Task>,
    join_state: Option<Arc<watch::Sender<JoinState>>>,
}

/// Consumer handle of a task queue, owned by one worker
#[derive(Debug)]
pub struct TaskReceiver {
    name: Arc<str>,
    receiver: mpsc::UnboundedReceiver<Task>,
    join_state: Option<Arc<watch::Sender<JoinState>>>,
}

impl TaskQueue {
    pub fn joinable(name: impl Into<String>) -> (TaskQueue, TaskReceiver) {
        Self::create(name.into(), QueueKind::Joinable)
    }

    pub fn plain(name: impl Into<String>) -> (TaskQueue, TaskReceiver) {
        Self::create(name.into(), QueueKind::Plain)
    }

    fn create(name: String, kind: QueueKind) -> (TaskQueue, TaskReceiver) {
        let name: Arc<str> = Arc::from(name);
        let (sender, receiver) = mpsc::unbounded_channel();
        let join_state = match kind {
            QueueKind::Joinable => Some(Arc::new(watch::Sender::new(JoinState {
                unfinished: 0,
                consumer_alive: true,
            }))),
            QueueKind::Plain => None,
        };

        (
            TaskQueue {
                name: name.clone(),
                kind,
                sender,
                join_state: join_state.clone(),
            },
            TaskReceiver {
                name,
                receiver,
                join_state,
            },
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> QueueKind {
        self.kind
    }

    pub fn is_joinable(&self) -> bool {
        self.kind == QueueKind::Joinable
    }

    /// Items put but not yet acknowledged (always zero for plain queues)
    pub fn unfinished(&self) -> usize {
        self.join_state
            .as_ref()
            .map(|state| state.borrow().unfinished)
            .unwrap_or(0)
    }

    /// Enqueue a task; fails only when the consumer is gone
    pub fn put(&self, task: Task) -> GraphWorkersResult<()> {
        if let Some(state) = &self.join_state {
            state.send_modify(|s| s.unfinished += 1);
        }

        self.sender.send(task).map_err(|rejected| {
            if let Some(state) = &self.join_state {
                state.send_modify(|s| s.unfinished = s.unfinished.saturating_sub(1));
            }
            GraphWorkersError::queue(format!(
                "queue '{}' has no consumer, dropped {} task",
                self.name,
                rejected.0.kind()
            ))
        })
    }

    /// Wait until every item put so far has been acknowledged
    ///
    /// Returns immediately for plain queues. There is no timeout: a stuck
    /// consumer stalls the caller. Fails if the consumer went away with
    /// items still unfinished.
    pub async fn join(&self) -> GraphWorkersResult<()> {
        let Some(state) = &self.join_state else {
            return Ok(());
        };

        let mut watcher = state.subscribe();
        let settled = *watcher
            .wait_for(|s| s.unfinished == 0 || !s.consumer_alive)
            .await
            .map_err(|_| GraphWorkersError::queue(format!("queue '{}' closed", self.name)))?;

        if settled.unfinished > 0 {
            return Err(GraphWorkersError::queue(format!(
                "consumer of queue '{}' exited with {} unfinished tasks",
                self.name, settled.unfinished
            )));
        }
        debug!(queue = %self.name, "Queue joined");
        Ok(())
    }
}

impl TaskReceiver {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_joinable(&self) -> bool {
        self.join_state.is_some()
    }

    /// Wait for the next task
    pub async fn get(&mut self) -> GraphWorkersResult<Task> {
        self.receiver.recv().await.ok_or_else(|| {
            GraphWorkersError::queue(format!("queue '{}' has no producers left", self.name))
        })
    }

    /// Acknowledge the most recently dequeued task (no-op on plain queues)
    pub fn task_done(&self) -> GraphWorkersResult<()> {
        let Some(state) = &self.join_state else {
            return Ok(());
        };

        let mut result = Ok(());
        state.send_modify(|s| {
            if s.unfinished == 0 {
                result = Err(GraphWorkersError::queue(format!(
                    "task_done called too many times on queue '{}'",
                    self.name
                )));
            } else {
                s.unfinished -= 1;
            }
        });
        result
    }
}

impl Drop for TaskReceiver {
    fn drop(&mut self) {
        if let Some(state) = &self.join_state {
            state.send_modify(|s| s.consumer_alive = false);
        }
    }
}
