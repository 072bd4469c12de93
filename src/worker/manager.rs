//! # Worker Manager
//!
//! Owns every worker's task queue and is the only producer on them. Graph
//! updates are broadcast to all workers in the order the authoritative graph
//! committed them; control tasks go to the evaluator pool, or for template
//! events to evaluator worker 0 alone.
//!
//! Each worker runs on its own named OS thread with its own tokio runtime, so
//! a worker stuck in a long evaluation pass never starves another worker or
//! the manager.

use futures::future::join_all;
use serde_json::{json, Value};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

use super::api_worker::ApiWorker;
use super::base::spawn_worker_thread;
use super::evaluator_worker::EvaluatorWorker;
use super::status::{WorkerKind, WorkerStatus};
use crate::api::{rpc_channel, ApiClient};
use crate::config::WorkersConfig;
use crate::constants::{events, template_actions};
use crate::error::{GraphWorkersError, GraphWorkersResult};
use crate::graph::{GraphChangeFeed, GraphElement};
use crate::logging::log_template_operation;
use crate::messaging::{ActionMode, Task, TaskQueue};
use crate::notifier::{Notification, Notifier};
use crate::storage::{Storage, TemplateStatus};

struct WorkerThread {
    kind: WorkerKind,
    worker_id: usize,
    handle: JoinHandle<()>,
}

pub struct WorkerManager {
    config: WorkersConfig,
    storage: Storage,
    notifier: Arc<dyn Notifier>,
    evaluator_queues: Vec<TaskQueue>,
    api_queues: Vec<TaskQueue>,
    evaluators_added: bool,
    api_workers_added: bool,
    api_client: Option<ApiClient>,
    threads: Vec<WorkerThread>,
}

impl std::fmt::Debug for WorkerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerManager")
            .field("evaluator_workers", &self.evaluator_queues.len())
            .field("api_workers", &self.api_queues.len())
            .field("running_threads", &self.threads.len())
            .finish()
    }
}

impl WorkerManager {
    pub fn new(config: WorkersConfig, storage: Storage, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            config,
            storage,
            notifier,
            evaluator_queues: Vec::new(),
            api_queues: Vec::new(),
            evaluators_added: false,
            api_workers_added: false,
            api_client: None,
            threads: Vec::new(),
        }
    }

    pub fn evaluator_workers(&self) -> usize {
        self.evaluator_queues.len()
    }

    pub fn api_workers(&self) -> usize {
        self.api_queues.len()
    }

    /// Client for the API workers' RPC topic, once API workers exist
    pub fn api_client(&self) -> Option<ApiClient> {
        self.api_client.clone()
    }

    /// Spawn `count` evaluator workers on joinable queues
    ///
    /// The evaluator pool can be created only once per manager.
    pub fn add_evaluator_workers(&mut self, count: usize) -> GraphWorkersResult<()> {
        if self.evaluators_added {
            return Err(GraphWorkersError::InvalidState(
                "evaluator workers were already added".to_string(),
            ));
        }
        if count == 0 {
            return Err(GraphWorkersError::Configuration(
                "at least one evaluator worker is required".to_string(),
            ));
        }
        self.evaluators_added = true;

        info!("🏗️ MANAGER: Starting {} evaluator workers", count);
        for worker_id in 0..count {
            let (queue, receiver) =
                TaskQueue::joinable(WorkerKind::Evaluator.thread_name(worker_id));
            let storage = self.storage.clone();
            let notifier = self.notifier.clone();
            let topic = self.config.notifier.topic.clone();

            let handle = spawn_worker_thread(WorkerKind::Evaluator, worker_id, move || {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()?;
                runtime.block_on(async move {
                    let worker =
                        EvaluatorWorker::start(worker_id, count, storage, notifier, &topic).await?;
                    worker.run(receiver).await;
                    Ok::<(), GraphWorkersError>(())
                })
            })?;

            self.evaluator_queues.push(queue);
            self.threads.push(WorkerThread {
                kind: WorkerKind::Evaluator,
                worker_id,
                handle,
            });
        }
        Ok(())
    }

    /// Spawn `count` API workers on plain queues, all serving one RPC topic
    ///
    /// The API pool can be created only once per manager.
    pub fn add_api_workers(&mut self, count: usize) -> GraphWorkersResult<()> {
        if self.api_workers_added {
            return Err(GraphWorkersError::InvalidState(
                "API workers were already added".to_string(),
            ));
        }
        self.api_workers_added = true;

        let (client, requests) =
            rpc_channel(&self.config.rpc.topic, self.config.rpc.request_buffer_size);

        info!("🏗️ MANAGER: Starting {} API workers", count);
        for worker_id in 0..count {
            let (queue, receiver) = TaskQueue::plain(WorkerKind::Api.thread_name(worker_id));
            let storage = self.storage.clone();
            let notifier = self.notifier.clone();
            let requests = requests.clone();
            let notification_topic = self.config.notifier.topic.clone();
            let rpc_topic = self.config.rpc.topic.clone();
            let server_threads = self.config.rpc.server_threads;

            let handle = spawn_worker_thread(WorkerKind::Api, worker_id, move || {
                let runtime = tokio::runtime::Builder::new_multi_thread()
                    .worker_threads(server_threads.max(1))
                    .thread_name(format!("api-worker-{worker_id}-rpc"))
                    .enable_all()
                    .build()?;
                runtime.block_on(async move {
                    let worker = ApiWorker::start(
                        worker_id,
                        storage,
                        notifier,
                        &notification_topic,
                        &rpc_topic,
                        requests,
                    );
                    worker.run(receiver).await;
                });
                Ok(())
            })?;

            self.api_queues.push(queue);
            self.threads.push(WorkerThread {
                kind: WorkerKind::Api,
                worker_id,
                handle,
            });
        }

        if count > 0 {
            self.api_client = Some(client);
        }
        Ok(())
    }

    /// Broadcast one authoritative mutation to every worker and wait for the
    /// evaluator pool to apply it
    #[instrument(skip(self, before, current))]
    pub async fn submit_graph_update(
        &self,
        before: Option<GraphElement>,
        current: Option<GraphElement>,
        is_vertex: bool,
    ) -> GraphWorkersResult<()> {
        let task = Task::graph_update(before, current, is_vertex);
        self.submit_and_wait(self.all_queues(), task).await
    }

    #[instrument(skip(self))]
    pub async fn submit_start_evaluations(&self) -> GraphWorkersResult<()> {
        self.submit_and_wait(self.evaluator_queues.iter(), Task::StartEvaluation)
            .await
    }

    #[instrument(skip(self))]
    pub async fn submit_enable_evaluations(&self) -> GraphWorkersResult<()> {
        self.submit_and_wait(self.evaluator_queues.iter(), Task::EnableEvaluation)
            .await
    }

    #[instrument(skip(self))]
    pub async fn submit_evaluators_reload_templates(&self) -> GraphWorkersResult<()> {
        self.submit_and_wait(self.evaluator_queues.iter(), Task::ReloadTemplates)
            .await
    }

    #[instrument(skip(self))]
    pub async fn submit_read_db_graph(&self) -> GraphWorkersResult<()> {
        self.submit_and_wait(self.all_queues(), Task::ReadDbGraph)
            .await
    }

    /// Liveness barrier: returns once every joinable worker handled a no-op
    #[instrument(skip(self))]
    pub async fn wait_for_worker_start(&self) -> GraphWorkersResult<()> {
        self.submit_and_wait(self.all_queues(), Task::WaitForWorkerStart)
            .await?;
        info!("✅ MANAGER: All workers started");
        Ok(())
    }

    /// Apply (`"add"`) or undo (`"delete"`) the templates whose status
    /// indicates a pending transition
    ///
    /// Standard template names are dispatched to evaluator worker 0 only.
    /// Once it finished, every template found moves to ACTIVE or DELETED and
    /// a status change notification is published for it.
    #[instrument(skip(self, event))]
    pub async fn submit_template_event(&self, event: &Value) -> GraphWorkersResult<()> {
        let template_action = event
            .get("template_action")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let (query_status, new_status, action_mode) = match template_action {
            template_actions::ADD => (TemplateStatus::Loading, TemplateStatus::Active, ActionMode::Do),
            template_actions::DELETE => {
                (TemplateStatus::Deleting, TemplateStatus::Deleted, ActionMode::Undo)
            }
            other => {
                return Err(GraphWorkersError::InvalidTemplateAction(format!(
                    "invalid template_action '{other}'"
                )))
            }
        };

        let target = self.evaluator_queues.first().ok_or_else(|| {
            GraphWorkersError::InvalidState("no evaluator workers to run template actions".to_string())
        })?;

        let templates = self.storage.templates.query_by_status(query_status).await?;
        let template_names: Vec<String> = templates
            .iter()
            .filter(|template| template.is_standard())
            .map(|template| template.name.clone())
            .collect();

        info!(
            "🏗️ MANAGER: Dispatching template {} for {:?} to evaluator worker 0",
            template_action, template_names
        );
        self.submit_and_wait(
            std::iter::once(target),
            Task::TemplateAction {
                template_names,
                action_mode,
            },
        )
        .await?;

        for template in &templates {
            self.storage
                .templates
                .update_status(template.uuid, new_status)
                .await?;
            log_template_operation(
                template_action,
                &template.name,
                new_status.as_str(),
                Some(template.template_type.as_str()),
            );

            let notification = Notification::new(
                self.config.notifier.topic.clone(),
                events::TEMPLATE_STATUS_CHANGED,
                json!({
                    "uuid": template.uuid,
                    "name": template.name,
                    "template_type": template.template_type.as_str(),
                    "status": new_status.as_str(),
                }),
            );
            if let Err(e) = self.notifier.publish(notification) {
                warn!(template = %template.name, error = %e, "Failed to publish template status change");
            }
        }
        Ok(())
    }

    /// Forward every change of the authoritative graph, one at a time, until
    /// the graph is dropped
    ///
    /// A failed broadcast is logged and the feed keeps being followed.
    pub async fn follow_graph_changes(&self, mut feed: GraphChangeFeed) -> usize {
        let mut forwarded = 0;
        while let Some(change) = feed.next_change().await {
            if let Err(e) = self
                .submit_graph_update(change.before, change.current, change.is_vertex)
                .await
            {
                warn!(error = %e, "⚠️ MANAGER: Graph update broadcast failed");
            }
            forwarded += 1;
        }
        info!(forwarded, "🏗️ MANAGER: Graph change feed closed");
        forwarded
    }

    /// Ask every worker for its replica and task counters
    ///
    /// Replies arrive in queue order per worker; the collection fails if any
    /// worker does not answer within `timeout`.
    #[instrument(skip(self))]
    pub async fn collect_status(&self, timeout: Duration) -> GraphWorkersResult<Vec<WorkerStatus>> {
        let (reply, mut replies) = mpsc::unbounded_channel();
        let mut expected = 0;
        for queue in self.all_queues() {
            match queue.put(Task::ReportStatus {
                reply: reply.clone(),
            }) {
                Ok(()) => expected += 1,
                Err(e) => warn!(queue = %queue.name(), error = %e, "Worker unreachable for status"),
            }
        }
        drop(reply);

        let mut statuses = Vec::with_capacity(expected);
        let collected = tokio::time::timeout(timeout, async {
            while statuses.len() < expected {
                match replies.recv().await {
                    Some(status) => statuses.push(status),
                    None => break,
                }
            }
        })
        .await;

        if collected.is_err() || statuses.len() < expected {
            return Err(GraphWorkersError::Timeout(format!(
                "{} of {} workers reported status",
                statuses.len(),
                expected
            )));
        }
        statuses.sort_by_key(|status| (status.worker_kind.as_str(), status.worker_id));
        Ok(statuses)
    }

    /// Ask every worker to leave its receive loop and wait for the threads
    ///
    /// Returns [`GraphWorkersError::Timeout`] if some worker is still running
    /// after `grace`; its thread is left detached.
    pub async fn shutdown(&mut self, grace: Duration) -> GraphWorkersResult<()> {
        info!("🛑 MANAGER: Shutting down {} workers", self.threads.len());
        for queue in self.all_queues() {
            if let Err(e) = queue.put(Task::Shutdown) {
                warn!(queue = %queue.name(), error = %e, "Worker already gone");
            }
        }
        self.api_client = None;

        let threads = std::mem::take(&mut self.threads);
        let joined = tokio::time::timeout(
            grace,
            join_all(threads.into_iter().map(|thread| {
                tokio::task::spawn_blocking(move || {
                    if thread.handle.join().is_err() {
                        warn!(
                            worker_kind = %thread.kind,
                            worker_id = thread.worker_id,
                            "Worker thread panicked"
                        );
                    }
                })
            })),
        )
        .await;

        match joined {
            Ok(_) => {
                info!("✅ MANAGER: All workers stopped");
                Ok(())
            }
            Err(_) => Err(GraphWorkersError::Timeout(format!(
                "workers still running after {grace:?}"
            ))),
        }
    }

    fn all_queues(&self) -> impl Iterator<Item = &TaskQueue> {
        self.evaluator_queues.iter().chain(self.api_queues.iter())
    }

    /// Put `task` on every queue, then join the joinable ones
    ///
    /// Queues are filled first so all workers start on the task together. A
    /// queue whose worker is gone is skipped and reported after the join.
    async fn submit_and_wait<'a>(
        &self,
        queues: impl Iterator<Item = &'a TaskQueue>,
        task: Task,
    ) -> GraphWorkersResult<()> {
        let mut delivered = Vec::new();
        let mut failures = Vec::new();
        for queue in queues {
            match queue.put(task.clone()) {
                Ok(()) => delivered.push(queue),
                Err(e) => {
                    warn!(queue = %queue.name(), error = %e, "⚠️ MANAGER: Task not delivered");
                    failures.push(e.to_string());
                }
            }
        }

        for result in join_all(delivered.iter().map(|queue| queue.join())).await {
            if let Err(e) = result {
                failures.push(e.to_string());
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(GraphWorkersError::Worker(failures.join("; ")))
        }
    }
}

impl Drop for WorkerManager {
    fn drop(&mut self) {
        // Dropping the queues ends every receive loop; threads finish on their own
        if !self.threads.is_empty() {
            tracing::debug!(
                threads = self.threads.len(),
                "Worker manager dropped without shutdown"
            );
        }
    }
}
