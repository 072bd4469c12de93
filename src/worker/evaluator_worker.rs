//! # Evaluator Worker
//!
//! A worker whose replica also drives a scenario evaluator over its shard of
//! the scenario repository. Evaluation starts disabled and is turned on by
//! either `StartEvaluation` (full pass) or `EnableEvaluation` (flag only).

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::base::{run_receive_loop, TaskHandler};
use super::replica::ReplicaApplier;
use super::status::{TaskCounters, WorkerKind, WorkerStatus};
use crate::error::{GraphWorkersError, GraphWorkersResult};
use crate::evaluator::{ActionExecutor, ScenarioEvaluator, ScenarioRepository};
use crate::graph::EntityGraph;
use crate::messaging::{ActionMode, Task, TaskReceiver};
use crate::notifier::Notifier;
use crate::storage::Storage;

#[derive(Debug)]
pub struct EvaluatorWorker {
    worker_id: usize,
    workers_num: usize,
    graph: EntityGraph,
    applier: ReplicaApplier,
    evaluator: ScenarioEvaluator,
}

impl EvaluatorWorker {
    /// Build the worker with its shard of the currently active templates
    pub async fn start(
        worker_id: usize,
        workers_num: usize,
        storage: Storage,
        notifier: Arc<dyn Notifier>,
        topic: &str,
    ) -> GraphWorkersResult<Self> {
        let templates = storage.templates.list().await?;
        let repository = ScenarioRepository::sharded(&templates, worker_id, workers_num);
        let evaluator = ScenarioEvaluator::new(repository, ActionExecutor::new(topic, notifier));

        let worker = Self {
            worker_id,
            workers_num,
            graph: EntityGraph::new(WorkerKind::Evaluator.thread_name(worker_id)),
            applier: ReplicaApplier::new(storage),
            evaluator,
        };
        worker.log_enabled_scenarios();
        info!(
            worker_id,
            workers_num,
            vertices = worker.graph.num_vertices(),
            "✅ WORKER: Evaluator worker started with {} vertices",
            worker.graph.num_vertices()
        );
        Ok(worker)
    }

    /// Run the receive loop on the current runtime until shutdown
    pub async fn run(mut self, receiver: TaskReceiver) {
        run_receive_loop(&mut self, receiver).await;
    }

    pub fn graph(&self) -> &EntityGraph {
        &self.graph
    }

    pub fn evaluator(&self) -> &ScenarioEvaluator {
        &self.evaluator
    }

    async fn reload_templates(&mut self) -> GraphWorkersResult<()> {
        let templates = self.applier.storage().templates.list().await?;
        self.evaluator.set_repository(ScenarioRepository::sharded(
            &templates,
            self.worker_id,
            self.workers_num,
        ));
        self.log_enabled_scenarios();
        Ok(())
    }

    /// Apply or undo the scenarios of `template_names` against the replica
    ///
    /// The temporary unsharded repository stays in place until the next
    /// `ReloadTemplates`.
    async fn template_action(
        &mut self,
        template_names: Vec<String>,
        action_mode: ActionMode,
    ) -> GraphWorkersResult<()> {
        let templates = self.applier.storage().templates.list().await?;
        let mut repository = ScenarioRepository::unsharded(&templates);
        repository.enable_only_templates(&template_names);
        self.evaluator.replace_repository(repository);
        self.log_enabled_scenarios();

        let actions = self.evaluator.run_evaluator(&self.graph, action_mode);
        info!(
            worker_id = self.worker_id,
            templates = ?template_names,
            mode = %action_mode,
            actions,
            "📚 EVALUATOR: Template action completed"
        );
        Ok(())
    }

    fn log_enabled_scenarios(&self) {
        info!(
            worker_id = self.worker_id,
            scenarios = ?self.evaluator.repository().enabled_ids(),
            "🧮 EVALUATOR: Enabled scenarios"
        );
    }
}

#[async_trait]
impl TaskHandler for EvaluatorWorker {
    fn kind(&self) -> WorkerKind {
        WorkerKind::Evaluator
    }

    fn worker_id(&self) -> usize {
        self.worker_id
    }

    async fn do_task(&mut self, task: Task) -> GraphWorkersResult<()> {
        let task_kind = task.kind();
        match task {
            Task::WaitForWorkerStart => Ok(()),
            Task::ReadDbGraph => self.applier.read_db_graph(&mut self.graph).await,
            Task::GraphUpdate {
                before,
                current,
                is_vertex,
            } => {
                self.applier.apply_graph_update(
                    &mut self.graph,
                    before.as_ref(),
                    current.as_ref(),
                    is_vertex,
                )?;
                self.evaluator
                    .process_event(before.as_ref(), current.as_ref(), is_vertex);
                Ok(())
            }
            Task::EnableEvaluation => {
                self.evaluator.set_enabled(true);
                info!(worker_id = self.worker_id, "🧮 EVALUATOR: Evaluation enabled");
                Ok(())
            }
            Task::StartEvaluation => {
                self.evaluator.run_evaluator(&self.graph, ActionMode::Do);
                Ok(())
            }
            Task::ReloadTemplates => self.reload_templates().await,
            Task::TemplateAction {
                template_names,
                action_mode,
            } => self.template_action(template_names, action_mode).await,
            Task::ReportStatus { .. } | Task::Shutdown => Err(GraphWorkersError::InvalidState(
                format!("{task_kind} is handled by the receive loop"),
            )),
        }
    }

    async fn status(&self, counters: TaskCounters) -> WorkerStatus {
        WorkerStatus {
            worker_kind: WorkerKind::Evaluator,
            worker_id: self.worker_id,
            vertices: self.graph.num_vertices(),
            edges: self.graph.num_edges(),
            content_digest: self.graph.content_digest(),
            ready: self.graph.is_ready(),
            tasks_processed: counters.processed,
            tasks_failed: counters.failed,
            evaluation_enabled: self.evaluator.is_enabled(),
        }
    }
}
