//! # API Worker
//!
//! A worker whose replica is also read by an RPC server running on the same
//! runtime. The replica sits behind the API lock: every task takes the write
//! side for its whole duration and every endpoint call the read side, so
//! calls only ever see the graph between two tasks.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::info;

use super::base::{run_receive_loop, TaskHandler};
use super::replica::ReplicaApplier;
use super::status::{TaskCounters, WorkerKind, WorkerStatus};
use crate::api::{ApiEndpoints, RpcServer, SharedGraph, SharedRpcReceiver};
use crate::error::{GraphWorkersError, GraphWorkersResult};
use crate::graph::EntityGraph;
use crate::messaging::{Task, TaskReceiver};
use crate::notifier::Notifier;
use crate::storage::Storage;

#[derive(Debug)]
pub struct ApiWorker {
    worker_id: usize,
    graph: SharedGraph,
    applier: ReplicaApplier,
    server: Option<JoinHandle<()>>,
}

impl ApiWorker {
    /// Build the replica and endpoints, and start the RPC server in the
    /// background on the current runtime
    pub fn start(
        worker_id: usize,
        storage: Storage,
        notifier: Arc<dyn Notifier>,
        notification_topic: &str,
        rpc_topic: &str,
        requests: SharedRpcReceiver,
    ) -> Self {
        let graph: SharedGraph = Arc::new(RwLock::new(EntityGraph::new(
            WorkerKind::Api.thread_name(worker_id),
        )));
        let endpoints = ApiEndpoints::new(
            worker_id,
            graph.clone(),
            storage.clone(),
            notifier,
            notification_topic,
        );
        let server = RpcServer::new(rpc_topic, endpoints).start(requests);

        info!(
            worker_id,
            rpc_topic = %rpc_topic,
            "✅ WORKER: API worker started with 0 vertices"
        );
        Self {
            worker_id,
            graph,
            applier: ReplicaApplier::new(storage),
            server: Some(server),
        }
    }

    /// Run the receive loop until shutdown, then stop the RPC server
    pub async fn run(mut self, receiver: TaskReceiver) {
        run_receive_loop(&mut self, receiver).await;
        if let Some(server) = self.server.take() {
            server.abort();
        }
    }

    /// Replica handle shared with the endpoints
    pub fn graph(&self) -> SharedGraph {
        self.graph.clone()
    }

    async fn apply(&self, task: Task) -> GraphWorkersResult<()> {
        let task_kind = task.kind();
        let mut graph = self.graph.write().await;
        match task {
            Task::WaitForWorkerStart => Ok(()),
            Task::ReadDbGraph => self.applier.read_db_graph(&mut graph).await,
            Task::GraphUpdate {
                before,
                current,
                is_vertex,
            } => self.applier.apply_graph_update(
                &mut graph,
                before.as_ref(),
                current.as_ref(),
                is_vertex,
            ),
            _ => Err(GraphWorkersError::InvalidState(format!(
                "API worker does not handle {task_kind}"
            ))),
        }
    }
}

#[async_trait]
impl TaskHandler for ApiWorker {
    fn kind(&self) -> WorkerKind {
        WorkerKind::Api
    }

    fn worker_id(&self) -> usize {
        self.worker_id
    }

    async fn do_task(&mut self, task: Task) -> GraphWorkersResult<()> {
        self.apply(task).await
    }

    async fn status(&self, counters: TaskCounters) -> WorkerStatus {
        let graph = self.graph.read().await;
        WorkerStatus {
            worker_kind: WorkerKind::Api,
            worker_id: self.worker_id,
            vertices: graph.num_vertices(),
            edges: graph.num_edges(),
            content_digest: graph.content_digest(),
            ready: graph.is_ready(),
            tasks_processed: counters.processed,
            tasks_failed: counters.failed,
            evaluation_enabled: false,
        }
    }
}
