//! Shared fixtures for the worker integration tests.
//!
//! A [`TestCluster`] is a manager with both pools running over in-memory
//! storage and a broadcast notifier the test can subscribe to.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use entity_graph_workers::config::WorkersConfig;
use entity_graph_workers::constants::{categories, edge_labels, properties};
use entity_graph_workers::evaluator::{ActionSpec, ActionType, ScenarioDefinition};
use entity_graph_workers::notifier::{BroadcastNotifier, Notification};
use entity_graph_workers::storage::{MemoryStorage, TemplateRecord, TemplateStatus};
use entity_graph_workers::{Edge, EntityGraph, Storage, Vertex, WorkerManager, WorkerStatus};
use tokio::sync::broadcast;

pub const STATUS_TIMEOUT: Duration = Duration::from_secs(5);
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub struct TestCluster {
    pub manager: WorkerManager,
    pub backend: Arc<MemoryStorage>,
    pub storage: Storage,
    pub notifier: Arc<BroadcastNotifier>,
    evaluator_workers: usize,
    api_workers: usize,
}

impl TestCluster {
    /// Manager over fresh in-memory storage; no pools are started
    pub fn new(evaluator_workers: usize, api_workers: usize) -> Self {
        let backend = Arc::new(MemoryStorage::new());
        Self::with_backend(backend, evaluator_workers, api_workers)
    }

    pub fn with_backend(
        backend: Arc<MemoryStorage>,
        evaluator_workers: usize,
        api_workers: usize,
    ) -> Self {
        let storage = Storage::from_backend(backend.clone());
        let config = test_config(evaluator_workers, api_workers);
        let notifier = Arc::new(BroadcastNotifier::from_config(&config.notifier));
        let manager = WorkerManager::new(config, storage.clone(), notifier.clone());
        Self {
            manager,
            backend,
            storage,
            notifier,
            evaluator_workers,
            api_workers,
        }
    }

    /// Start both pools and wait until every joinable worker is alive
    pub async fn start(evaluator_workers: usize, api_workers: usize) -> Self {
        let mut cluster = Self::new(evaluator_workers, api_workers);
        cluster.start_pools().await;
        cluster
    }

    pub async fn start_pools(&mut self) {
        self.manager
            .add_evaluator_workers(self.evaluator_workers)
            .expect("failed to add evaluator workers");
        self.manager
            .add_api_workers(self.api_workers)
            .expect("failed to add API workers");
        self.manager
            .wait_for_worker_start()
            .await
            .expect("workers did not start");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifier.subscribe()
    }

    pub async fn statuses(&self) -> Vec<WorkerStatus> {
        self.manager
            .collect_status(STATUS_TIMEOUT)
            .await
            .expect("status collection timed out")
    }

    pub async fn shutdown(mut self) {
        self.manager
            .shutdown(SHUTDOWN_GRACE)
            .await
            .expect("workers did not stop in time");
    }
}

pub fn test_config(evaluator_workers: usize, api_workers: usize) -> WorkersConfig {
    let mut config = WorkersConfig::default();
    config.workers.evaluator_workers = evaluator_workers;
    config.workers.api_workers = api_workers;
    config.rpc.server_threads = 1;
    config.shutdown.graceful_timeout_seconds = SHUTDOWN_GRACE.as_secs();
    config
}

pub fn host(id: &str) -> Vertex {
    Vertex::new(id)
        .with_property(properties::CATEGORY, categories::RESOURCE)
        .with_property(properties::TYPE, "nova.host")
        .with_property(properties::NAME, id)
}

pub fn down_host(id: &str) -> Vertex {
    host(id).with_property(properties::STATE, "down")
}

pub fn alarm(id: &str) -> Vertex {
    Vertex::new(id)
        .with_property(properties::CATEGORY, categories::ALARM)
        .with_property(properties::NAME, id)
}

pub fn contains(source: &str, target: &str) -> Edge {
    Edge::new(source, target, edge_labels::CONTAINS)
}

/// Standard template with one scenario raising an alarm on down hosts
pub fn host_down_template(name: &str, status: TemplateStatus) -> TemplateRecord {
    TemplateRecord::new(
        name,
        status,
        vec![ScenarioDefinition::new(name, 0)
            .with_condition(properties::STATE, "down")
            .with_action(ActionSpec::new(ActionType::RaiseAlarm))],
    )
}

/// Drain every notification already published
pub fn drain(receiver: &mut broadcast::Receiver<Notification>) -> Vec<Notification> {
    let mut received = Vec::new();
    while let Ok(notification) = receiver.try_recv() {
        received.push(notification);
    }
    received
}

/// Feed-less copy of `graph`, still comparable after the original is dropped
pub fn detached_copy(graph: &EntityGraph) -> EntityGraph {
    let mut copy = EntityGraph::new("expected");
    copy.load_snapshot(&graph.to_snapshot().expect("snapshot"))
        .expect("load snapshot");
    copy
}

/// Every replica holds exactly the content of `expected`
pub fn assert_replicas_match(statuses: &[WorkerStatus], expected: &EntityGraph) {
    for status in statuses {
        assert!(
            status.replica_matches(expected),
            "{} digest {} expected {} vertices, {} edges, digest {}",
            status.description(),
            status.content_digest,
            expected.num_vertices(),
            expected.num_edges(),
            expected.content_digest()
        );
    }
}
