//! # Worker Status
//!
//! Point-in-time report a worker sends back to the manager on request. It
//! lets operators spot a replica that silently drifted after a failed task,
//! without changing how task failures are handled.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::graph::EntityGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerKind {
    Evaluator,
    Api,
}

impl WorkerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerKind::Evaluator => "evaluator",
            WorkerKind::Api => "api",
        }
    }

    /// Thread name of worker `worker_id` of this kind
    pub fn thread_name(&self, worker_id: usize) -> String {
        format!("{}-worker-{worker_id}", self.as_str())
    }
}

impl fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task counters kept by the receive loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounters {
    pub processed: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStatus {
    pub worker_kind: WorkerKind,
    pub worker_id: usize,
    /// Replica vertex count
    pub vertices: usize,
    /// Replica edge count
    pub edges: usize,
    /// [`EntityGraph::content_digest`] of the replica
    pub content_digest: String,
    pub ready: bool,
    pub tasks_processed: u64,
    pub tasks_failed: u64,
    /// Always false for API workers
    pub evaluation_enabled: bool,
}

impl WorkerStatus {
    /// Replica holds exactly the content of `graph`
    pub fn replica_matches(&self, graph: &EntityGraph) -> bool {
        self.vertices == graph.num_vertices()
            && self.edges == graph.num_edges()
            && self.content_digest == graph.content_digest()
    }

    pub fn description(&self) -> String {
        format!(
            "{} - {} vertices, {} edges, {} processed, {} failed",
            self.worker_kind.thread_name(self.worker_id),
            self.vertices,
            self.edges,
            self.tasks_processed,
            self.tasks_failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, Vertex};

    #[test]
    fn test_thread_names() {
        assert_eq!(WorkerKind::Evaluator.thread_name(0), "evaluator-worker-0");
        assert_eq!(WorkerKind::Api.thread_name(2), "api-worker-2");
    }

    fn status_of(graph: &EntityGraph) -> WorkerStatus {
        WorkerStatus {
            worker_kind: WorkerKind::Api,
            worker_id: 1,
            vertices: graph.num_vertices(),
            edges: graph.num_edges(),
            content_digest: graph.content_digest(),
            ready: true,
            tasks_processed: 7,
            tasks_failed: 1,
            evaluation_enabled: false,
        }
    }

    #[test]
    fn test_replica_matches_compares_content() {
        let mut authoritative = EntityGraph::new("authoritative");
        authoritative.add_vertex(Vertex::new("h1").with_property("state", "ok"));
        let status = status_of(&authoritative);
        assert!(status.replica_matches(&authoritative));

        authoritative.add_vertex(Vertex::new("h1").with_property("state", "down"));
        assert_eq!(status.vertices, authoritative.num_vertices());
        assert!(!status.replica_matches(&authoritative));
    }

    #[test]
    fn test_description() {
        let mut graph = EntityGraph::new("replica");
        for id in ["a", "b", "c"] {
            graph.add_vertex(Vertex::new(id));
        }
        graph.add_edge(Edge::new("a", "b", "on")).unwrap();
        graph.add_edge(Edge::new("b", "c", "on")).unwrap();
        let status = status_of(&graph);
        assert_eq!(
            status.description(),
            "api-worker-1 - 3 vertices, 2 edges, 7 processed, 1 failed"
        );
    }
}
