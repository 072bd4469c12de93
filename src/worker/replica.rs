//! # Replica Applier
//!
//! Replica maintenance shared by every worker kind: applying one graph
//! mutation, and rebuilding a replica from the latest snapshot plus the
//! events buffered after it.

use tracing::{debug, info};

use crate::error::{GraphWorkersError, GraphWorkersResult};
use crate::graph::{EntityGraph, GraphChangeFeed, GraphElement};
use crate::storage::Storage;

#[derive(Debug, Clone)]
pub struct ReplicaApplier {
    storage: Storage,
}

impl ReplicaApplier {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Apply one mutation to `graph`
    ///
    /// With `current` present the element is added (or replaced); without it
    /// `before` identifies the element to remove.
    pub fn apply_graph_update(
        &self,
        graph: &mut EntityGraph,
        before: Option<&GraphElement>,
        current: Option<&GraphElement>,
        is_vertex: bool,
    ) -> GraphWorkersResult<()> {
        match (current, before, is_vertex) {
            (Some(GraphElement::Vertex(vertex)), _, true) => {
                graph.add_vertex(vertex.clone());
                Ok(())
            }
            (Some(GraphElement::Edge(edge)), _, false) => graph.add_edge(edge.clone()),
            (None, Some(GraphElement::Vertex(vertex)), true) => {
                graph.remove_vertex(&vertex.vertex_id).map(|_| ())
            }
            (None, Some(GraphElement::Edge(edge)), false) => {
                graph.remove_edge(&edge.key()).map(|_| ())
            }
            (None, None, _) => Err(GraphWorkersError::graph(
                "graph update carries neither before nor current element",
            )),
            (Some(element), _, _) | (None, Some(element), _) => {
                Err(GraphWorkersError::graph(format!(
                    "graph update with is_vertex={is_vertex} carries {}",
                    element.describe()
                )))
            }
        }
    }

    /// Rebuild `graph` from the latest snapshot and replay newer events
    ///
    /// Without a snapshot the replica starts empty and every buffered event
    /// is replayed. The replica is marked ready once replay completes.
    pub async fn read_db_graph(&self, graph: &mut EntityGraph) -> GraphWorkersResult<()> {
        let cutoff = match self.storage.snapshots.latest_snapshot().await? {
            Some(snapshot) => {
                graph.load_snapshot(&snapshot.graph_snapshot)?;
                snapshot.event_id
            }
            None => {
                debug!(graph = %graph.name(), "No graph snapshot found, replaying all events");
                graph.clear();
                0
            }
        };

        let events = self.storage.events.events_after(cutoff).await?;
        let replayed = events.len();
        for event in events {
            self.apply_graph_update(
                graph,
                event.before.as_ref(),
                event.current.as_ref(),
                event.is_vertex,
            )?;
        }
        graph.set_ready(true);

        info!(
            graph = %graph.name(),
            cutoff_event_id = cutoff,
            replayed_events = replayed,
            vertices = graph.num_vertices(),
            edges = graph.num_edges(),
            "📥 REPLICA: Graph loaded from storage"
        );
        Ok(())
    }

    /// Load the authoritative graph the same way replicas load theirs
    ///
    /// The change feed is attached after replay, so the replayed events are
    /// not forwarded again to replicas that replay them on their own.
    pub async fn load_authoritative_graph(
        &self,
        name: &str,
    ) -> GraphWorkersResult<(EntityGraph, GraphChangeFeed)> {
        let mut graph = EntityGraph::new(name);
        self.read_db_graph(&mut graph).await?;
        let feed = graph.attach_change_feed();
        Ok((graph, feed))
    }
}
