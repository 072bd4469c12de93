//! # Entity Graph
//!
//! In-memory property graph used both as the authoritative graph and as the
//! private replica each worker owns. Vertices are keyed by id, edges by
//! `(source, target, label)`. Iteration order is deterministic so two graphs
//! with the same content serialize to the same snapshot.
//!
//! A graph built with [`EntityGraph::with_change_feed`] emits one
//! [`GraphChange`] per committed mutation, in commit order.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tokio::sync::mpsc;
use tracing::debug;

use super::change_feed::{GraphChange, GraphChangeFeed};
use super::element::{Edge, EdgeKey, GraphElement, Properties, Vertex};
use crate::error::{GraphWorkersError, GraphWorkersResult};

#[derive(Debug, Default)]
pub struct EntityGraph {
    name: String,
    vertices: BTreeMap<String, Vertex>,
    edges: BTreeMap<EdgeKey, Edge>,
    ready: bool,
    change_sender: Option<mpsc::UnboundedSender<GraphChange>>,
}

/// Serialized form of a whole graph, used for snapshots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphContent {
    pub vertices: Vec<Vertex>,
    pub edges: Vec<Edge>,
}

impl EntityGraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Create an authoritative graph together with the feed of its mutations
    pub fn with_change_feed(name: impl Into<String>) -> (Self, GraphChangeFeed) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let graph = Self {
            name: name.into(),
            change_sender: Some(sender),
            ..Self::default()
        };
        (graph, GraphChangeFeed::new(receiver))
    }

    /// Start emitting changes from this point on
    ///
    /// Content already in the graph is not replayed into the feed. Attaching
    /// again replaces the previous feed, which then ends.
    pub fn attach_change_feed(&mut self) -> GraphChangeFeed {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.change_sender = Some(sender);
        GraphChangeFeed::new(receiver)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn get_vertex(&self, vertex_id: &str) -> Option<&Vertex> {
        self.vertices.get(vertex_id)
    }

    pub fn get_edge(&self, source_id: &str, target_id: &str, label: &str) -> Option<&Edge> {
        self.edges.get(&EdgeKey {
            source_id: source_id.to_string(),
            target_id: target_id.to_string(),
            label: label.to_string(),
        })
    }

    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.vertices.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    /// Edges touching `vertex_id`, in either direction
    pub fn incident_edges<'a>(&'a self, vertex_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges
            .values()
            .filter(move |edge| edge.source_id == vertex_id || edge.target_id == vertex_id)
    }

    pub fn outgoing_edges<'a>(&'a self, vertex_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges
            .values()
            .filter(move |edge| edge.source_id == vertex_id)
    }

    /// Vertices adjacent to `vertex_id`
    pub fn neighbors(&self, vertex_id: &str) -> Vec<&Vertex> {
        self.incident_edges(vertex_id)
            .filter_map(|edge| {
                let other = if edge.source_id == vertex_id {
                    &edge.target_id
                } else {
                    &edge.source_id
                };
                self.vertices.get(other)
            })
            .collect()
    }

    /// Insert a vertex, replacing any existing vertex with the same id
    pub fn add_vertex(&mut self, vertex: Vertex) {
        let before = self.vertices.insert(vertex.vertex_id.clone(), vertex.clone());
        self.emit(before.map(GraphElement::Vertex), Some(vertex.into()), true);
    }

    /// Merge properties into an existing vertex; `null` values remove keys
    pub fn update_vertex(&mut self, vertex_id: &str, properties: Properties) -> GraphWorkersResult<()> {
        let current = self
            .vertices
            .get_mut(vertex_id)
            .ok_or_else(|| GraphWorkersError::graph(format!("vertex '{vertex_id}' not found")))?;
        let before = current.clone();
        merge_properties(&mut current.properties, properties);
        let after = current.clone();
        self.emit(Some(before.into()), Some(after.into()), true);
        Ok(())
    }

    /// Remove a vertex and every edge incident to it
    pub fn remove_vertex(&mut self, vertex_id: &str) -> GraphWorkersResult<Vertex> {
        let removed = self
            .vertices
            .remove(vertex_id)
            .ok_or_else(|| GraphWorkersError::graph(format!("vertex '{vertex_id}' not found")))?;
        self.edges
            .retain(|key, _| key.source_id != vertex_id && key.target_id != vertex_id);
        self.emit(Some(removed.clone().into()), None, true);
        Ok(removed)
    }

    /// Insert an edge, replacing any existing edge with the same key
    ///
    /// Both endpoints must already be present.
    pub fn add_edge(&mut self, edge: Edge) -> GraphWorkersResult<()> {
        for endpoint in [&edge.source_id, &edge.target_id] {
            if !self.vertices.contains_key(endpoint) {
                return Err(GraphWorkersError::graph(format!(
                    "cannot add edge {}: vertex '{endpoint}' not found",
                    edge.key()
                )));
            }
        }
        let before = self.edges.insert(edge.key(), edge.clone());
        self.emit(before.map(GraphElement::Edge), Some(edge.into()), false);
        Ok(())
    }

    /// Merge properties into an existing edge; `null` values remove keys
    pub fn update_edge(&mut self, key: &EdgeKey, properties: Properties) -> GraphWorkersResult<()> {
        let current = self
            .edges
            .get_mut(key)
            .ok_or_else(|| GraphWorkersError::graph(format!("edge {key} not found")))?;
        let before = current.clone();
        merge_properties(&mut current.properties, properties);
        let after = current.clone();
        self.emit(Some(before.into()), Some(after.into()), false);
        Ok(())
    }

    pub fn remove_edge(&mut self, key: &EdgeKey) -> GraphWorkersResult<Edge> {
        let removed = self
            .edges
            .remove(key)
            .ok_or_else(|| GraphWorkersError::graph(format!("edge {key} not found")))?;
        self.emit(Some(removed.clone().into()), None, false);
        Ok(removed)
    }

    pub fn content(&self) -> GraphContent {
        GraphContent {
            vertices: self.vertices.values().cloned().collect(),
            edges: self.edges.values().cloned().collect(),
        }
    }

    /// Hex SHA-256 over every vertex and edge with their properties
    ///
    /// Two graphs with equal content have equal digests regardless of the
    /// order their mutations were applied in.
    pub fn content_digest(&self) -> String {
        let mut hasher = Sha256::new();
        for vertex in self.vertices.values() {
            hasher.update(b"v");
            digest_field(&mut hasher, &vertex.vertex_id);
            digest_properties(&mut hasher, &vertex.properties);
        }
        for edge in self.edges.values() {
            hasher.update(b"e");
            digest_field(&mut hasher, &edge.source_id);
            digest_field(&mut hasher, &edge.target_id);
            digest_field(&mut hasher, &edge.label);
            digest_properties(&mut hasher, &edge.properties);
        }
        format!("{:x}", hasher.finalize())
    }

    pub fn to_snapshot(&self) -> GraphWorkersResult<Vec<u8>> {
        Ok(serde_json::to_vec(&self.content())?)
    }

    /// Replace the whole content of this graph with a serialized snapshot
    ///
    /// Loading does not emit change notifications.
    pub fn load_snapshot(&mut self, snapshot: &[u8]) -> GraphWorkersResult<()> {
        let content: GraphContent = serde_json::from_slice(snapshot)?;
        self.vertices = content
            .vertices
            .into_iter()
            .map(|vertex| (vertex.vertex_id.clone(), vertex))
            .collect();
        self.edges = content
            .edges
            .into_iter()
            .map(|edge| (edge.key(), edge))
            .collect();
        debug!(
            graph = %self.name,
            vertices = self.vertices.len(),
            edges = self.edges.len(),
            "Loaded graph snapshot"
        );
        Ok(())
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.edges.clear();
        self.ready = false;
    }

    fn emit(&self, before: Option<GraphElement>, current: Option<GraphElement>, is_vertex: bool) {
        if let Some(sender) = &self.change_sender {
            // A closed feed means nobody replicates this graph any more
            let _ = sender.send(GraphChange {
                before,
                current,
                is_vertex,
            });
        }
    }
}

// Length-prefixed so adjacent fields cannot run into each other
fn digest_field(hasher: &mut Sha256, field: &str) {
    hasher.update((field.len() as u64).to_le_bytes());
    hasher.update(field.as_bytes());
}

fn digest_properties(hasher: &mut Sha256, properties: &Properties) {
    hasher.update((properties.len() as u64).to_le_bytes());
    for (key, value) in properties {
        digest_field(hasher, key);
        digest_field(hasher, &value.to_string());
    }
}

fn merge_properties(target: &mut Properties, update: Properties) {
    for (key, value) in update {
        if value.is_null() {
            target.remove(&key);
        } else {
            target.insert(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn graph_with_two_vertices() -> EntityGraph {
        let mut graph = EntityGraph::new("test");
        graph.add_vertex(Vertex::new("a"));
        graph.add_vertex(Vertex::new("b"));
        graph
    }

    #[test]
    fn test_add_edge_requires_endpoints() {
        let mut graph = EntityGraph::new("test");
        graph.add_vertex(Vertex::new("a"));
        let err = graph.add_edge(Edge::new("a", "missing", "on")).unwrap_err();
        assert!(err.to_string().contains("missing"));
        assert_eq!(graph.num_edges(), 0);
    }

    #[test]
    fn test_remove_vertex_removes_incident_edges() {
        let mut graph = graph_with_two_vertices();
        graph.add_edge(Edge::new("a", "b", "on")).unwrap();
        graph.remove_vertex("a").unwrap();

        assert_eq!(graph.num_vertices(), 1);
        assert_eq!(graph.num_edges(), 0);
    }

    #[test]
    fn test_remove_missing_edge_fails() {
        let mut graph = graph_with_two_vertices();
        let key = Edge::new("a", "b", "on").key();
        assert!(graph.remove_edge(&key).is_err());
    }

    #[test]
    fn test_update_vertex_merges_and_removes_null_keys() {
        let mut graph = EntityGraph::new("test");
        graph.add_vertex(
            Vertex::new("a")
                .with_property("state", "ok")
                .with_property("stale", 1),
        );

        let mut update = Properties::new();
        update.insert("state".to_string(), json!("error"));
        update.insert("stale".to_string(), serde_json::Value::Null);
        graph.update_vertex("a", update).unwrap();

        let vertex = graph.get_vertex("a").unwrap();
        assert_eq!(vertex.get_str("state"), Some("error"));
        assert!(vertex.get("stale").is_none());
    }

    #[test]
    fn test_neighbors() {
        let mut graph = graph_with_two_vertices();
        graph.add_vertex(Vertex::new("c"));
        graph.add_edge(Edge::new("a", "b", "on")).unwrap();
        graph.add_edge(Edge::new("c", "a", "contains")).unwrap();

        let mut ids: Vec<_> = graph
            .neighbors("a")
            .into_iter()
            .map(|v| v.vertex_id.clone())
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn test_snapshot_restores_identical_content() {
        let mut graph = graph_with_two_vertices();
        graph.add_edge(Edge::new("a", "b", "on").with_property("weight", 3)).unwrap();
        let snapshot = graph.to_snapshot().unwrap();

        let mut restored = EntityGraph::new("replica");
        restored.add_vertex(Vertex::new("leftover"));
        restored.load_snapshot(&snapshot).unwrap();

        assert_eq!(restored.content(), graph.content());
    }

    #[test]
    fn test_content_digest_tracks_content_not_history() {
        let mut first = graph_with_two_vertices();
        first.add_edge(Edge::new("a", "b", "on")).unwrap();

        let mut second = EntityGraph::new("other");
        second.add_vertex(Vertex::new("b"));
        second.add_vertex(Vertex::new("a").with_property("state", "ok"));
        second.add_edge(Edge::new("a", "b", "on")).unwrap();
        assert_ne!(first.content_digest(), second.content_digest());

        let mut update = Properties::new();
        update.insert("state".to_string(), serde_json::Value::Null);
        second.update_vertex("a", update).unwrap();
        assert_eq!(first.content_digest(), second.content_digest());

        // Same counts, different edge
        second.remove_edge(&Edge::new("a", "b", "on").key()).unwrap();
        second.add_edge(Edge::new("b", "a", "on")).unwrap();
        assert_eq!(first.num_edges(), second.num_edges());
        assert_ne!(first.content_digest(), second.content_digest());
    }

    #[tokio::test]
    async fn test_attached_feed_only_reports_later_mutations() {
        let mut graph = graph_with_two_vertices();
        let mut feed = graph.attach_change_feed();
        assert!(feed.try_next_change().is_none());

        graph.add_vertex(Vertex::new("c"));
        let change = feed.next_change().await.unwrap();
        assert_eq!(change.current.unwrap().as_vertex().unwrap().vertex_id, "c");
        assert!(feed.try_next_change().is_none());
    }

    #[tokio::test]
    async fn test_change_feed_reports_mutations_in_order() {
        let (mut graph, mut feed) = EntityGraph::with_change_feed("authoritative");
        graph.add_vertex(Vertex::new("a"));
        graph.add_vertex(Vertex::new("b"));
        graph.add_edge(Edge::new("a", "b", "on")).unwrap();
        graph.remove_vertex("b").unwrap();

        let first = feed.next_change().await.unwrap();
        assert!(first.is_vertex && first.before.is_none());
        let second = feed.next_change().await.unwrap();
        assert_eq!(second.current.unwrap().as_vertex().unwrap().vertex_id, "b");
        let third = feed.next_change().await.unwrap();
        assert!(!third.is_vertex);
        let fourth = feed.next_change().await.unwrap();
        assert!(fourth.is_vertex && fourth.current.is_none());
    }
}
