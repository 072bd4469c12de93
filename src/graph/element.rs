//! Vertex and edge types carried by graph replicas and `graph_update` tasks.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::constants::properties;

pub type Properties = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub vertex_id: String,
    #[serde(default)]
    pub properties: Properties,
}

impl Vertex {
    pub fn new(vertex_id: impl Into<String>) -> Self {
        Self {
            vertex_id: vertex_id.into(),
            properties: Properties::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }

    pub fn category(&self) -> Option<&str> {
        self.get_str(properties::CATEGORY)
    }

    pub fn entity_type(&self) -> Option<&str> {
        self.get_str(properties::TYPE)
    }

    pub fn name(&self) -> Option<&str> {
        self.get_str(properties::NAME)
    }

    pub fn is_deleted(&self) -> bool {
        is_deleted(&self.properties)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeKey {
    pub source_id: String,
    pub target_id: String,
    pub label: String,
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -[{}]-> {}", self.source_id, self.label, self.target_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source_id: String,
    pub target_id: String,
    pub label: String,
    #[serde(default)]
    pub properties: Properties,
}

impl Edge {
    pub fn new(
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            label: label.into(),
            properties: Properties::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn key(&self) -> EdgeKey {
        EdgeKey {
            source_id: self.source_id.clone(),
            target_id: self.target_id.clone(),
            label: self.label.clone(),
        }
    }

    pub fn is_deleted(&self) -> bool {
        is_deleted(&self.properties)
    }
}

/// A vertex or an edge, as carried by change notifications
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "element", rename_all = "snake_case")]
pub enum GraphElement {
    Vertex(Vertex),
    Edge(Edge),
}

impl GraphElement {
    pub fn is_vertex(&self) -> bool {
        matches!(self, GraphElement::Vertex(_))
    }

    pub fn as_vertex(&self) -> Option<&Vertex> {
        match self {
            GraphElement::Vertex(vertex) => Some(vertex),
            GraphElement::Edge(_) => None,
        }
    }

    pub fn as_edge(&self) -> Option<&Edge> {
        match self {
            GraphElement::Edge(edge) => Some(edge),
            GraphElement::Vertex(_) => None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        match self {
            GraphElement::Vertex(vertex) => vertex.is_deleted(),
            GraphElement::Edge(edge) => edge.is_deleted(),
        }
    }

    /// Identifier used in log lines
    pub fn describe(&self) -> String {
        match self {
            GraphElement::Vertex(vertex) => format!("vertex {}", vertex.vertex_id),
            GraphElement::Edge(edge) => format!("edge {}", edge.key()),
        }
    }
}

impl From<Vertex> for GraphElement {
    fn from(vertex: Vertex) -> Self {
        GraphElement::Vertex(vertex)
    }
}

impl From<Edge> for GraphElement {
    fn from(edge: Edge) -> Self {
        GraphElement::Edge(edge)
    }
}

fn is_deleted(props: &Properties) -> bool {
    props
        .get(properties::IS_DELETED)
        .and_then(Value::as_bool)
        .unwrap_or(false)
}
