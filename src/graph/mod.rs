//! # Entity Graph Module
//!
//! Property-graph types shared by the authoritative graph and the per-worker
//! replicas.

pub mod change_feed;
pub mod element;
pub mod entity_graph;

pub use change_feed::{GraphChange, GraphChangeFeed};
pub use element::{Edge, EdgeKey, GraphElement, Properties, Vertex};
pub use entity_graph::{EntityGraph, GraphContent};
