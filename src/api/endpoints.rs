//! # API Endpoints
//!
//! Endpoint objects served by an API worker. Graph-backed endpoints hold the
//! worker's replica behind its API lock and keep the read side for the whole
//! call, so a reply never reflects a half-applied graph update.

use serde_json::json;
use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use super::requests::{ApiRequest, ApiResponse, ApiStatus, RcaGraph, TemplateSummary};
use crate::constants::{categories, edge_labels, events};
use crate::error::{GraphWorkersError, GraphWorkersResult};
use crate::graph::{EntityGraph, GraphContent, Vertex};
use crate::notifier::{Notification, Notifier};
use crate::storage::Storage;

/// A worker's replica together with its API lock
pub type SharedGraph = Arc<RwLock<EntityGraph>>;

#[derive(Debug, Clone)]
pub struct TopologyApis {
    graph: SharedGraph,
}

impl TopologyApis {
    pub fn new(graph: SharedGraph) -> Self {
        Self { graph }
    }

    /// Every live vertex and the edges between them
    pub async fn get_topology(&self) -> GraphContent {
        let graph = self.graph.read().await;
        let vertices: Vec<Vertex> = graph
            .vertices()
            .filter(|vertex| !vertex.is_deleted())
            .cloned()
            .collect();
        let live: BTreeSet<&str> = vertices.iter().map(|v| v.vertex_id.as_str()).collect();
        let edges = graph
            .edges()
            .filter(|edge| {
                !edge.is_deleted()
                    && live.contains(edge.source_id.as_str())
                    && live.contains(edge.target_id.as_str())
            })
            .cloned()
            .collect();
        GraphContent { vertices, edges }
    }
}

#[derive(Debug, Clone)]
pub struct ResourceApis {
    graph: SharedGraph,
}

impl ResourceApis {
    pub fn new(graph: SharedGraph) -> Self {
        Self { graph }
    }

    pub async fn list_resources(&self, resource_type: Option<&str>) -> Vec<Vertex> {
        let graph = self.graph.read().await;
        graph
            .vertices()
            .filter(|vertex| is_live_in_category(vertex, categories::RESOURCE))
            .filter(|vertex| resource_type.map_or(true, |t| vertex.entity_type() == Some(t)))
            .cloned()
            .collect()
    }

    pub async fn show_resource(&self, vertex_id: &str) -> GraphWorkersResult<Vertex> {
        let graph = self.graph.read().await;
        graph
            .get_vertex(vertex_id)
            .filter(|vertex| is_live_in_category(vertex, categories::RESOURCE))
            .cloned()
            .ok_or_else(|| GraphWorkersError::Api(format!("resource '{vertex_id}' not found")))
    }
}

#[derive(Debug, Clone)]
pub struct AlarmApis {
    graph: SharedGraph,
}

impl AlarmApis {
    pub fn new(graph: SharedGraph) -> Self {
        Self { graph }
    }

    pub async fn list_alarms(&self) -> Vec<Vertex> {
        let graph = self.graph.read().await;
        graph
            .vertices()
            .filter(|vertex| is_live_in_category(vertex, categories::ALARM))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct RcaApis {
    graph: SharedGraph,
}

impl RcaApis {
    pub fn new(graph: SharedGraph) -> Self {
        Self { graph }
    }

    /// Alarms reachable from `alarm_id` over causal edges, in either direction
    pub async fn get_rca(&self, alarm_id: &str) -> GraphWorkersResult<RcaGraph> {
        let graph = self.graph.read().await;
        if !graph
            .get_vertex(alarm_id)
            .is_some_and(|vertex| is_live_in_category(vertex, categories::ALARM))
        {
            return Err(GraphWorkersError::Api(format!("alarm '{alarm_id}' not found")));
        }

        let mut visited = BTreeSet::from([alarm_id.to_string()]);
        let mut pending = VecDeque::from([alarm_id.to_string()]);
        while let Some(current) = pending.pop_front() {
            for edge in graph.incident_edges(&current) {
                if edge.label != edge_labels::CAUSES || edge.is_deleted() {
                    continue;
                }
                let other = if edge.source_id == current {
                    &edge.target_id
                } else {
                    &edge.source_id
                };
                if visited.insert(other.clone()) {
                    pending.push_back(other.clone());
                }
            }
        }

        let vertices = visited
            .iter()
            .filter_map(|id| graph.get_vertex(id))
            .filter(|vertex| !vertex.is_deleted())
            .cloned()
            .collect();
        let edges = graph
            .edges()
            .filter(|edge| {
                edge.label == edge_labels::CAUSES
                    && !edge.is_deleted()
                    && visited.contains(&edge.source_id)
                    && visited.contains(&edge.target_id)
            })
            .cloned()
            .collect();

        Ok(RcaGraph {
            alarm_id: alarm_id.to_string(),
            graph: GraphContent { vertices, edges },
        })
    }
}

#[derive(Debug, Clone)]
pub struct TemplateApis {
    storage: Storage,
}

impl TemplateApis {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub async fn list_templates(&self) -> GraphWorkersResult<Vec<TemplateSummary>> {
        let templates = self.storage.templates.list().await?;
        Ok(templates.iter().map(TemplateSummary::from).collect())
    }
}

#[derive(Debug, Clone)]
pub struct EventApis {
    topic: String,
    notifier: Arc<dyn Notifier>,
}

impl EventApis {
    pub fn new(topic: impl Into<String>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            topic: topic.into(),
            notifier,
        }
    }

    /// Forward an externally reported event to the notification topic
    pub fn post_event(&self, event_type: &str, details: serde_json::Value) -> GraphWorkersResult<()> {
        self.notifier.publish(Notification::new(
            self.topic.clone(),
            events::EXTERNAL_EVENT,
            json!({ "event_type": event_type, "details": details }),
        ))?;
        info!(event_type = %event_type, "📨 API: External event posted");
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct WebhookApis {
    storage: Storage,
}

impl WebhookApis {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub async fn list_webhooks(&self) -> GraphWorkersResult<Vec<crate::storage::WebhookRecord>> {
        self.storage.webhooks.list_webhooks().await
    }
}

#[derive(Debug, Clone)]
pub struct OperationalApis {
    worker_id: usize,
    graph: SharedGraph,
}

impl OperationalApis {
    pub fn new(worker_id: usize, graph: SharedGraph) -> Self {
        Self { worker_id, graph }
    }

    pub async fn get_status(&self) -> ApiStatus {
        let graph = self.graph.read().await;
        ApiStatus {
            worker_id: self.worker_id,
            vertices: graph.num_vertices(),
            edges: graph.num_edges(),
            ready: graph.is_ready(),
        }
    }
}

/// Every endpoint object of one API worker
#[derive(Debug, Clone)]
pub struct ApiEndpoints {
    pub topology: TopologyApis,
    pub resource: ResourceApis,
    pub alarm: AlarmApis,
    pub rca: RcaApis,
    pub template: TemplateApis,
    pub event: EventApis,
    pub webhook: WebhookApis,
    pub operational: OperationalApis,
}

impl ApiEndpoints {
    pub fn new(
        worker_id: usize,
        graph: SharedGraph,
        storage: Storage,
        notifier: Arc<dyn Notifier>,
        topic: &str,
    ) -> Self {
        Self {
            topology: TopologyApis::new(graph.clone()),
            resource: ResourceApis::new(graph.clone()),
            alarm: AlarmApis::new(graph.clone()),
            rca: RcaApis::new(graph.clone()),
            template: TemplateApis::new(storage.clone()),
            event: EventApis::new(topic, notifier),
            webhook: WebhookApis::new(storage),
            operational: OperationalApis::new(worker_id, graph),
        }
    }

    pub async fn dispatch(&self, request: ApiRequest) -> ApiResponse {
        let result = match request {
            ApiRequest::GetTopology => Ok(ApiResponse::Topology(self.topology.get_topology().await)),
            ApiRequest::ListResources { resource_type } => Ok(ApiResponse::Resources(
                self.resource.list_resources(resource_type.as_deref()).await,
            )),
            ApiRequest::ShowResource { vertex_id } => self
                .resource
                .show_resource(&vertex_id)
                .await
                .map(ApiResponse::Resource),
            ApiRequest::ListAlarms => Ok(ApiResponse::Alarms(self.alarm.list_alarms().await)),
            ApiRequest::GetRca { alarm_id } => self.rca.get_rca(&alarm_id).await.map(ApiResponse::Rca),
            ApiRequest::ListTemplates => self
                .template
                .list_templates()
                .await
                .map(ApiResponse::Templates),
            ApiRequest::PostEvent {
                event_type,
                details,
            } => self
                .event
                .post_event(&event_type, details)
                .map(|()| ApiResponse::EventPosted { event_type }),
            ApiRequest::ListWebhooks => self.webhook.list_webhooks().await.map(ApiResponse::Webhooks),
            ApiRequest::GetStatus => Ok(ApiResponse::Status(self.operational.get_status().await)),
        };
        result.unwrap_or_else(|e| ApiResponse::Error(e.to_string()))
    }
}

fn is_live_in_category(vertex: &Vertex, category: &str) -> bool {
    !vertex.is_deleted() && vertex.category() == Some(category)
}
