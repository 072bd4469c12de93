//! Request and response types of the RPC API.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::graph::{GraphContent, Vertex};
use crate::storage::{TemplateRecord, TemplateStatus, TemplateType, WebhookRecord};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ApiRequest {
    GetTopology,
    ListResources { resource_type: Option<String> },
    ShowResource { vertex_id: String },
    ListAlarms,
    GetRca { alarm_id: String },
    ListTemplates,
    PostEvent { event_type: String, details: Value },
    ListWebhooks,
    GetStatus,
}

impl ApiRequest {
    pub fn method(&self) -> &'static str {
        match self {
            ApiRequest::GetTopology => "get_topology",
            ApiRequest::ListResources { .. } => "list_resources",
            ApiRequest::ShowResource { .. } => "show_resource",
            ApiRequest::ListAlarms => "list_alarms",
            ApiRequest::GetRca { .. } => "get_rca",
            ApiRequest::ListTemplates => "list_templates",
            ApiRequest::PostEvent { .. } => "post_event",
            ApiRequest::ListWebhooks => "list_webhooks",
            ApiRequest::GetStatus => "get_status",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateSummary {
    pub uuid: Uuid,
    pub name: String,
    pub status: TemplateStatus,
    pub template_type: TemplateType,
    pub scenarios: usize,
}

impl From<&TemplateRecord> for TemplateSummary {
    fn from(template: &TemplateRecord) -> Self {
        Self {
            uuid: template.uuid,
            name: template.name.clone(),
            status: template.status,
            template_type: template.template_type,
            scenarios: template.scenarios.len(),
        }
    }
}

/// Alarm plus every alarm connected to it through causal edges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RcaGraph {
    pub alarm_id: String,
    pub graph: GraphContent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiStatus {
    pub worker_id: usize,
    pub vertices: usize,
    pub edges: usize,
    pub ready: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", content = "data", rename_all = "snake_case")]
pub enum ApiResponse {
    Topology(GraphContent),
    Resources(Vec<Vertex>),
    Resource(Vertex),
    Alarms(Vec<Vertex>),
    Rca(RcaGraph),
    Templates(Vec<TemplateSummary>),
    EventPosted { event_type: String },
    Webhooks(Vec<WebhookRecord>),
    Status(ApiStatus),
    Error(String),
}
