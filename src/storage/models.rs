//! Persisted records: graph snapshots, buffered graph events, templates and webhooks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::GraphWorkersError;
use crate::evaluator::ScenarioDefinition;
use crate::graph::GraphElement;

/// Latest serialized graph plus the id of the last event it includes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub snapshot_id: i64,
    /// Events with an id greater than this are not part of the snapshot
    pub event_id: i64,
    pub graph_snapshot: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

/// A graph mutation buffered for replay after a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: i64,
    pub is_vertex: bool,
    pub before: Option<GraphElement>,
    pub current: Option<GraphElement>,
    pub collector_timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TemplateStatus {
    Loading,
    Active,
    Error,
    Deleting,
    Deleted,
}

impl TemplateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateStatus::Loading => "LOADING",
            TemplateStatus::Active => "ACTIVE",
            TemplateStatus::Error => "ERROR",
            TemplateStatus::Deleting => "DELETING",
            TemplateStatus::Deleted => "DELETED",
        }
    }
}

impl fmt::Display for TemplateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateStatus {
    type Err = GraphWorkersError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOADING" => Ok(TemplateStatus::Loading),
            "ACTIVE" => Ok(TemplateStatus::Active),
            "ERROR" => Ok(TemplateStatus::Error),
            "DELETING" => Ok(TemplateStatus::Deleting),
            "DELETED" => Ok(TemplateStatus::Deleted),
            other => Err(GraphWorkersError::storage(format!(
                "unknown template status '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateType {
    Standard,
    Equivalence,
    Definition,
}

impl TemplateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateType::Standard => "standard",
            TemplateType::Equivalence => "equivalence",
            TemplateType::Definition => "definition",
        }
    }
}

impl FromStr for TemplateType {
    type Err = GraphWorkersError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(TemplateType::Standard),
            "equivalence" => Ok(TemplateType::Equivalence),
            "definition" => Ok(TemplateType::Definition),
            other => Err(GraphWorkersError::storage(format!(
                "unknown template type '{other}'"
            ))),
        }
    }
}

/// A persisted template and the scenarios it was loaded into
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateRecord {
    pub uuid: Uuid,
    pub name: String,
    pub status: TemplateStatus,
    pub template_type: TemplateType,
    pub scenarios: Vec<ScenarioDefinition>,
    pub created_at: DateTime<Utc>,
}

impl TemplateRecord {
    pub fn new(
        name: impl Into<String>,
        status: TemplateStatus,
        scenarios: Vec<ScenarioDefinition>,
    ) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            status,
            template_type: TemplateType::Standard,
            scenarios,
            created_at: Utc::now(),
        }
    }

    pub fn with_type(mut self, template_type: TemplateType) -> Self {
        self.template_type = template_type;
        self
    }

    pub fn is_standard(&self) -> bool {
        self.template_type == TemplateType::Standard
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookRecord {
    pub id: Uuid,
    pub url: String,
    pub regex_filter: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl WebhookRecord {
    pub fn new(url: impl Into<String>, regex_filter: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            url: url.into(),
            regex_filter,
            created_at: Utc::now(),
        }
    }
}
