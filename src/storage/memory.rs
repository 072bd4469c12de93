//! In-process storage backend.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use uuid::Uuid;

use super::models::{GraphSnapshot, StoredEvent, TemplateRecord, TemplateStatus, WebhookRecord};
use super::{EventStore, SnapshotStore, TemplateStore, WebhookStore};
use crate::error::{GraphWorkersError, GraphWorkersResult};
use crate::graph::GraphElement;

#[derive(Debug, Default)]
pub struct MemoryStorage {
    snapshots: RwLock<Vec<GraphSnapshot>>,
    events: RwLock<Vec<StoredEvent>>,
    templates: DashMap<Uuid, TemplateRecord>,
    webhooks: DashMap<Uuid, WebhookRecord>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Synchronous lookup used by tests and diagnostics
    pub fn template(&self, uuid: Uuid) -> Option<TemplateRecord> {
        self.templates.get(&uuid).map(|entry| entry.value().clone())
    }

    pub fn template_by_name(&self, name: &str) -> Option<TemplateRecord> {
        self.templates
            .iter()
            .find(|entry| entry.value().name == name)
            .map(|entry| entry.value().clone())
    }

    fn sorted_templates(&self, status: Option<TemplateStatus>) -> Vec<TemplateRecord> {
        let mut templates: Vec<TemplateRecord> = self
            .templates
            .iter()
            .filter(|entry| status.map_or(true, |s| entry.value().status == s))
            .map(|entry| entry.value().clone())
            .collect();
        templates.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.name.cmp(&b.name))
        });
        templates
    }
}

#[async_trait]
impl SnapshotStore for MemoryStorage {
    async fn latest_snapshot(&self) -> GraphWorkersResult<Option<GraphSnapshot>> {
        Ok(self.snapshots.read().last().cloned())
    }

    async fn save_snapshot(
        &self,
        event_id: i64,
        graph_snapshot: Vec<u8>,
    ) -> GraphWorkersResult<GraphSnapshot> {
        let mut snapshots = self.snapshots.write();
        let snapshot = GraphSnapshot {
            snapshot_id: snapshots.len() as i64 + 1,
            event_id,
            graph_snapshot,
            created_at: Utc::now(),
        };
        snapshots.push(snapshot.clone());
        Ok(snapshot)
    }
}

#[async_trait]
impl EventStore for MemoryStorage {
    async fn append_event(
        &self,
        is_vertex: bool,
        before: Option<GraphElement>,
        current: Option<GraphElement>,
    ) -> GraphWorkersResult<i64> {
        let mut events = self.events.write();
        let event_id = events.last().map_or(1, |last| last.event_id + 1);
        events.push(StoredEvent {
            event_id,
            is_vertex,
            before,
            current,
            collector_timestamp: Utc::now(),
        });
        Ok(event_id)
    }

    async fn events_after(&self, event_id: i64) -> GraphWorkersResult<Vec<StoredEvent>> {
        // Appends are monotonic, so the buffer is already in ascending order
        Ok(self
            .events
            .read()
            .iter()
            .filter(|event| event.event_id > event_id)
            .cloned()
            .collect())
    }

    async fn last_event_id(&self) -> GraphWorkersResult<Option<i64>> {
        Ok(self.events.read().last().map(|event| event.event_id))
    }
}

#[async_trait]
impl TemplateStore for MemoryStorage {
    async fn upsert(&self, template: TemplateRecord) -> GraphWorkersResult<()> {
        self.templates.insert(template.uuid, template);
        Ok(())
    }

    async fn query_by_status(
        &self,
        status: TemplateStatus,
    ) -> GraphWorkersResult<Vec<TemplateRecord>> {
        Ok(self.sorted_templates(Some(status)))
    }

    async fn list(&self) -> GraphWorkersResult<Vec<TemplateRecord>> {
        Ok(self.sorted_templates(None))
    }

    async fn update_status(&self, uuid: Uuid, status: TemplateStatus) -> GraphWorkersResult<()> {
        let mut template = self
            .templates
            .get_mut(&uuid)
            .ok_or_else(|| GraphWorkersError::storage(format!("template {uuid} not found")))?;
        template.status = status;
        Ok(())
    }
}

#[async_trait]
impl WebhookStore for MemoryStorage {
    async fn add_webhook(&self, webhook: WebhookRecord) -> GraphWorkersResult<()> {
        self.webhooks.insert(webhook.id, webhook);
        Ok(())
    }

    async fn list_webhooks(&self) -> GraphWorkersResult<Vec<WebhookRecord>> {
        let mut webhooks: Vec<WebhookRecord> = self
            .webhooks
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        webhooks.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(webhooks)
    }
}
