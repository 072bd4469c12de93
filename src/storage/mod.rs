//! # Storage Module
//!
//! Persistence seams used by the workers: the latest graph snapshot, the
//! buffered graph events newer than it, the template lifecycle and the
//! webhook registry. [`MemoryStorage`] backs tests and single-node runs;
//! [`PostgresStorage`](postgres::PostgresStorage) is available with the
//! `postgres` feature.

pub mod memory;
pub mod models;
#[cfg(feature = "postgres")]
pub mod postgres;

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::GraphWorkersResult;
use crate::graph::GraphElement;

pub use memory::MemoryStorage;
pub use models::{
    GraphSnapshot, StoredEvent, TemplateRecord, TemplateStatus, TemplateType, WebhookRecord,
};

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// The most recent snapshot, if one was ever taken
    async fn latest_snapshot(&self) -> GraphWorkersResult<Option<GraphSnapshot>>;

    async fn save_snapshot(
        &self,
        event_id: i64,
        graph_snapshot: Vec<u8>,
    ) -> GraphWorkersResult<GraphSnapshot>;
}

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Persist one graph mutation and return its event id
    async fn append_event(
        &self,
        is_vertex: bool,
        before: Option<GraphElement>,
        current: Option<GraphElement>,
    ) -> GraphWorkersResult<i64>;

    /// Events with an id strictly greater than `event_id`, ascending
    async fn events_after(&self, event_id: i64) -> GraphWorkersResult<Vec<StoredEvent>>;

    async fn last_event_id(&self) -> GraphWorkersResult<Option<i64>>;
}

#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn upsert(&self, template: TemplateRecord) -> GraphWorkersResult<()>;

    /// Templates in `status`, ordered by creation time then name
    async fn query_by_status(&self, status: TemplateStatus)
        -> GraphWorkersResult<Vec<TemplateRecord>>;

    /// All templates, ordered by creation time then name
    async fn list(&self) -> GraphWorkersResult<Vec<TemplateRecord>>;

    async fn update_status(&self, uuid: Uuid, status: TemplateStatus) -> GraphWorkersResult<()>;
}

#[async_trait]
pub trait WebhookStore: Send + Sync {
    async fn add_webhook(&self, webhook: WebhookRecord) -> GraphWorkersResult<()>;

    async fn list_webhooks(&self) -> GraphWorkersResult<Vec<WebhookRecord>>;
}

/// Handle bundling every store a worker may need
#[derive(Clone)]
pub struct Storage {
    pub snapshots: Arc<dyn SnapshotStore>,
    pub events: Arc<dyn EventStore>,
    pub templates: Arc<dyn TemplateStore>,
    pub webhooks: Arc<dyn WebhookStore>,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage").finish_non_exhaustive()
    }
}

impl Storage {
    /// Every store backed by one shared implementation
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: SnapshotStore + EventStore + TemplateStore + WebhookStore + 'static,
    {
        Self {
            snapshots: backend.clone(),
            events: backend.clone(),
            templates: backend.clone(),
            webhooks: backend,
        }
    }

    pub fn in_memory() -> Self {
        Self::from_backend(Arc::new(MemoryStorage::new()))
    }
}
