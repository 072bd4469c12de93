//! # PostgreSQL Storage
//!
//! sqlx-backed implementation of the storage traits. Graph elements and
//! scenario definitions are stored as JSONB; the snapshot blob as BYTEA.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::Row;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::models::{GraphSnapshot, StoredEvent, TemplateRecord, TemplateStatus, WebhookRecord};
use super::{EventStore, SnapshotStore, Storage, TemplateStore, WebhookStore};
use crate::error::{GraphWorkersError, GraphWorkersResult};
use crate::evaluator::ScenarioDefinition;
use crate::graph::GraphElement;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS graph_snapshots (
        snapshot_id BIGSERIAL PRIMARY KEY,
        event_id BIGINT NOT NULL,
        graph_snapshot BYTEA NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS graph_events (
        event_id BIGSERIAL PRIMARY KEY,
        is_vertex BOOLEAN NOT NULL,
        payload_before JSONB,
        payload_current JSONB,
        collector_timestamp TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS templates (
        uuid UUID PRIMARY KEY,
        name VARCHAR(255) NOT NULL,
        status VARCHAR(16) NOT NULL,
        template_type VARCHAR(16) NOT NULL,
        scenarios JSONB NOT NULL DEFAULT '[]'::jsonb,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS webhooks (
        id UUID PRIMARY KEY,
        url TEXT NOT NULL,
        regex_filter TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
];

#[derive(Debug, Clone)]
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    pub async fn connect(database_url: &str) -> GraphWorkersResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the tables if they do not exist yet
    pub async fn migrate(&self) -> GraphWorkersResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("🗄️ STORAGE: Schema ready");
        Ok(())
    }

    pub fn into_storage(self) -> Storage {
        Storage::from_backend(Arc::new(self))
    }
}

fn snapshot_from_row(row: &PgRow) -> GraphWorkersResult<GraphSnapshot> {
    Ok(GraphSnapshot {
        snapshot_id: row.try_get("snapshot_id")?,
        event_id: row.try_get("event_id")?,
        graph_snapshot: row.try_get("graph_snapshot")?,
        created_at: row.try_get("created_at")?,
    })
}

fn event_from_row(row: &PgRow) -> GraphWorkersResult<StoredEvent> {
    let before: Option<Json<GraphElement>> = row.try_get("payload_before")?;
    let current: Option<Json<GraphElement>> = row.try_get("payload_current")?;
    Ok(StoredEvent {
        event_id: row.try_get("event_id")?,
        is_vertex: row.try_get("is_vertex")?,
        before: before.map(|json| json.0),
        current: current.map(|json| json.0),
        collector_timestamp: row.try_get("collector_timestamp")?,
    })
}

fn template_from_row(row: &PgRow) -> GraphWorkersResult<TemplateRecord> {
    let status: String = row.try_get("status")?;
    let template_type: String = row.try_get("template_type")?;
    let scenarios: Json<Vec<ScenarioDefinition>> = row.try_get("scenarios")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    Ok(TemplateRecord {
        uuid: row.try_get("uuid")?,
        name: row.try_get("name")?,
        status: status.parse()?,
        template_type: template_type.parse()?,
        scenarios: scenarios.0,
        created_at,
    })
}

#[async_trait]
impl SnapshotStore for PostgresStorage {
    async fn latest_snapshot(&self) -> GraphWorkersResult<Option<GraphSnapshot>> {
        let row = sqlx::query(
            "SELECT snapshot_id, event_id, graph_snapshot, created_at
             FROM graph_snapshots ORDER BY snapshot_id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(snapshot_from_row).transpose()
    }

    async fn save_snapshot(
        &self,
        event_id: i64,
        graph_snapshot: Vec<u8>,
    ) -> GraphWorkersResult<GraphSnapshot> {
        let row = sqlx::query(
            "INSERT INTO graph_snapshots (event_id, graph_snapshot) VALUES ($1, $2)
             RETURNING snapshot_id, event_id, graph_snapshot, created_at",
        )
        .bind(event_id)
        .bind(graph_snapshot)
        .fetch_one(&self.pool)
        .await?;

        snapshot_from_row(&row)
    }
}

#[async_trait]
impl EventStore for PostgresStorage {
    async fn append_event(
        &self,
        is_vertex: bool,
        before: Option<GraphElement>,
        current: Option<GraphElement>,
    ) -> GraphWorkersResult<i64> {
        let row = sqlx::query(
            "INSERT INTO graph_events (is_vertex, payload_before, payload_current)
             VALUES ($1, $2, $3) RETURNING event_id",
        )
        .bind(is_vertex)
        .bind(before.map(Json))
        .bind(current.map(Json))
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("event_id")?)
    }

    async fn events_after(&self, event_id: i64) -> GraphWorkersResult<Vec<StoredEvent>> {
        let rows = sqlx::query(
            "SELECT event_id, is_vertex, payload_before, payload_current, collector_timestamp
             FROM graph_events WHERE event_id > $1 ORDER BY event_id ASC",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(event_from_row).collect()
    }

    async fn last_event_id(&self) -> GraphWorkersResult<Option<i64>> {
        let row = sqlx::query("SELECT MAX(event_id) AS last_event_id FROM graph_events")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("last_event_id")?)
    }
}

#[async_trait]
impl TemplateStore for PostgresStorage {
    async fn upsert(&self, template: TemplateRecord) -> GraphWorkersResult<()> {
        sqlx::query(
            "INSERT INTO templates (uuid, name, status, template_type, scenarios, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (uuid) DO UPDATE SET
                name = EXCLUDED.name,
                status = EXCLUDED.status,
                template_type = EXCLUDED.template_type,
                scenarios = EXCLUDED.scenarios",
        )
        .bind(template.uuid)
        .bind(&template.name)
        .bind(template.status.as_str())
        .bind(template.template_type.as_str())
        .bind(Json(&template.scenarios))
        .bind(template.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn query_by_status(
        &self,
        status: TemplateStatus,
    ) -> GraphWorkersResult<Vec<TemplateRecord>> {
        let rows = sqlx::query(
            "SELECT uuid, name, status, template_type, scenarios, created_at
             FROM templates WHERE status = $1 ORDER BY created_at, name",
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(template_from_row).collect()
    }

    async fn list(&self) -> GraphWorkersResult<Vec<TemplateRecord>> {
        let rows = sqlx::query(
            "SELECT uuid, name, status, template_type, scenarios, created_at
             FROM templates ORDER BY created_at, name",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(template_from_row).collect()
    }

    async fn update_status(&self, uuid: Uuid, status: TemplateStatus) -> GraphWorkersResult<()> {
        let result = sqlx::query("UPDATE templates SET status = $1 WHERE uuid = $2")
            .bind(status.as_str())
            .bind(uuid)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(GraphWorkersError::storage(format!(
                "template {uuid} not found"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl WebhookStore for PostgresStorage {
    async fn add_webhook(&self, webhook: WebhookRecord) -> GraphWorkersResult<()> {
        sqlx::query(
            "INSERT INTO webhooks (id, url, regex_filter, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(webhook.id)
        .bind(&webhook.url)
        .bind(&webhook.regex_filter)
        .bind(webhook.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_webhooks(&self) -> GraphWorkersResult<Vec<WebhookRecord>> {
        let rows = sqlx::query(
            "SELECT id, url, regex_filter, created_at FROM webhooks ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> GraphWorkersResult<WebhookRecord> {
                Ok(WebhookRecord {
                    id: row.try_get("id")?,
                    url: row.try_get("url")?,
                    regex_filter: row.try_get("regex_filter")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }
}
