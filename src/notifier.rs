//! # Notifier
//!
//! Outbound notifications emitted when scenario actions fire or templates and
//! external events pass through the API. Consumers outside the workers
//! subscribe to the topic they care about.
//!
//! ```rust
//! use entity_graph_workers::notifier::{BroadcastNotifier, Notification, Notifier};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let notifier = BroadcastNotifier::new("vitrage_notifications", 16);
//! let mut subscriber = notifier.subscribe();
//!
//! notifier
//!     .publish(Notification::new(
//!         notifier.topic(),
//!         "api.event.posted",
//!         json!({"host": "compute-1"}),
//!     ))
//!     .unwrap();
//! assert_eq!(subscriber.recv().await.unwrap().payload["host"], "compute-1");
//! # });
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tokio::sync::broadcast;
use tracing::debug;

use crate::config::NotifierConfig;
use crate::error::GraphWorkersResult;

/// Notification published on a topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub topic: String,
    pub event_type: String,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub fn new(topic: impl Into<String>, event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            topic: topic.into(),
            event_type: event_type.into(),
            payload,
            timestamp: Utc::now(),
        }
    }
}

pub trait Notifier: Send + Sync + fmt::Debug {
    fn publish(&self, notification: Notification) -> GraphWorkersResult<()>;
}

/// In-process fan-out notifier over a tokio broadcast channel
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    topic: String,
    sender: broadcast::Sender<Notification>,
}

impl BroadcastNotifier {
    pub fn new(topic: impl Into<String>, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            topic: topic.into(),
            sender,
        }
    }

    pub fn from_config(config: &NotifierConfig) -> Self {
        Self::new(config.topic.clone(), config.buffer_size)
    }

    /// Topic this notifier publishes on
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::from_config(&NotifierConfig::default())
    }
}

impl Notifier for BroadcastNotifier {
    fn publish(&self, notification: Notification) -> GraphWorkersResult<()> {
        // No subscribers is fine, the notification is simply not observed
        if self.sender.send(notification).is_err() {
            debug!(topic = %self.topic, "Notification published with no subscribers");
        }
        Ok(())
    }
}
