//! Turning triggered scenario actions into outbound notifications.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

use super::scenario::ActionSpec;
use crate::constants::events;
use crate::messaging::ActionMode;
use crate::notifier::{Notification, Notifier};

/// One action of a triggered scenario, bound to the element it fired on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionInfo {
    pub scenario_id: String,
    pub action: ActionSpec,
    pub mode: ActionMode,
    /// Vertex id, or the edge description for edge-triggered actions
    pub target_id: String,
}

#[derive(Debug, Clone)]
pub struct ActionExecutor {
    topic: String,
    notifier: Arc<dyn Notifier>,
}

impl ActionExecutor {
    pub fn new(topic: impl Into<String>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            topic: topic.into(),
            notifier,
        }
    }

    /// Publish every action; returns how many were published
    ///
    /// A failed publish is logged and does not stop the remaining actions.
    pub fn execute(&self, actions: &[ActionInfo]) -> usize {
        let mut published = 0;
        for action in actions {
            let event_type = match action.mode {
                ActionMode::Do => events::ACTION_DO,
                ActionMode::Undo => events::ACTION_UNDO,
            };
            let notification = Notification::new(
                self.topic.clone(),
                event_type,
                json!({
                    "scenario_id": action.scenario_id,
                    "action_type": action.action.action_type.as_str(),
                    "properties": action.action.properties,
                    "target_id": action.target_id,
                }),
            );

            match self.notifier.publish(notification) {
                Ok(()) => {
                    debug!(
                        scenario_id = %action.scenario_id,
                        mode = %action.mode,
                        target_id = %action.target_id,
                        "Executed scenario action"
                    );
                    published += 1;
                }
                Err(e) => warn!(
                    scenario_id = %action.scenario_id,
                    error = %e,
                    "Failed to publish scenario action"
                ),
            }
        }
        published
    }
}
