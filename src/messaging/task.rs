//! Coordination messages sent from the manager to its workers.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

use crate::graph::GraphElement;
use crate::worker::status::WorkerStatus;

/// Direction in which scenario actions are executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionMode {
    /// Execute the scenario's actions
    Do,
    /// Roll back the scenario's actions
    Undo,
}

impl ActionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionMode::Do => "do",
            ActionMode::Undo => "undo",
        }
    }

    pub fn inverse(&self) -> Self {
        match self {
            ActionMode::Do => ActionMode::Undo,
            ActionMode::Undo => ActionMode::Do,
        }
    }
}

impl fmt::Display for ActionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A task placed on a worker's queue
#[derive(Debug, Clone)]
pub enum Task {
    /// Liveness barrier; handling it is the acknowledgement
    WaitForWorkerStart,
    /// Rebuild the replica from the latest snapshot plus event replay
    ReadDbGraph,
    /// Apply one authoritative mutation to the replica
    GraphUpdate {
        before: Option<GraphElement>,
        current: Option<GraphElement>,
        is_vertex: bool,
    },
    /// Turn on incremental evaluation without a full pass
    EnableEvaluation,
    /// Run a full evaluation pass over the replica
    StartEvaluation,
    /// Rebuild the sharded scenario repository from storage
    ReloadTemplates,
    /// Apply or undo the scenarios of specific templates
    TemplateAction {
        template_names: Vec<String>,
        action_mode: ActionMode,
    },
    /// Report replica and task counters back to the manager
    ReportStatus {
        reply: mpsc::UnboundedSender<WorkerStatus>,
    },
    /// Leave the receive loop
    Shutdown,
}

impl Task {
    pub fn graph_update(
        before: Option<GraphElement>,
        current: Option<GraphElement>,
        is_vertex: bool,
    ) -> Self {
        Task::GraphUpdate {
            before,
            current,
            is_vertex,
        }
    }

    /// Stable tag used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Task::WaitForWorkerStart => "wait_for_worker_start",
            Task::ReadDbGraph => "read_db_graph",
            Task::GraphUpdate { .. } => "graph_update",
            Task::EnableEvaluation => "enable_evaluation",
            Task::StartEvaluation => "start_evaluation",
            Task::ReloadTemplates => "reload_templates",
            Task::TemplateAction { .. } => "template_action",
            Task::ReportStatus { .. } => "report_status",
            Task::Shutdown => "shutdown",
        }
    }
}
