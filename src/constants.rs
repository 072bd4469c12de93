//! # System Constants
//!
//! Topics, property keys and entity categories shared by the graph replicas,
//! the evaluator and the API endpoints.

/// Message topics
pub mod topics {
    pub const RPC_API: &str = "rpc_api";
    pub const NOTIFICATIONS: &str = "vitrage_notifications";
}

/// Well-known vertex and edge property keys
pub mod properties {
    pub const CATEGORY: &str = "vitrage_category";
    pub const TYPE: &str = "vitrage_type";
    pub const NAME: &str = "name";
    pub const STATE: &str = "state";
    pub const IS_DELETED: &str = "vitrage_is_deleted";
}

/// Vertex categories
pub mod categories {
    pub const RESOURCE: &str = "RESOURCE";
    pub const ALARM: &str = "ALARM";
}

/// Edge labels
pub mod edge_labels {
    pub const CAUSES: &str = "causes";
    pub const ON: &str = "on";
    pub const CONTAINS: &str = "contains";
}

/// Notification event types
pub mod events {
    pub const ACTION_DO: &str = "evaluator.action.do";
    pub const ACTION_UNDO: &str = "evaluator.action.undo";
    pub const TEMPLATE_STATUS_CHANGED: &str = "template.status_changed";
    pub const EXTERNAL_EVENT: &str = "api.event.posted";
}

/// Runtime environments recognized by the config loader
pub mod environments {
    pub const DEVELOPMENT: &str = "development";
    pub const TEST: &str = "test";
    pub const PRODUCTION: &str = "production";
}

/// Template event actions accepted by `submit_template_event`
pub mod template_actions {
    pub const ADD: &str = "add";
    pub const DELETE: &str = "delete";
}
