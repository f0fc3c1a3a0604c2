//! Workflow validation errors.

use thiserror::Error;

/// Why a workflow definition cannot be stored or activated.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The JSON does not describe a workflow at all.
    #[error("malformed workflow definition: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("workflow name must not be empty")]
    EmptyName,

    #[error("workflow has no nodes")]
    NoNodes,

    #[error("node '{0}' has an empty node_type")]
    EmptyNodeType(String),

    /// Webhook path is empty or contains a slash.
    #[error("invalid webhook path: '{0}'")]
    InvalidWebhookPath(String),

    /// Cron expression does not have exactly five fields.
    #[error("invalid cron expression: '{0}'")]
    InvalidCron(String),

    /// Two or more nodes share the same ID.
    #[error("duplicate node ID: '{0}'")]
    DuplicateNodeId(String),

    /// An edge references a node ID that doesn't exist in the workflow.
    #[error("edge references unknown node '{node_id}' ({side} side)")]
    UnknownNodeReference {
        node_id: String,
        side: &'static str,
    },

    /// Topological sort detected a cycle.
    #[error("workflow graph contains a cycle")]
    CycleDetected,
}
