//! Workflow definition types.
//!
//! A definition is what the chat assistant produces and what gets stored in
//! the JSONB `definition` column of the `workflows` table. Execution happens
//! at the workflow provider; these types only describe shape.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Trigger
// ---------------------------------------------------------------------------

/// How a workflow is started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    /// Triggered by an incoming HTTP request to `/webhook/{path}`.
    Webhook {
        /// URL path segment that identifies this workflow.
        path: String,
    },
    /// Triggered manually via the REST API.
    Manual,
    /// Triggered on a cron schedule.
    Cron {
        /// Standard cron expression (5 fields).
        expression: String,
    },
}

// ---------------------------------------------------------------------------
// NodeDefinition
// ---------------------------------------------------------------------------

/// A single step in the workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDefinition {
    /// Unique identifier within this workflow (referenced by edges).
    pub id: String,
    /// Provider component key, e.g. `slack.send_message`.
    pub node_type: String,
    /// Arbitrary configuration forwarded to the provider.
    #[serde(default)]
    pub config: serde_json::Value,
}

impl NodeDefinition {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            config: serde_json::Value::Null,
        }
    }
}

// ---------------------------------------------------------------------------
// Edge
// ---------------------------------------------------------------------------

/// Directed edge from one node to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
}

impl Edge {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self { from: from.into(), to: to.into() }
    }
}

// ---------------------------------------------------------------------------
// WorkflowDefinition
// ---------------------------------------------------------------------------

/// A complete workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub trigger: Trigger,
    pub nodes: Vec<NodeDefinition>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl WorkflowDefinition {
    pub fn new(trigger: Trigger, nodes: Vec<NodeDefinition>, edges: Vec<Edge>) -> Self {
        Self { trigger, nodes, edges }
    }

    /// Parse a stored JSONB definition.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, crate::WorkflowError> {
        serde_json::from_value(value.clone()).map_err(crate::WorkflowError::Malformed)
    }

    /// Nodes wired in a straight line: `ids[0] → ids[1] → …`.
    pub fn linear(trigger: Trigger, ids: &[&str]) -> Self {
        let nodes = ids.iter().map(|id| NodeDefinition::new(*id, "noop")).collect();
        let edges = ids.windows(2).map(|w| Edge::new(w[0], w[1])).collect();
        Self { trigger, nodes, edges }
    }
}
