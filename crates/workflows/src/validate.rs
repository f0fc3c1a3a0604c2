//! Validation — run this before activating a workflow.
//!
//! Shape rules:
//! 1. The workflow has a non-empty name and at least one node.
//! 2. Every node names a component (`node_type` is non-empty).
//! 3. Webhook paths are a single non-empty segment; cron expressions have 5 fields.
//!
//! Graph rules (see [`validate_dag`]):
//! 4. Node IDs are unique.
//! 5. Every edge references known node IDs.
//! 6. The graph is acyclic.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::debug;

use crate::{Trigger, WorkflowDefinition, WorkflowError};

/// Validate a workflow for activation and return its node execution order.
pub fn validate_for_activation(
    name: &str,
    definition: &WorkflowDefinition,
) -> Result<Vec<String>, WorkflowError> {
    if name.trim().is_empty() {
        return Err(WorkflowError::EmptyName);
    }
    if definition.nodes.is_empty() {
        return Err(WorkflowError::NoNodes);
    }
    if let Some(node) = definition.nodes.iter().find(|n| n.node_type.trim().is_empty()) {
        return Err(WorkflowError::EmptyNodeType(node.id.clone()));
    }
    validate_trigger(&definition.trigger)?;

    let order = validate_dag(definition)?;
    debug!(nodes = order.len(), "workflow validated for activation");
    Ok(order)
}

fn validate_trigger(trigger: &Trigger) -> Result<(), WorkflowError> {
    match trigger {
        Trigger::Webhook { path } if path.trim().is_empty() || path.contains('/') => {
            Err(WorkflowError::InvalidWebhookPath(path.clone()))
        }
        Trigger::Cron { expression } if expression.split_whitespace().count() != 5 => {
            Err(WorkflowError::InvalidCron(expression.clone()))
        }
        _ => Ok(()),
    }
}

/// Validate the workflow's DAG and return nodes in topological order.
///
/// # Errors
/// - [`WorkflowError::DuplicateNodeId`] if two nodes share an ID.
/// - [`WorkflowError::UnknownNodeReference`] if an edge references a missing node.
/// - [`WorkflowError::CycleDetected`] if the graph is not acyclic.
pub fn validate_dag(definition: &WorkflowDefinition) -> Result<Vec<String>, WorkflowError> {
    let mut seen_ids: HashSet<&str> = HashSet::new();
    for node in &definition.nodes {
        if !seen_ids.insert(node.id.as_str()) {
            return Err(WorkflowError::DuplicateNodeId(node.id.clone()));
        }
    }

    for edge in &definition.edges {
        for (node_id, side) in [(&edge.from, "from"), (&edge.to, "to")] {
            if !seen_ids.contains(node_id.as_str()) {
                return Err(WorkflowError::UnknownNodeReference {
                    node_id: node_id.clone(),
                    side,
                });
            }
        }
    }

    // Kahn's algorithm. Nodes are seeded in declaration order so the result
    // is deterministic for a given definition.
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut in_degree: HashMap<&str, usize> = definition
        .nodes
        .iter()
        .map(|n| (n.id.as_str(), 0))
        .collect();

    for edge in &definition.edges {
        adjacency.entry(edge.from.as_str()).or_default().push(edge.to.as_str());
        *in_degree.entry(edge.to.as_str()).or_insert(0) += 1;
    }

    let mut queue: VecDeque<&str> = definition
        .nodes
        .iter()
        .map(|n| n.id.as_str())
        .filter(|id| in_degree[id] == 0)
        .collect();

    let mut sorted: Vec<String> = Vec::with_capacity(definition.nodes.len());

    while let Some(node_id) = queue.pop_front() {
        sorted.push(node_id.to_owned());

        for &neighbour in adjacency.get(node_id).into_iter().flatten() {
            if let Some(deg) = in_degree.get_mut(neighbour) {
                *deg -= 1;
                if *deg == 0 {
                    queue.push_back(neighbour);
                }
            }
        }
    }

    if sorted.len() != definition.nodes.len() {
        return Err(WorkflowError::CycleDetected);
    }

    Ok(sorted)
}
