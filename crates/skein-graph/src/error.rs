use thiserror::Error;

use crate::id::NodeId;

/// Structural errors in a graph.
#[derive(Debug, Error)]
pub enum GraphError {
  #[error("node {0} does not exist")]
  NodeNotFound(NodeId),

  #[error("graph contains a cycle through nodes: {}", format_ids(nodes))]
  CycleDetected { nodes: Vec<NodeId> },
}

fn format_ids(ids: &[NodeId]) -> String {
  ids
    .iter()
    .map(NodeId::as_str)
    .collect::<Vec<_>>()
    .join(", ")
}
