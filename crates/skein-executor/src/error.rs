//! Error types for workflow execution.

use skein_graph::{GraphError, NodeId};
use skein_node::NodeError;
use thiserror::Error;

/// Errors that can occur during workflow execution.
#[derive(Debug, Error)]
pub enum ExecutionError {
  /// The graph is structurally invalid (e.g. it contains a cycle).
  #[error("invalid workflow graph: {0}")]
  Graph(#[from] GraphError),

  /// A node returned an error from its own execution.
  #[error("node execution failed for node '{node_id}': {source}")]
  NodeExecution {
    node_id: NodeId,
    #[source]
    source: NodeError,
  },

  /// Workflow execution was cancelled.
  #[error("workflow execution cancelled")]
  Cancelled,

  /// A node task panicked or was aborted.
  #[error("task join error: {message}")]
  TaskJoin { message: String },

  /// The executor configuration is unusable.
  #[error("invalid executor config: {message}")]
  InvalidConfig { message: String },
}
