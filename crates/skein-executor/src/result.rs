//! Workflow execution results.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use skein_graph::NodeId;

/// Result of a complete workflow execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
  /// Unique execution ID.
  pub execution_id: String,
  /// Outputs of every executed node, keyed by node id.
  pub outputs: HashMap<NodeId, Vec<String>>,
  /// Outputs of the leaf nodes (no outgoing edges) only.
  pub final_outputs: HashMap<NodeId, Vec<String>>,
}
