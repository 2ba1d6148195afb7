//! Shared scheduling state of one execution.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use skein_graph::{Graph, NodeId};
use tracing::warn;

use crate::error::ExecutionError;
use crate::events::{EventStreams, NodeIo, NodeStatus};

/// Everything concurrent node tasks read and write during an execution.
///
/// Always accessed through a single mutex. Each method is one critical
/// section; none of them run node logic.
#[derive(Debug, Default)]
pub(crate) struct ExecutionState {
  statuses: HashMap<NodeId, NodeStatus>,
  /// Unfulfilled predecessors per node, copied from the graph per execution.
  in_degree: HashMap<NodeId, usize>,
  outputs: HashMap<NodeId, Vec<String>>,
  first_error: Option<ExecutionError>,
  streams: EventStreams,
}

/// Lock the state, recovering the guard if a task panicked while holding it.
pub(crate) fn lock(state: &Mutex<ExecutionState>) -> MutexGuard<'_, ExecutionState> {
  state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ExecutionState {
  /// Prepare for a new execution of `graph`.
  pub(crate) fn reset(&mut self, graph: &Graph, streams: EventStreams) {
    self.statuses = graph
      .node_ids()
      .map(|id| (id.clone(), NodeStatus::Pending))
      .collect();
    self.in_degree = graph.in_degrees();
    self.outputs.clear();
    self.first_error = None;
    self.streams = streams;
  }

  pub(crate) fn status(&self, node_id: &str) -> Option<NodeStatus> {
    self.statuses.get(node_id).copied()
  }

  pub(crate) fn statuses(&self) -> &HashMap<NodeId, NodeStatus> {
    &self.statuses
  }

  pub(crate) fn has_failed(&self) -> bool {
    self.first_error.is_some()
  }

  /// Record `error` unless an earlier error was already recorded.
  ///
  /// Returns `true` if this error is now the execution's error.
  pub(crate) fn record_error(&mut self, error: ExecutionError) -> bool {
    if self.first_error.is_some() {
      warn!(error = %error, "discarding error after first failure");
      return false;
    }
    self.first_error = Some(error);
    true
  }

  /// Mark a node running and assemble its inputs.
  ///
  /// Inputs are the caller's initial inputs followed by the outputs of each
  /// upstream node. Returns `None` without touching the node if the execution
  /// has already failed.
  pub(crate) fn start(
    &mut self,
    node_id: &NodeId,
    initial: &[String],
    upstream: &[NodeId],
  ) -> Option<Vec<String>> {
    if self.has_failed() {
      return None;
    }
    self.set_status(node_id, NodeStatus::Running);

    let mut inputs = initial.to_vec();
    for up in upstream {
      if let Some(outputs) = self.outputs.get(up) {
        inputs.extend(outputs.iter().cloned());
      }
    }
    Some(inputs)
  }

  /// Commit a node's outputs and release its downstream nodes.
  ///
  /// Returns the downstream nodes whose last pending predecessor was this
  /// node.
  pub(crate) fn complete(
    &mut self,
    node_id: &NodeId,
    inputs: Vec<String>,
    outputs: Vec<String>,
    downstream: &[NodeId],
  ) -> Vec<NodeId> {
    self.outputs.insert(node_id.clone(), outputs.clone());
    self.set_status(node_id, NodeStatus::Completed);
    self.streams.publish_io(NodeIo {
      id: node_id.clone(),
      inputs,
      outputs,
    });

    let mut ready = Vec::new();
    for next in downstream {
      if let Some(degree) = self.in_degree.get_mut(next) {
        if *degree == 0 {
          continue;
        }
        *degree -= 1;
        if *degree == 0 {
          ready.push(next.clone());
        }
      }
    }
    ready
  }

  /// Mark a node failed and record its error if it is the first.
  pub(crate) fn fail(&mut self, node_id: &NodeId, error: ExecutionError) -> bool {
    self.set_status(node_id, NodeStatus::Error);
    self.record_error(error)
  }

  /// End the execution: close the event streams and hand back the outputs
  /// and the first error, if any.
  pub(crate) fn finish(&mut self) -> (HashMap<NodeId, Vec<String>>, Option<ExecutionError>) {
    self.streams = EventStreams::default();
    (std::mem::take(&mut self.outputs), self.first_error.take())
  }

  fn set_status(&mut self, node_id: &NodeId, status: NodeStatus) {
    self.statuses.insert(node_id.clone(), status);
    self.streams.publish_status(node_id, status);
  }
}
