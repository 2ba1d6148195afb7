//! Execution events for observability.
//!
//! Two independent streams are published during an execution: node status
//! transitions and node input/output records. Consumers subscribe before
//! calling [`Executor::execute`](crate::Executor::execute); every stream is
//! closed once that call returns.

use serde::{Deserialize, Serialize};
use skein_graph::NodeId;
use tokio::sync::mpsc;

/// Lifecycle status of a node within one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeStatus {
  Pending,
  Running,
  Completed,
  Error,
}

impl NodeStatus {
  /// Whether the node has finished, successfully or not.
  pub fn is_terminal(self) -> bool {
    matches!(self, NodeStatus::Completed | NodeStatus::Error)
  }
}

/// A node status transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeState {
  pub id: NodeId,
  pub status: NodeStatus,
}

/// Inputs and outputs of a node that completed successfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeIo {
  pub id: NodeId,
  pub inputs: Vec<String>,
  pub outputs: Vec<String>,
}

/// Subscribers of the two event streams for one execution.
///
/// Dropping the value closes every subscribed stream.
#[derive(Debug, Default)]
pub(crate) struct EventStreams {
  // NOTE: Unbounded so publishing never blocks while the execution state lock
  // is held. Volume is at most three events per node.
  status: Vec<mpsc::UnboundedSender<NodeState>>,
  io: Vec<mpsc::UnboundedSender<NodeIo>>,
}

impl EventStreams {
  pub(crate) fn subscribe_status(&mut self) -> mpsc::UnboundedReceiver<NodeState> {
    let (sender, receiver) = mpsc::unbounded_channel();
    self.status.push(sender);
    receiver
  }

  pub(crate) fn subscribe_io(&mut self) -> mpsc::UnboundedReceiver<NodeIo> {
    let (sender, receiver) = mpsc::unbounded_channel();
    self.io.push(sender);
    receiver
  }

  pub(crate) fn publish_status(&self, id: &NodeId, status: NodeStatus) {
    for sender in &self.status {
      // Ignore send errors - receiver may have been dropped
      let _ = sender.send(NodeState {
        id: id.clone(),
        status,
      });
    }
  }

  pub(crate) fn publish_io(&self, event: NodeIo) {
    for sender in &self.io {
      let _ = sender.send(event.clone());
    }
  }
}
