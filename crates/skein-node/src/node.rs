use async_trait::async_trait;

use crate::error::NodeError;

/// An executable unit of a workflow graph.
///
/// The executor drives every node through the same sequence once per
/// execution: [`set_inputs`](Node::set_inputs), then
/// [`execute`](Node::execute), then [`outputs`](Node::outputs) on success.
/// Inputs and outputs are stored on the node itself and are overwritten by
/// the next execution.
#[async_trait]
pub trait Node: Send + Sync {
  /// Store the inputs for the next call to [`execute`](Node::execute).
  fn set_inputs(&mut self, inputs: Vec<String>);

  /// Run the node's logic against the stored inputs.
  ///
  /// On success the produced outputs are stored and can be read with
  /// [`outputs`](Node::outputs). On failure previously stored outputs are
  /// left as they were.
  async fn execute(&mut self) -> Result<(), NodeError>;

  /// Outputs of the most recent successful execution.
  ///
  /// Empty before the first successful execution.
  fn outputs(&self) -> &[String];

  /// Display name of the node, independent of its id in a graph.
  fn name(&self) -> &str;
}
