use async_trait::async_trait;

use crate::error::NodeError;
use crate::node::Node;

/// Function wrapped by a [`TransformNode`].
pub type TransformFn = dyn Fn(&[String]) -> Result<String, NodeError> + Send + Sync;

/// A node that derives a single output string from its inputs with a pure
/// function.
///
/// The node does not validate its inputs. Arity and content checks are the
/// wrapped function's responsibility.
pub struct TransformNode {
  name: String,
  inputs: Vec<String>,
  outputs: Vec<String>,
  transform: Box<TransformFn>,
}

impl TransformNode {
  /// Create a new transform node.
  pub fn new<F>(name: impl Into<String>, transform: F) -> Self
  where
    F: Fn(&[String]) -> Result<String, NodeError> + Send + Sync + 'static,
  {
    Self {
      name: name.into(),
      inputs: Vec::new(),
      outputs: Vec::new(),
      transform: Box::new(transform),
    }
  }

  /// Create a transform node that joins its inputs with `separator`.
  ///
  /// Fails with [`NodeError::InvalidInput`] when the node receives no inputs.
  pub fn joining(name: impl Into<String>, separator: impl Into<String>) -> Self {
    let separator = separator.into();
    Self::new(name, move |inputs| {
      if inputs.is_empty() {
        return Err(NodeError::invalid_input("input must not be empty"));
      }
      Ok(inputs.join(&separator))
    })
  }

  /// Inputs stored for the next execution.
  pub fn inputs(&self) -> &[String] {
    &self.inputs
  }
}

impl std::fmt::Debug for TransformNode {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("TransformNode")
      .field("name", &self.name)
      .field("inputs", &self.inputs)
      .field("outputs", &self.outputs)
      .finish_non_exhaustive()
  }
}

#[async_trait]
impl Node for TransformNode {
  fn set_inputs(&mut self, inputs: Vec<String>) {
    self.inputs = inputs;
  }

  async fn execute(&mut self) -> Result<(), NodeError> {
    let output = (self.transform)(&self.inputs)?;
    self.outputs = vec![output];
    Ok(())
  }

  fn outputs(&self) -> &[String] {
    &self.outputs
  }

  fn name(&self) -> &str {
    &self.name
  }
}
