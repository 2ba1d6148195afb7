use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{BoxError, NodeError};
use crate::node::Node;

/// A single-turn text generation capability, typically backed by a language
/// model service.
#[async_trait]
pub trait TextGenerator: Send + Sync {
  /// Generate a response for `prompt`.
  async fn generate(&self, prompt: &str) -> Result<String, BoxError>;
}

/// A node that hands its single input to a [`TextGenerator`] and publishes the
/// response.
///
/// Execution fails unless exactly one non-empty input is stored. Errors from
/// the generator are returned unchanged as [`NodeError::Delegate`].
pub struct DelegateNode {
  name: String,
  inputs: Vec<String>,
  outputs: Vec<String>,
  generator: Arc<dyn TextGenerator>,
}

impl DelegateNode {
  /// Create a new delegate node.
  pub fn new(name: impl Into<String>, generator: Arc<dyn TextGenerator>) -> Self {
    Self {
      name: name.into(),
      inputs: Vec::new(),
      outputs: Vec::new(),
      generator,
    }
  }

  /// Inputs stored for the next execution.
  pub fn inputs(&self) -> &[String] {
    &self.inputs
  }

  fn prompt(&self) -> Result<&str, NodeError> {
    let [prompt] = self.inputs.as_slice() else {
      return Err(NodeError::InputCount {
        expected: 1,
        actual: self.inputs.len(),
      });
    };
    if prompt.is_empty() {
      return Err(NodeError::EmptyInput);
    }
    Ok(prompt.as_str())
  }
}

impl std::fmt::Debug for DelegateNode {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("DelegateNode")
      .field("name", &self.name)
      .field("inputs", &self.inputs)
      .field("outputs", &self.outputs)
      .finish_non_exhaustive()
  }
}

#[async_trait]
impl Node for DelegateNode {
  fn set_inputs(&mut self, inputs: Vec<String>) {
    self.inputs = inputs;
  }

  async fn execute(&mut self) -> Result<(), NodeError> {
    let prompt = self.prompt()?;
    debug!(node = %self.name, prompt_len = prompt.len(), "calling text generator");

    let response = self
      .generator
      .generate(prompt)
      .await
      .map_err(NodeError::Delegate)?;

    self.outputs = vec![response];
    Ok(())
  }

  fn outputs(&self) -> &[String] {
    &self.outputs
  }

  fn name(&self) -> &str {
    &self.name
  }
}
