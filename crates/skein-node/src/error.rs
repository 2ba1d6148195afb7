use thiserror::Error;

/// Error type returned by external capabilities such as a [`crate::TextGenerator`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while a node executes.
#[derive(Debug, Error)]
pub enum NodeError {
  /// The node received a different number of inputs than it accepts.
  #[error("input must be exactly {expected}, got {actual}")]
  InputCount { expected: usize, actual: usize },

  /// A required input was the empty string.
  #[error("input must not be empty")]
  EmptyInput,

  /// Input failed validation inside the node's logic.
  #[error("invalid input: {message}")]
  InvalidInput { message: String },

  /// A transform function failed for a reason other than its input.
  #[error("transform failed: {message}")]
  Transform { message: String },

  /// The external capability behind a delegate node failed.
  #[error(transparent)]
  Delegate(BoxError),
}

impl NodeError {
  /// Create an invalid input error.
  pub fn invalid_input(message: impl Into<String>) -> Self {
    Self::InvalidInput {
      message: message.into(),
    }
  }

  /// Create a transform error.
  pub fn transform(message: impl Into<String>) -> Self {
    Self::Transform {
      message: message.into(),
    }
  }
}
