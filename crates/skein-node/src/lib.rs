//! Skein Node
//!
//! This crate defines the [`Node`] contract every executable unit of a skein
//! graph implements, together with the built-in variants:
//!
//! - [`TransformNode`] wraps a pure function from inputs to a single string.
//! - [`DelegateNode`] forwards a single prompt to an external
//!   [`TextGenerator`] such as a language model client.
//!
//! The payload logic behind a node is pluggable; the executor only relies on
//! the trait.

mod delegate;
mod error;
mod node;
mod transform;

pub use delegate::{DelegateNode, TextGenerator};
pub use error::{BoxError, NodeError};
pub use node::Node;
pub use transform::{TransformFn, TransformNode};
