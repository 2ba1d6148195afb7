//! Workflow execution for skein.
//!
//! This crate provides the [`Executor`] which handles:
//! - Dependency-ordered scheduling of graph nodes
//! - Bounded parallel node execution
//! - Cancellation and first-error propagation
//! - Status and input/output event streams
//!
//! An executor owns its [`Graph`](skein_graph::Graph). Nodes are added through
//! the executor, then [`Executor::execute`] runs every node exactly once and
//! returns the outputs of the whole graph or the first error.

mod error;
mod events;
mod executor;
mod result;
mod state;

pub use error::ExecutionError;
pub use events::{NodeIo, NodeState, NodeStatus};
pub use executor::{Executor, ExecutorConfig};
pub use result::ExecutionResult;
