//! Skein Graph
//!
//! This crate provides the graph store for skein: an id-addressed registry of
//! [`Node`](skein_node::Node) instances, the directed edges between them and
//! the in-degree of every node.
//!
//! The graph itself never runs nodes. It answers the structural questions the
//! executor needs:
//! - Which nodes have no predecessors (entry points) or no successors (leaves)
//! - Which nodes are directly upstream or downstream of a node
//! - Whether the edges admit a topological order at all

mod error;
mod graph;
mod id;

pub use error::GraphError;
pub use graph::{Graph, SharedNode};
pub use id::NodeId;
