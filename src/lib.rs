//! Skein
//!
//! Runs a directed acyclic graph of nodes in dependency order. Each node
//! receives its caller-supplied inputs followed by the outputs of its direct
//! predecessors, and independent nodes run in parallel up to a configured
//! bound.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Executor                            │
//! │  - execute(inputs, cancel) → ExecutionResult                │
//! │  - ready queue, concurrency bound, first-error capture      │
//! │  - status and input/output event streams                    │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Graph                              │
//! │  - node registry, edges, in-degree                          │
//! │  - leaf nodes, topological sort                             │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                           Node                              │
//! │  - TransformNode: pure function over the inputs             │
//! │  - DelegateNode: forwards one prompt to a TextGenerator     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use skein::{CancellationToken, DelegateNode, Executor, ExecutorConfig, TransformNode};
//!
//! let mut executor = Executor::new(ExecutorConfig { max_concurrent: 2 })?;
//! executor.add_node("T1", TransformNode::joining("T1", " "));
//! executor.add_node("L1", DelegateNode::new("L1", generator));
//! executor.add_edge("T1", "L1")?;
//!
//! let mut statuses = executor.subscribe_status();
//! let inputs = HashMap::from([("T1".into(), vec!["hello".into(), "world".into()])]);
//! let result = executor.execute(inputs, CancellationToken::new()).await?;
//! ```

pub use skein_executor::{
  ExecutionError, ExecutionResult, Executor, ExecutorConfig, NodeIo, NodeState, NodeStatus,
};
pub use skein_graph::{Graph, GraphError, NodeId, SharedNode};
pub use skein_node::{
  BoxError, DelegateNode, Node, NodeError, TextGenerator, TransformFn, TransformNode,
};
pub use tokio_util::sync::CancellationToken;
