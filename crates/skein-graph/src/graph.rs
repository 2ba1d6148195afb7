use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use skein_node::Node;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::GraphError;
use crate::id::NodeId;

/// A node instance owned by a graph.
///
/// The async mutex is held by at most one executing task at a time.
pub type SharedNode = Arc<Mutex<dyn Node>>;

/// Node registry plus directed edge set.
#[derive(Default)]
pub struct Graph {
  /// Registered nodes.
  nodes: HashMap<NodeId, SharedNode>,
  /// Adjacency list: node_id -> list of downstream node_ids.
  adjacency: HashMap<NodeId, Vec<NodeId>>,
  /// Reverse adjacency: node_id -> list of upstream node_ids.
  reverse_adjacency: HashMap<NodeId, Vec<NodeId>>,
  /// Number of incoming edges per node, as registered.
  in_degree: HashMap<NodeId, usize>,
}

impl Graph {
  /// Create an empty graph.
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a node under `id` with an in-degree of zero.
  ///
  /// Registering an id that already exists replaces the previous node and
  /// drops every edge that touched it.
  pub fn add_node<N>(&mut self, id: impl Into<NodeId>, node: N)
  where
    N: Node + 'static,
  {
    let id = id.into();
    debug!(node_id = %id, name = node.name(), "adding node");

    let shared: SharedNode = Arc::new(Mutex::new(node));
    if self.nodes.insert(id.clone(), shared).is_some() {
      debug!(node_id = %id, "replacing existing node");
      self.detach(&id);
    }

    self.adjacency.entry(id.clone()).or_default();
    self.reverse_adjacency.entry(id.clone()).or_default();
    self.in_degree.insert(id, 0);
  }

  /// Add a directed edge `from -> to`.
  ///
  /// Both endpoints must already be registered. Adding an edge that already
  /// exists is a no-op. Cycles are not checked here; see
  /// [`topological_sort`](Graph::topological_sort).
  pub fn add_edge(
    &mut self,
    from: impl Into<NodeId>,
    to: impl Into<NodeId>,
  ) -> Result<(), GraphError> {
    let from = from.into();
    let to = to.into();
    debug!(from = %from, to = %to, "adding edge");

    if !self.nodes.contains_key(&from) {
      return Err(GraphError::NodeNotFound(from));
    }
    if !self.nodes.contains_key(&to) {
      return Err(GraphError::NodeNotFound(to));
    }

    let outgoing = self.adjacency.entry(from.clone()).or_default();
    if outgoing.contains(&to) {
      return Ok(());
    }
    outgoing.push(to.clone());

    self.reverse_adjacency.entry(to.clone()).or_default().push(from);
    *self.in_degree.entry(to).or_default() += 1;
    Ok(())
  }

  /// Get nodes with no outgoing edges, in no particular order.
  pub fn leaf_nodes(&self) -> Vec<NodeId> {
    self
      .nodes
      .keys()
      .filter(|id| self.downstream(id.as_str()).is_empty())
      .cloned()
      .collect()
  }

  /// Get nodes with no incoming edges, in no particular order.
  pub fn entry_points(&self) -> Vec<NodeId> {
    self
      .nodes
      .keys()
      .filter(|id| self.in_degree(id.as_str()) == Some(0))
      .cloned()
      .collect()
  }

  /// Get downstream nodes for a given node.
  pub fn downstream(&self, node_id: &str) -> &[NodeId] {
    self
      .adjacency
      .get(node_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Get upstream nodes for a given node.
  pub fn upstream(&self, node_id: &str) -> &[NodeId] {
    self
      .reverse_adjacency
      .get(node_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Registered in-degree of a node.
  pub fn in_degree(&self, node_id: &str) -> Option<usize> {
    self.in_degree.get(node_id).copied()
  }

  /// Snapshot of every node's registered in-degree.
  pub fn in_degrees(&self) -> HashMap<NodeId, usize> {
    self.in_degree.clone()
  }

  /// Look up a node by id.
  pub fn get_node(&self, node_id: &str) -> Option<&SharedNode> {
    self.nodes.get(node_id)
  }

  /// Whether a node is registered under `node_id`.
  pub fn contains(&self, node_id: &str) -> bool {
    self.nodes.contains_key(node_id)
  }

  /// Ids of every registered node, in no particular order.
  pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
    self.nodes.keys()
  }

  /// Number of registered nodes.
  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  /// Whether no node is registered.
  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  /// Number of distinct edges.
  pub fn edge_count(&self) -> usize {
    self.adjacency.values().map(Vec::len).sum()
  }

  /// Order the nodes so every edge points forward (Kahn's algorithm).
  ///
  /// Returns [`GraphError::CycleDetected`] naming the nodes that could not be
  /// ordered if the graph has a cycle. Self-loops count as cycles.
  pub fn topological_sort(&self) -> Result<Vec<NodeId>, GraphError> {
    let mut in_degree = self.in_degree.clone();

    let mut roots: Vec<NodeId> = in_degree
      .iter()
      .filter(|&(_, degree)| *degree == 0)
      .map(|(id, _)| id.clone())
      .collect();
    roots.sort();
    let mut queue: VecDeque<NodeId> = roots.into();

    let mut sorted = Vec::with_capacity(self.nodes.len());
    while let Some(node_id) = queue.pop_front() {
      for next in self.downstream(node_id.as_str()) {
        if let Some(degree) = in_degree.get_mut(next) {
          *degree -= 1;
          if *degree == 0 {
            queue.push_back(next.clone());
          }
        }
      }
      sorted.push(node_id);
    }

    if sorted.len() != self.nodes.len() {
      let mut nodes: Vec<NodeId> = in_degree
        .into_iter()
        .filter(|(_, degree)| *degree > 0)
        .map(|(id, _)| id)
        .collect();
      nodes.sort();
      return Err(GraphError::CycleDetected { nodes });
    }

    Ok(sorted)
  }

  /// Remove every edge touching `id`.
  fn detach(&mut self, id: &NodeId) {
    for to in self.adjacency.remove(id).unwrap_or_default() {
      if let Some(incoming) = self.reverse_adjacency.get_mut(&to) {
        incoming.retain(|from| from != id);
      }
      if let Some(degree) = self.in_degree.get_mut(&to) {
        *degree = degree.saturating_sub(1);
      }
    }
    for from in self.reverse_adjacency.remove(id).unwrap_or_default() {
      if let Some(outgoing) = self.adjacency.get_mut(&from) {
        outgoing.retain(|to| to != id);
      }
    }
  }
}

impl fmt::Debug for Graph {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut ids: Vec<&NodeId> = self.nodes.keys().collect();
    ids.sort();
    f.debug_struct("Graph")
      .field("nodes", &ids)
      .field("adjacency", &self.adjacency)
      .field("in_degree", &self.in_degree)
      .finish()
  }
}
