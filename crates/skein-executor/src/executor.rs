//! Workflow executor implementation.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use skein_graph::{Graph, GraphError, NodeId, SharedNode};
use skein_node::Node;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Span, debug, error, info, instrument, warn};

use crate::error::ExecutionError;
use crate::events::{EventStreams, NodeIo, NodeState, NodeStatus};
use crate::result::ExecutionResult;
use crate::state::{ExecutionState, lock};

/// Configuration for the workflow executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
  /// Maximum number of nodes executing at the same time.
  pub max_concurrent: usize,
}

impl Default for ExecutorConfig {
  fn default() -> Self {
    Self { max_concurrent: 4 }
  }
}

/// The workflow executor.
///
/// Owns a [`Graph`] and runs it in dependency order: a node is dispatched as
/// soon as its last predecessor completes, and at most
/// [`ExecutorConfig::max_concurrent`] nodes run at once.
///
/// [`execute`](Executor::execute) takes `&mut self`, so one executor never
/// runs two executions at the same time. Running the same executor again
/// after an execution returns is supported.
pub struct Executor {
  graph: Graph,
  config: ExecutorConfig,
  state: Arc<Mutex<ExecutionState>>,
  /// Subscribers waiting for the next execution.
  subscribers: EventStreams,
}

impl Executor {
  /// Create an executor with an empty graph.
  pub fn new(config: ExecutorConfig) -> Result<Self, ExecutionError> {
    Self::with_graph(Graph::new(), config)
  }

  /// Create an executor for an already built graph.
  pub fn with_graph(graph: Graph, config: ExecutorConfig) -> Result<Self, ExecutionError> {
    if config.max_concurrent == 0 {
      return Err(ExecutionError::InvalidConfig {
        message: "max_concurrent must be at least 1".to_string(),
      });
    }

    Ok(Self {
      graph,
      config,
      state: Arc::new(Mutex::new(ExecutionState::default())),
      subscribers: EventStreams::default(),
    })
  }

  /// Register a node. See [`Graph::add_node`].
  pub fn add_node<N>(&mut self, id: impl Into<NodeId>, node: N)
  where
    N: Node + 'static,
  {
    self.graph.add_node(id, node);
  }

  /// Add a dependency edge. See [`Graph::add_edge`].
  pub fn add_edge(
    &mut self,
    from: impl Into<NodeId>,
    to: impl Into<NodeId>,
  ) -> Result<(), GraphError> {
    self.graph.add_edge(from, to)
  }

  /// Nodes with no outgoing edges.
  pub fn leaf_nodes(&self) -> Vec<NodeId> {
    self.graph.leaf_nodes()
  }

  /// The graph this executor runs.
  pub fn graph(&self) -> &Graph {
    &self.graph
  }

  /// Configuration the executor was created with.
  pub fn config(&self) -> &ExecutorConfig {
    &self.config
  }

  /// Subscribe to node status transitions of the next execution.
  ///
  /// The stream ends when that execution returns.
  pub fn subscribe_status(&mut self) -> mpsc::UnboundedReceiver<NodeState> {
    self.subscribers.subscribe_status()
  }

  /// Subscribe to input/output records of the next execution.
  ///
  /// The stream ends when that execution returns.
  pub fn subscribe_io(&mut self) -> mpsc::UnboundedReceiver<NodeIo> {
    self.subscribers.subscribe_io()
  }

  /// Status of a node in the current or most recent execution.
  ///
  /// Registered nodes report [`NodeStatus::Pending`] before the first
  /// execution. Returns `None` for unknown ids.
  pub fn node_status(&self, node_id: &str) -> Option<NodeStatus> {
    if !self.graph.contains(node_id) {
      return None;
    }
    let state = lock(&self.state);
    Some(state.status(node_id).unwrap_or(NodeStatus::Pending))
  }

  /// Status of every registered node.
  pub fn statuses(&self) -> HashMap<NodeId, NodeStatus> {
    let state = lock(&self.state);
    self
      .graph
      .node_ids()
      .map(|id| {
        let status = state.statuses().get(id).copied();
        (id.clone(), status.unwrap_or(NodeStatus::Pending))
      })
      .collect()
  }

  /// Execute the graph.
  ///
  /// `inputs` holds the caller-supplied inputs per node. Each node receives its
  /// own initial inputs followed by the outputs of its direct predecessors.
  ///
  /// Returns every node's outputs together with the outputs of the leaf
  /// nodes, or the first error that occurred. Outputs are never returned
  /// alongside an error.
  #[instrument(
    name = "workflow_execute",
    skip(self, inputs, cancel),
    fields(
      execution_id = tracing::field::Empty,
      node_count = self.graph.len(),
      edge_count = self.graph.edge_count(),
      max_concurrent = self.config.max_concurrent,
    )
  )]
  pub async fn execute(
    &mut self,
    inputs: HashMap<NodeId, Vec<String>>,
    cancel: CancellationToken,
  ) -> Result<ExecutionResult, ExecutionError> {
    let execution_id = uuid::Uuid::new_v4().to_string();
    Span::current().record("execution_id", execution_id.as_str());

    let streams = std::mem::take(&mut self.subscribers);
    lock(&self.state).reset(&self.graph, streams);

    info!(
      execution_id = %execution_id,
      initial_inputs = inputs.len(),
      "workflow_started"
    );

    if let Err(e) = self.schedule(&execution_id, inputs, &cancel).await {
      lock(&self.state).record_error(e);
    }

    // Closes the event streams.
    let (outputs, first_error) = lock(&self.state).finish();

    match first_error {
      Some(e) => {
        error!(
          execution_id = %execution_id,
          error = %e,
          "workflow_failed"
        );
        Err(e)
      }
      None => {
        info!(
          execution_id = %execution_id,
          nodes_executed = outputs.len(),
          "workflow_completed"
        );
        Ok(self.collect_result(execution_id, outputs))
      }
    }
  }

  /// Dispatch nodes as they become ready until nothing is left in flight.
  async fn schedule(
    &self,
    execution_id: &str,
    mut inputs: HashMap<NodeId, Vec<String>>,
    cancel: &CancellationToken,
  ) -> Result<(), ExecutionError> {
    // Rejects cycles before anything runs.
    self.graph.topological_sort()?;
    let mut entry_points = self.graph.entry_points();
    entry_points.sort();
    let mut ready: VecDeque<NodeId> = entry_points.into();

    let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent));
    let mut tasks = JoinSet::new();
    let mut running: HashMap<tokio::task::Id, NodeId> = HashMap::new();

    loop {
      while let Some(node_id) = ready.pop_front() {
        if !self.may_dispatch(cancel) {
          ready.clear();
          break;
        }

        let initial = inputs.remove(&node_id).unwrap_or_default();
        match self.node_task(execution_id, node_id, initial, &semaphore, cancel) {
          Ok(task) => {
            let node_id = task.node_id.clone();
            let handle = tasks.spawn(task.run());
            running.insert(handle.id(), node_id);
          }
          Err(e) => {
            lock(&self.state).record_error(e);
          }
        }
      }

      let Some(joined) = tasks.join_next().await else {
        break;
      };
      match joined {
        Ok(released) => ready.extend(released),
        Err(e) => {
          let error = ExecutionError::TaskJoin {
            message: e.to_string(),
          };
          let mut state = lock(&self.state);
          match running.get(&e.id()) {
            Some(node_id) => {
              error!(node_id = %node_id, error = %e, "task_panicked");
              state.fail(node_id, error);
            }
            None => {
              state.record_error(error);
            }
          }
        }
      }
    }

    Ok(())
  }

  /// Check whether another node may be dispatched.
  ///
  /// A cancelled token is recorded as the execution's error.
  fn may_dispatch(&self, cancel: &CancellationToken) -> bool {
    let mut state = lock(&self.state);
    if cancel.is_cancelled() {
      if state.record_error(ExecutionError::Cancelled) {
        warn!("workflow cancelled, halting dispatch");
      }
      return false;
    }
    !state.has_failed()
  }

  /// Prepare everything a node needs to run on its own task.
  fn node_task(
    &self,
    execution_id: &str,
    node_id: NodeId,
    initial: Vec<String>,
    semaphore: &Arc<Semaphore>,
    cancel: &CancellationToken,
  ) -> Result<NodeTask, ExecutionError> {
    let node = self
      .graph
      .get_node(node_id.as_str())
      .cloned()
      .ok_or_else(|| GraphError::NodeNotFound(node_id.clone()))?;

    Ok(NodeTask {
      execution_id: execution_id.to_string(),
      upstream: self.graph.upstream(node_id.as_str()).to_vec(),
      downstream: self.graph.downstream(node_id.as_str()).to_vec(),
      node_id,
      node,
      initial,
      state: self.state.clone(),
      semaphore: semaphore.clone(),
      cancel: cancel.clone(),
    })
  }

  fn collect_result(
    &self,
    execution_id: String,
    outputs: HashMap<NodeId, Vec<String>>,
  ) -> ExecutionResult {
    let final_outputs = self
      .graph
      .leaf_nodes()
      .into_iter()
      .filter_map(|id| outputs.get(&id).cloned().map(|out| (id, out)))
      .collect();

    ExecutionResult {
      execution_id,
      outputs,
      final_outputs,
    }
  }
}

/// A node execution that can be sent to its own task.
struct NodeTask {
  execution_id: String,
  node_id: NodeId,
  node: SharedNode,
  initial: Vec<String>,
  upstream: Vec<NodeId>,
  downstream: Vec<NodeId>,
  state: Arc<Mutex<ExecutionState>>,
  semaphore: Arc<Semaphore>,
  cancel: CancellationToken,
}

impl NodeTask {
  /// Run the node once a concurrency slot is free.
  ///
  /// Returns the downstream nodes released by this node's completion.
  #[instrument(
    name = "task_execute",
    skip(self),
    fields(
      execution_id = %self.execution_id,
      node_id = %self.node_id,
    )
  )]
  async fn run(self) -> Vec<NodeId> {
    // The semaphore is never closed, so acquiring only waits.
    let Ok(_permit) = self.semaphore.clone().acquire_owned().await else {
      return Vec::new();
    };

    if self.cancel.is_cancelled() {
      lock(&self.state).record_error(ExecutionError::Cancelled);
      return Vec::new();
    }

    let inputs = {
      let mut state = lock(&self.state);
      state.start(&self.node_id, &self.initial, &self.upstream)
    };
    let Some(inputs) = inputs else {
      debug!("execution already failed, skipping node");
      return Vec::new();
    };

    let result = {
      let mut node = self.node.lock().await;
      info!(node_name = node.name(), "task_started");
      debug!(inputs = ?inputs, "node inputs");
      node.set_inputs(inputs.clone());
      let executed = node.execute().await;
      executed.map(|()| node.outputs().to_vec())
    };

    match result {
      Ok(outputs) => {
        info!(outputs = ?outputs, "task_completed");
        let mut state = lock(&self.state);
        state.complete(&self.node_id, inputs, outputs, &self.downstream)
      }
      Err(e) => {
        error!(error = %e, "task_failed");
        let mut state = lock(&self.state);
        state.fail(
          &self.node_id,
          ExecutionError::NodeExecution {
            node_id: self.node_id.clone(),
            source: e,
          },
        );
        Vec::new()
      }
    }
  }
}
