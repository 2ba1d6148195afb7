//! Integration tests for skein-executor running real transform and delegate
//! nodes.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use skein_executor::{ExecutionError, Executor, ExecutorConfig, NodeState, NodeStatus};
use skein_graph::{GraphError, NodeId};
use skein_node::{BoxError, DelegateNode, NodeError, TextGenerator, TransformNode};
use tokio_util::sync::CancellationToken;

struct MockGenerator;

#[async_trait]
impl TextGenerator for MockGenerator {
  async fn generate(&self, prompt: &str) -> Result<String, BoxError> {
    Ok(format!("mock response: {prompt}"))
  }
}

/// Tracks how many generations are in flight at once.
#[derive(Default)]
struct SlowGenerator {
  in_flight: AtomicUsize,
  peak: AtomicUsize,
}

#[async_trait]
impl TextGenerator for SlowGenerator {
  async fn generate(&self, prompt: &str) -> Result<String, BoxError> {
    let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    self.peak.fetch_max(now, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(20)).await;
    self.in_flight.fetch_sub(1, Ordering::SeqCst);
    Ok(prompt.to_uppercase())
  }
}

/// Cancels the execution while it is generating.
struct CancellingGenerator {
  cancel: CancellationToken,
}

#[async_trait]
impl TextGenerator for CancellingGenerator {
  async fn generate(&self, prompt: &str) -> Result<String, BoxError> {
    self.cancel.cancel();
    Ok(prompt.to_string())
  }
}

fn executor(max_concurrent: usize) -> Executor {
  Executor::new(ExecutorConfig { max_concurrent }).expect("valid config")
}

fn inputs(entries: &[(&str, &[&str])]) -> HashMap<NodeId, Vec<String>> {
  entries
    .iter()
    .map(|(id, values)| {
      let values = values.iter().map(|v| v.to_string()).collect();
      (NodeId::from(*id), values)
    })
    .collect()
}

fn strings(values: &[&str]) -> Vec<String> {
  values.iter().map(|v| v.to_string()).collect()
}

/// A transform that rejects empty strings and otherwise joins with a space.
fn strict_join(name: &str) -> TransformNode {
  TransformNode::new(name, |inputs: &[String]| {
    if inputs.is_empty() || inputs.iter().any(|s| s.is_empty()) {
      return Err(NodeError::invalid_input("empty input"));
    }
    Ok(inputs.join(" "))
  })
}

/// A transform that counts how often it ran.
fn counting(name: &str, runs: Arc<AtomicUsize>) -> TransformNode {
  TransformNode::new(name, move |inputs: &[String]| {
    runs.fetch_add(1, Ordering::SeqCst);
    Ok(inputs.join(" "))
  })
}

#[tokio::test]
async fn test_transform_feeds_delegate() {
  let mut executor = executor(4);
  executor.add_node("T1", TransformNode::joining("T1", " "));
  executor.add_node("L1", DelegateNode::new("L1", Arc::new(MockGenerator)));
  executor.add_edge("T1", "L1").unwrap();

  let result = executor
    .execute(
      inputs(&[("T1", &["Hello", "World"])]),
      CancellationToken::new(),
    )
    .await
    .expect("execution should succeed");

  assert_eq!(result.outputs.get("T1"), Some(&strings(&["Hello World"])));
  assert_eq!(
    result.final_outputs.get("L1"),
    Some(&strings(&["mock response: Hello World"]))
  );
  assert_eq!(result.final_outputs.len(), 1);
  assert!(!result.execution_id.is_empty());
  assert_eq!(executor.node_status("T1"), Some(NodeStatus::Completed));
  assert_eq!(executor.node_status("L1"), Some(NodeStatus::Completed));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_parallel_chains() {
  let mut executor = executor(4);
  for chain in ["1", "2"] {
    let transform = format!("T{chain}");
    let delegate = format!("L{chain}");
    executor.add_node(
      transform.as_str(),
      TransformNode::joining(transform.as_str(), " "),
    );
    executor.add_node(
      delegate.as_str(),
      DelegateNode::new(delegate.as_str(), Arc::new(MockGenerator)),
    );
    executor.add_edge(transform.as_str(), delegate.as_str()).unwrap();
  }

  let result = executor
    .execute(
      inputs(&[("T1", &["first", "chain"]), ("T2", &["second", "chain"])]),
      CancellationToken::new(),
    )
    .await
    .expect("execution should succeed");

  assert_eq!(result.outputs.len(), 4);
  assert_eq!(
    result.final_outputs.get("L1"),
    Some(&strings(&["mock response: first chain"]))
  );
  assert_eq!(
    result.final_outputs.get("L2"),
    Some(&strings(&["mock response: second chain"]))
  );
}

#[tokio::test]
async fn test_diamond_with_single_slot() {
  let mut executor = executor(1);
  executor.add_node("A", TransformNode::joining("A", " "));
  executor.add_node(
    "B",
    TransformNode::new("B", |inputs: &[String]| Ok(inputs.join(" ").to_uppercase())),
  );
  executor.add_node(
    "C",
    TransformNode::new("C", |inputs: &[String]| Ok(format!("{}!", inputs.join(" ")))),
  );
  executor.add_node("D", TransformNode::joining("D", " "));
  executor.add_edge("A", "B").unwrap();
  executor.add_edge("A", "C").unwrap();
  executor.add_edge("B", "D").unwrap();
  executor.add_edge("C", "D").unwrap();

  let result = executor
    .execute(inputs(&[("A", &["hello"])]), CancellationToken::new())
    .await
    .expect("execution should succeed");

  let joined = &result.final_outputs.get("D").expect("D is a leaf")[0];
  assert!(
    joined == "HELLO hello!" || joined == "hello! HELLO",
    "unexpected join output: {joined}"
  );
  let leaves: HashSet<NodeId> = result.final_outputs.keys().cloned().collect();
  let expected: HashSet<NodeId> = executor.leaf_nodes().into_iter().collect();
  assert_eq!(leaves, expected);
  assert_eq!(result.outputs.len(), 4);
}

#[tokio::test]
async fn test_node_failure_stops_downstream() {
  let mut executor = executor(2);
  executor.add_node("T1", strict_join("T1"));
  executor.add_node("L1", DelegateNode::new("L1", Arc::new(MockGenerator)));
  executor.add_edge("T1", "L1").unwrap();

  let result = executor
    .execute(inputs(&[("T1", &[""])]), CancellationToken::new())
    .await;

  match result {
    Err(ExecutionError::NodeExecution { node_id, source }) => {
      assert_eq!(node_id.as_str(), "T1");
      assert!(matches!(source, NodeError::InvalidInput { .. }));
    }
    other => panic!("expected node failure, got {other:?}"),
  }
  assert_eq!(executor.node_status("T1"), Some(NodeStatus::Error));
  assert_eq!(executor.node_status("L1"), Some(NodeStatus::Pending));
}

#[tokio::test]
async fn test_status_stream_reports_each_transition_once() {
  let mut executor = executor(2);
  executor.add_node("T1", TransformNode::joining("T1", " "));
  executor.add_node("L1", DelegateNode::new("L1", Arc::new(MockGenerator)));
  executor.add_node("bad", strict_join("bad"));
  executor.add_edge("T1", "L1").unwrap();
  let mut status_rx = executor.subscribe_status();

  let result = executor
    .execute(
      inputs(&[("T1", &["a", "b"]), ("bad", &[""])]),
      CancellationToken::new(),
    )
    .await;
  assert!(result.is_err());

  let mut seen: HashMap<NodeId, Vec<NodeStatus>> = HashMap::new();
  while let Some(NodeState { id, status }) = status_rx.recv().await {
    seen.entry(id).or_default().push(status);
  }

  assert_eq!(
    seen.get("bad"),
    Some(&vec![NodeStatus::Running, NodeStatus::Error])
  );
  // T1 may or may not have been dispatched before the failure halted it.
  for (id, transitions) in &seen {
    assert_eq!(transitions[0], NodeStatus::Running, "node {id}");
    assert!(transitions.len() <= 2, "node {id}: {transitions:?}");
    if let Some(last) = transitions.get(1) {
      assert!(last.is_terminal());
    }
  }
}

#[tokio::test]
async fn test_io_stream_records_completed_nodes() {
  let mut executor = executor(4);
  executor.add_node("T1", TransformNode::joining("T1", "-"));
  executor.add_node("L1", DelegateNode::new("L1", Arc::new(MockGenerator)));
  executor.add_edge("T1", "L1").unwrap();
  let mut io_rx = executor.subscribe_io();

  executor
    .execute(inputs(&[("T1", &["x", "y"])]), CancellationToken::new())
    .await
    .expect("execution should succeed");

  let mut records = HashMap::new();
  while let Some(record) = io_rx.recv().await {
    records.insert(record.id.clone(), record);
  }

  assert_eq!(records.len(), 2);
  let t1 = &records[&NodeId::from("T1")];
  assert_eq!(t1.inputs, strings(&["x", "y"]));
  assert_eq!(t1.outputs, strings(&["x-y"]));
  let l1 = &records[&NodeId::from("L1")];
  assert_eq!(l1.inputs, strings(&["x-y"]));
  assert_eq!(l1.outputs, strings(&["mock response: x-y"]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrency_bound_is_respected() {
  let generator = Arc::new(SlowGenerator::default());
  let mut executor = executor(2);
  let mut initial = HashMap::new();
  for i in 0..6 {
    let id = format!("L{i}");
    executor.add_node(id.as_str(), DelegateNode::new(id.as_str(), generator.clone()));
    initial.insert(NodeId::from(id), vec![format!("prompt {i}")]);
  }

  let result = executor
    .execute(initial, CancellationToken::new())
    .await
    .expect("execution should succeed");

  assert_eq!(result.final_outputs.len(), 6);
  let peak = generator.peak.load(Ordering::SeqCst);
  assert!((1..=2).contains(&peak), "peak concurrency was {peak}");
}

#[tokio::test]
async fn test_cycle_rejected_before_any_node_runs() {
  let runs = Arc::new(AtomicUsize::new(0));
  let mut executor = executor(2);
  executor.add_node("a", counting("a", runs.clone()));
  executor.add_node("b", counting("b", runs.clone()));
  executor.add_edge("a", "b").unwrap();
  executor.add_edge("b", "a").unwrap();
  let mut status_rx = executor.subscribe_status();

  let result = executor
    .execute(inputs(&[("a", &["x"])]), CancellationToken::new())
    .await;

  assert!(matches!(
    result,
    Err(ExecutionError::Graph(GraphError::CycleDetected { .. }))
  ));
  assert_eq!(runs.load(Ordering::SeqCst), 0);
  assert!(status_rx.recv().await.is_none());
  assert!(
    executor
      .statuses()
      .values()
      .all(|s| *s == NodeStatus::Pending)
  );
}

#[tokio::test]
async fn test_cancel_before_execute() {
  let runs = Arc::new(AtomicUsize::new(0));
  let mut executor = executor(2);
  executor.add_node("a", counting("a", runs.clone()));
  executor.add_node("b", counting("b", runs.clone()));
  executor.add_edge("a", "b").unwrap();

  let cancel = CancellationToken::new();
  cancel.cancel();
  let result = executor.execute(inputs(&[("a", &["x"])]), cancel).await;

  assert!(matches!(result, Err(ExecutionError::Cancelled)));
  assert_eq!(runs.load(Ordering::SeqCst), 0);
  assert_eq!(executor.node_status("a"), Some(NodeStatus::Pending));
  assert_eq!(executor.node_status("b"), Some(NodeStatus::Pending));
}

#[tokio::test]
async fn test_cancel_while_running_halts_dispatch() {
  let cancel = CancellationToken::new();
  let runs = Arc::new(AtomicUsize::new(0));
  let mut executor = executor(1);
  executor.add_node(
    "L1",
    DelegateNode::new(
      "L1",
      Arc::new(CancellingGenerator {
        cancel: cancel.clone(),
      }),
    ),
  );
  executor.add_node("T2", counting("T2", runs.clone()));
  executor.add_edge("L1", "T2").unwrap();

  let result = executor.execute(inputs(&[("L1", &["go"])]), cancel).await;

  assert!(matches!(result, Err(ExecutionError::Cancelled)));
  assert_eq!(runs.load(Ordering::SeqCst), 0);
  assert_eq!(executor.node_status("L1"), Some(NodeStatus::Completed));
  assert_eq!(executor.node_status("T2"), Some(NodeStatus::Pending));
}

#[tokio::test]
async fn test_executor_can_run_again_with_new_inputs() {
  let mut executor = executor(2);
  executor.add_node("T1", TransformNode::joining("T1", " "));
  executor.add_node("L1", DelegateNode::new("L1", Arc::new(MockGenerator)));
  executor.add_edge("T1", "L1").unwrap();

  let first = executor
    .execute(inputs(&[("T1", &["one"])]), CancellationToken::new())
    .await
    .expect("first execution should succeed");
  let second = executor
    .execute(inputs(&[("T1", &["two"])]), CancellationToken::new())
    .await
    .expect("second execution should succeed");

  assert_ne!(first.execution_id, second.execution_id);
  assert_eq!(
    first.final_outputs.get("L1"),
    Some(&strings(&["mock response: one"]))
  );
  assert_eq!(
    second.final_outputs.get("L1"),
    Some(&strings(&["mock response: two"]))
  );
}

#[tokio::test]
async fn test_failure_does_not_leak_into_next_execution() {
  let mut executor = executor(2);
  executor.add_node("T1", strict_join("T1"));
  executor.add_node("T2", TransformNode::joining("T2", " "));
  executor.add_edge("T1", "T2").unwrap();

  let failed = executor
    .execute(inputs(&[("T1", &[""])]), CancellationToken::new())
    .await;
  assert!(failed.is_err());

  let result = executor
    .execute(inputs(&[("T1", &["ok"])]), CancellationToken::new())
    .await
    .expect("second execution should succeed");
  assert_eq!(result.final_outputs.get("T2"), Some(&strings(&["ok"])));
  assert_eq!(executor.node_status("T1"), Some(NodeStatus::Completed));
}

#[tokio::test]
async fn test_two_roots_merge_with_single_slot() {
  let mut executor = executor(1);
  executor.add_node("T1", TransformNode::joining("T1", " "));
  executor.add_node("T2", TransformNode::joining("T2", " "));
  executor.add_node("L1", DelegateNode::new("L1", Arc::new(MockGenerator)));
  executor.add_node("L2", DelegateNode::new("L2", Arc::new(MockGenerator)));
  executor.add_node("T3", TransformNode::joining("T3", " | "));
  executor.add_edge("T1", "L1").unwrap();
  executor.add_edge("T2", "L2").unwrap();
  executor.add_edge("L1", "T3").unwrap();
  executor.add_edge("L2", "T3").unwrap();
  let mut status_rx = executor.subscribe_status();

  let result = executor
    .execute(
      inputs(&[("T1", &["hello", "world"]), ("T2", &["goodbye", "world"])]),
      CancellationToken::new(),
    )
    .await
    .expect("execution should succeed");

  let first = "mock response: hello world";
  let second = "mock response: goodbye world";
  let merged = &result.final_outputs.get("T3").expect("T3 is the only leaf")[0];
  assert!(
    *merged == format!("{first} | {second}") || *merged == format!("{second} | {first}"),
    "unexpected merge output: {merged}"
  );
  assert_eq!(result.final_outputs.len(), 1);
  assert_eq!(result.outputs.len(), 5);

  let mut running = 0usize;
  let mut peak = 0usize;
  let mut transitions = 0;
  while let Some(NodeState { status, .. }) = status_rx.recv().await {
    transitions += 1;
    if status == NodeStatus::Running {
      running += 1;
      peak = peak.max(running);
    } else if status.is_terminal() {
      running -= 1;
    }
  }
  assert_eq!(peak, 1);
  assert_eq!(running, 0);
  assert_eq!(transitions, 10);
}

#[tokio::test]
async fn test_panicking_node_ends_in_error() {
  let mut executor = executor(2);
  executor.add_node(
    "P",
    TransformNode::new("P", |inputs: &[String]| {
      Ok(format!("{} {}", inputs[0], inputs[1]))
    }),
  );
  executor.add_node("Q", TransformNode::joining("Q", " "));
  executor.add_edge("P", "Q").unwrap();
  let mut status_rx = executor.subscribe_status();

  let result = executor
    .execute(inputs(&[("P", &["one"])]), CancellationToken::new())
    .await;

  match result {
    Err(ExecutionError::TaskJoin { message }) => {
      assert!(message.contains("panicked"), "unexpected message: {message}");
    }
    other => panic!("expected task join error, got {other:?}"),
  }

  let mut seen = Vec::new();
  while let Some(event) = status_rx.recv().await {
    seen.push(event);
  }
  assert_eq!(
    seen,
    vec![
      NodeState {
        id: NodeId::from("P"),
        status: NodeStatus::Running,
      },
      NodeState {
        id: NodeId::from("P"),
        status: NodeStatus::Error,
      },
    ]
  );
  assert_eq!(executor.node_status("P"), Some(NodeStatus::Error));
  assert_eq!(executor.node_status("Q"), Some(NodeStatus::Pending));
}
