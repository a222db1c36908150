mod common;

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use arbor::behaviours::{Running as AlwaysRunning, Success as AlwaysSucceed};
use arbor::{
    Access, Behaviour, BehaviourTree, BoxError, ConfigError, Context, Node, SetupError, Status,
};
use arbor_tools::{Phase, SharedTraceLog};
use common::{entries, journal, scripted};

use Status::{Failure, Invalid, Running, Success};

#[test]
fn initialise_runs_once_per_activation_and_terminate_once_per_resolution() {
    let log = journal();
    let trace = SharedTraceLog::new();
    let root = Node::sequence("seq", false).with_child(scripted("a", &[Running, Success], &log));
    let mut bt = BehaviourTree::new(root)
        .expect("valid tree")
        .with_trace_sink(trace.clone());
    let a = bt.tree().find("a").expect("a exists");

    bt.tick();
    bt.tick();

    assert_eq!(
        entries(&log, "a:"),
        vec!["a:initialise", "a:update", "a:update", "a:terminate(SUCCESS)"]
    );
    let trace = trace.log();
    assert_eq!(trace.count(a, Phase::Initialise), 1);
    assert_eq!(trace.count(a, Phase::Update), 2);
    assert_eq!(trace.terminations(a), vec![Success]);
    assert_eq!(trace.terminations(bt.root()), vec![Success]);
}

#[test]
fn interrupt_terminates_running_nodes_once_and_leaves_everything_invalid() {
    let log = journal();
    let root = Node::sequence("seq", false).with_children([
        scripted("a", &[Success], &log),
        scripted("b", &[Running], &log),
        scripted("never", &[Success], &log),
    ]);
    let mut bt = BehaviourTree::new(root).expect("valid tree");

    bt.tick();
    bt.interrupt();

    assert_eq!(entries(&log, "a:terminate"), vec!["a:terminate(SUCCESS)"]);
    assert_eq!(entries(&log, "b:terminate"), vec!["b:terminate(INVALID)"]);
    assert!(entries(&log, "never:").is_empty());
    assert!(bt.tree().iter().all(|id| bt.tree()[id].status() == Invalid));

    // A second interrupt finds nothing running.
    bt.interrupt();
    assert_eq!(entries(&log, "b:terminate").len(), 1);
}

#[test]
fn parent_terminates_after_its_running_children_are_invalidated() {
    let trace = SharedTraceLog::new();
    let root = Node::parallel("par", arbor::ParallelPolicy::SuccessOnOne).with_children([
        Node::leaf("spin", AlwaysRunning),
        Node::leaf("done", AlwaysSucceed),
    ]);
    let mut bt = BehaviourTree::new(root)
        .expect("valid tree")
        .with_trace_sink(trace.clone());
    let spin = bt.tree().find("spin").expect("spin exists");

    bt.tick();

    let log = trace.log();
    let terminations: Vec<_> = log
        .events
        .iter()
        .filter(|event| event.phase == Phase::Terminate)
        .map(|event| (event.node, event.status))
        .collect();
    let done = bt.tree().find("done").expect("done exists");
    assert_eq!(
        terminations,
        vec![(done, Success), (spin, Invalid), (bt.root(), Success)]
    );
}

struct ReturnsInvalid;

impl Behaviour for ReturnsInvalid {
    fn update(&mut self, _ctx: &mut Context<'_>) -> Status {
        Status::Invalid
    }
}

#[test]
fn invalid_from_update_counts_as_failure() {
    let mut bt = BehaviourTree::new(Node::leaf("broken", ReturnsInvalid)).expect("valid tree");
    bt.tick();
    assert_eq!(bt.status(), Failure);
}

#[test]
fn tick_count_and_traversal_tick_agree() {
    let mut bt = BehaviourTree::new(Node::leaf("ok", AlwaysSucceed)).expect("valid tree");
    assert_eq!(bt.count(), 0);
    let first = bt.tick();
    let second = bt.tick();
    assert_eq!((first.tick(), second.tick()), (1, 2));
    assert_eq!(bt.count(), 2);
}

struct SlowSetup {
    delay: Duration,
    order: Rc<RefCell<Vec<&'static str>>>,
    name: &'static str,
}

impl Behaviour for SlowSetup {
    fn setup(&mut self, _timeout: Duration) -> Result<(), BoxError> {
        self.order.borrow_mut().push(self.name);
        std::thread::sleep(self.delay);
        Ok(())
    }

    fn update(&mut self, _ctx: &mut Context<'_>) -> Status {
        Status::Success
    }
}

struct BrokenSetup;

impl Behaviour for BrokenSetup {
    fn setup(&mut self, _timeout: Duration) -> Result<(), BoxError> {
        Err("device not found".into())
    }

    fn update(&mut self, _ctx: &mut Context<'_>) -> Status {
        Status::Success
    }
}

fn slow(name: &'static str, delay: Duration, order: &Rc<RefCell<Vec<&'static str>>>) -> Node {
    Node::leaf(
        name,
        SlowSetup {
            delay,
            order: order.clone(),
            name,
        },
    )
}

#[test]
fn setup_visits_nodes_in_pre_order() {
    let order = Rc::new(RefCell::new(Vec::new()));
    let root = Node::sequence("root", false).with_children([
        Node::sequence("left", false).with_child(slow("a", Duration::ZERO, &order)),
        slow("b", Duration::ZERO, &order),
    ]);
    let mut bt = BehaviourTree::new(root).expect("valid tree");

    bt.setup(Duration::from_secs(1)).expect("setup");

    assert_eq!(*order.borrow(), vec!["a", "b"]);
}

#[test]
fn setup_overrun_is_reported_with_the_node() {
    let order = Rc::new(RefCell::new(Vec::new()));
    let root = Node::sequence("root", false).with_children([
        slow("slow", Duration::from_millis(30), &order),
        slow("after", Duration::ZERO, &order),
    ]);
    let mut bt = BehaviourTree::new(root).expect("valid tree");

    let err = bt.setup(Duration::from_millis(5)).expect_err("overrun");

    match err {
        SetupError::Timeout { node, elapsed, .. } => {
            assert_eq!(node, "slow");
            assert!(elapsed >= Duration::from_millis(30));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(*order.borrow(), vec!["slow"]);
}

#[test]
fn setup_failure_is_fatal() {
    let root = Node::sequence("root", false).with_child(Node::leaf("sensor", BrokenSetup));
    let mut bt = BehaviourTree::new(root).expect("valid tree");

    let err = bt.setup(Duration::from_secs(1)).expect_err("broken");

    assert!(matches!(err, SetupError::Failed { ref node, .. } if node == "sensor"));
    assert!(err.to_string().contains("device not found"));
}

#[test]
fn leaves_cannot_own_children() {
    let root = Node::leaf("leaf", AlwaysSucceed).with_child(Node::leaf("child", AlwaysSucceed));
    assert!(matches!(
        BehaviourTree::new(root),
        Err(ConfigError::LeafWithChildren { found: 1, .. })
    ));
}

#[test]
fn every_node_gets_its_own_named_client() {
    let root = Node::sequence("root", false).with_children([
        Node::leaf("a", AlwaysSucceed),
        Node::leaf("b", AlwaysSucceed),
    ]);
    let bt = BehaviourTree::new(root).expect("valid tree");
    let tree = bt.tree();

    let clients: Vec<_> = tree.iter().map(|id| tree[id].client()).collect();
    for (id, client) in tree.iter().zip(&clients) {
        assert_eq!(bt.blackboard().client_name(*client), Some(tree[id].name()));
    }
    assert_ne!(clients[1], clients[2]);
    assert_ne!(tree[node_id(tree, "a")].uid(), tree[node_id(tree, "b")].uid());
}

fn node_id(tree: &arbor::Tree, name: &str) -> arbor::NodeId {
    tree.find(name).expect("node exists")
}

struct Owns(&'static str);

impl Behaviour for Owns {
    fn blackboard_keys(&self) -> Vec<(String, Access)> {
        vec![(self.0.to_owned(), Access::ExclusiveWrite)]
    }

    fn update(&mut self, _ctx: &mut Context<'_>) -> Status {
        Status::Success
    }
}

#[test]
fn conflicting_exclusive_keys_reject_the_tree() {
    let root = Node::sequence("root", false).with_children([
        Node::leaf("first", Owns("target")),
        Node::leaf("second", Owns("target")),
    ]);
    let err = BehaviourTree::new(root).expect_err("conflict");
    assert!(matches!(err, ConfigError::Blackboard { ref node, .. } if node == "second"));
}
