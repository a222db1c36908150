mod common;

use std::cell::RefCell;
use std::rc::Rc;

use arbor::behaviours::{Failure as AlwaysFail, StatusCycle, Success as AlwaysSucceed};
use arbor::{
    Access, Behaviour, BehaviourTree, Blackboard, ConfigError, Context, Node, Status,
};
use common::{entries, journal, scripted};
use proptest::prelude::*;
use serde_json::{json, Value};

use Status::{Failure, Invalid, Running, Success};

fn run(root: Node, ticks: usize) -> Vec<Status> {
    let mut bt = BehaviourTree::new(root).expect("valid tree");
    (0..ticks)
        .map(|_| {
            bt.tick();
            bt.status()
        })
        .collect()
}

#[test]
fn inverter_swaps_success_and_failure_only() {
    let log = journal();
    let root = Node::inverter("not", scripted("child", &[Success, Running, Failure], &log));
    assert_eq!(run(root, 3), vec![Failure, Running, Success]);
}

#[test]
fn failure_is_success_and_success_is_failure() {
    let root = Node::failure_is_success("fis", Node::leaf("fail", AlwaysFail));
    assert_eq!(run(root, 1), vec![Success]);

    let root = Node::success_is_failure("sif", Node::leaf("ok", AlwaysSucceed));
    assert_eq!(run(root, 1), vec![Failure]);

    let root = Node::failure_is_success("fis", Node::leaf("ok", AlwaysSucceed));
    assert_eq!(run(root, 1), vec![Success]);
}

#[test]
fn condition_runs_until_the_child_reports_the_target() {
    let child = Node::leaf("cycle", StatusCycle::new([Failure, Failure, Success]));
    let root = Node::condition("wait", Success, child);
    assert_eq!(run(root, 4), vec![Running, Running, Success, Running]);
}

#[test]
fn condition_rejects_an_invalid_target() {
    let root = Node::condition("wait", Invalid, Node::leaf("ok", AlwaysSucceed));
    let err = BehaviourTree::new(root).expect_err("INVALID target");
    assert!(matches!(err, ConfigError::InvalidParameter { .. }));
}

#[test]
fn eternal_guard_stops_a_running_child_when_the_condition_turns_false() {
    let log = journal();
    let mut blackboard = Blackboard::new();
    let writer = blackboard.register_client("writer");
    blackboard
        .register_key(writer, "go", Access::Write)
        .expect("register");
    blackboard.write(writer, "go", true).expect("write");

    let root = Node::eternal_guard(
        "guard",
        |ctx: &Context<'_>| ctx.get::<bool>("go").unwrap_or(false),
        scripted("work", &[Running], &log),
    )
    .with_access("go", Access::Read);
    let mut bt = BehaviourTree::with_blackboard(root, blackboard).expect("valid tree");
    let work = bt.tree().find("work").expect("work exists");

    bt.tick();
    assert_eq!(bt.status(), Running);

    bt.blackboard_mut()
        .write(writer, "go", false)
        .expect("write");
    let traversal = bt.tick();

    assert_eq!(bt.status(), Failure);
    assert!(!traversal.contains(work));
    assert_eq!(bt.tree()[work].status(), Invalid);
    assert_eq!(entries(&log, "work:terminate"), vec!["work:terminate(INVALID)"]);
    assert_eq!(bt.feedback_message(), "guard condition is false");
}

#[test]
fn retry_absorbs_failures_up_to_the_limit_then_starts_over() {
    let root = Node::retry("retry", 3, Node::leaf("fail", AlwaysFail));
    assert_eq!(
        run(root, 5),
        vec![Running, Running, Failure, Running, Running]
    );
}

#[test]
fn retry_passes_success_through() {
    let child = Node::leaf("cycle", StatusCycle::new([Failure, Success]));
    let root = Node::retry("retry", 3, child);
    assert_eq!(run(root, 2), vec![Running, Success]);
}

#[test]
fn retry_requires_at_least_one_attempt() {
    let root = Node::retry("retry", 0, Node::leaf("fail", AlwaysFail));
    assert!(matches!(
        BehaviourTree::new(root),
        Err(ConfigError::InvalidParameter { .. })
    ));
}

/// Records the value at `key` each time it is updated.
struct Collect {
    key: &'static str,
    seen: Rc<RefCell<Vec<Value>>>,
    result: Status,
}

impl Behaviour for Collect {
    fn blackboard_keys(&self) -> Vec<(String, Access)> {
        vec![(self.key.to_owned(), Access::Read)]
    }

    fn update(&mut self, ctx: &mut Context<'_>) -> Status {
        match ctx.read(self.key) {
            Ok(value) => {
                self.seen.borrow_mut().push(value.clone());
                self.result
            }
            Err(_) => Status::Failure,
        }
    }
}

fn seeded(key: &str, value: Value) -> Blackboard {
    let mut blackboard = Blackboard::new();
    let seeder = blackboard.register_client("seeder");
    blackboard
        .register_key(seeder, key, Access::Write)
        .expect("register");
    blackboard.write_value(seeder, key, value).expect("write");
    blackboard.unregister_client(seeder).expect("unregister");
    blackboard
}

fn for_each_tree(items: Value, result: Status) -> (BehaviourTree, Rc<RefCell<Vec<Value>>>) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let child = Node::leaf(
        "collect",
        Collect {
            key: "item",
            seen: seen.clone(),
            result,
        },
    );
    let root = Node::for_each("each", "items", "item", child);
    let bt = BehaviourTree::with_blackboard(root, seeded("items", items)).expect("valid tree");
    (bt, seen)
}

#[test]
fn for_each_runs_the_child_once_per_element() {
    let (mut bt, seen) = for_each_tree(json!([1, 2, 3]), Success);

    let statuses: Vec<Status> = (0..3)
        .map(|_| {
            bt.tick();
            bt.status()
        })
        .collect();

    assert_eq!(statuses, vec![Running, Running, Success]);
    assert_eq!(*seen.borrow(), vec![json!(1), json!(2), json!(3)]);
}

#[test]
fn for_each_over_an_empty_array_succeeds_without_ticking_the_child() {
    let (mut bt, seen) = for_each_tree(json!([]), Success);
    let collect = bt.tree().find("collect").expect("collect exists");

    let traversal = bt.tick();

    assert_eq!(bt.status(), Success);
    assert!(!traversal.contains(collect));
    assert!(seen.borrow().is_empty());
}

#[test]
fn for_each_stops_at_the_first_failure() {
    let (mut bt, seen) = for_each_tree(json!(["a", "b"]), Failure);

    bt.tick();

    assert_eq!(bt.status(), Failure);
    assert_eq!(*seen.borrow(), vec![json!("a")]);
}

#[test]
fn for_each_fails_when_the_source_is_not_an_array() {
    let (mut bt, _) = for_each_tree(json!({"not": "an array"}), Success);
    bt.tick();
    assert_eq!(bt.status(), Failure);
    assert!(bt.feedback_message().contains("not an array"));
}

#[test]
fn for_each_fails_when_the_source_is_missing() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let child = Node::leaf(
        "collect",
        Collect {
            key: "item",
            seen,
            result: Success,
        },
    );
    let mut bt = BehaviourTree::new(Node::for_each("each", "items", "item", child))
        .expect("valid tree");

    bt.tick();

    assert_eq!(bt.status(), Failure);
    assert!(!bt.feedback_message().is_empty());
}

#[test]
fn status_to_blackboard_mirrors_every_child_status() {
    let child = Node::leaf("cycle", StatusCycle::new([Running, Success]));
    let mut bt = BehaviourTree::new(Node::status_to_blackboard("mirror", "result", child))
        .expect("valid tree");
    let reader = bt.blackboard_mut().register_client("reader");
    bt.blackboard_mut()
        .register_key(reader, "result", Access::Read)
        .expect("register");

    bt.tick();
    assert_eq!(bt.status(), Running);
    assert_eq!(bt.blackboard().get::<Status>(reader, "result").expect("read"), Running);

    bt.tick();
    assert_eq!(bt.status(), Success);
    assert_eq!(bt.blackboard().get::<Status>(reader, "result").expect("read"), Success);
}

#[test]
fn decorators_need_exactly_one_child() {
    let bare = Node::decorator("bare", arbor::Decorator::Inverter);
    assert!(matches!(
        BehaviourTree::new(bare),
        Err(ConfigError::DecoratorChildCount { found: 0, .. })
    ));

    let crowded = Node::inverter("crowded", Node::leaf("a", AlwaysSucceed))
        .with_child(Node::leaf("b", AlwaysSucceed));
    assert!(matches!(
        BehaviourTree::new(crowded),
        Err(ConfigError::DecoratorChildCount { found: 2, .. })
    ));
}

proptest! {
    #[test]
    fn double_inversion_is_transparent(
        script in prop::collection::vec(
            prop_oneof![Just(Running), Just(Success), Just(Failure)],
            1..6,
        )
    ) {
        let ticks = script.len() * 2;
        let plain = run(Node::leaf("cycle", StatusCycle::new(script.clone())), ticks);
        let doubled = run(
            Node::inverter("outer", Node::inverter("inner", Node::leaf("cycle", StatusCycle::new(script)))),
            ticks,
        );
        prop_assert_eq!(plain, doubled);
    }
}
