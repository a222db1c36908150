//! Built-in example trees.

use anyhow::{Context as _, Result};
use arbor::behaviours::{
    CheckBlackboardVariableExists, Failure, Running, StatusCycle, Success, TickCounter,
};
use arbor::{Access, BehaviourTree, Blackboard, Context, Node, ParallelPolicy, Status};
use serde_json::json;

pub struct Demo {
    pub name: &'static str,
    pub about: &'static str,
    pub ticks: u64,
    build: fn() -> Result<BehaviourTree>,
}

impl Demo {
    pub fn build(&self) -> Result<BehaviourTree> {
        (self.build)().with_context(|| format!("building demo '{}'", self.name))
    }
}

pub const DEMOS: &[Demo] = &[
    Demo {
        name: "sequence",
        about: "memory sequence of two tick counters",
        ticks: 5,
        build: sequence,
    },
    Demo {
        name: "parallel",
        about: "counters of different lengths under success-on-all",
        ticks: 4,
        build: parallel,
    },
    Demo {
        name: "retry",
        about: "retry absorbing two failures before the child succeeds",
        ticks: 4,
        build: retry,
    },
    Demo {
        name: "eternal-guard",
        about: "guard that closes on tick 4 and stops a running sequence",
        ticks: 6,
        build: eternal_guard,
    },
    Demo {
        name: "condition",
        about: "condition waiting for its child to report SUCCESS",
        ticks: 4,
        build: condition,
    },
    Demo {
        name: "failure-is-success",
        about: "failure remapped to success",
        ticks: 1,
        build: failure_is_success,
    },
    Demo {
        name: "success-is-failure",
        about: "success remapped to failure",
        ticks: 1,
        build: success_is_failure,
    },
    Demo {
        name: "for-each",
        about: "per-element work over a blackboard array",
        ticks: 7,
        build: for_each,
    },
    Demo {
        name: "status-to-blackboard",
        about: "child status mirrored to the blackboard every tick",
        ticks: 4,
        build: status_to_blackboard,
    },
    Demo {
        name: "skeleton",
        about: "a small task tree mixing composites and decorators",
        ticks: 6,
        build: skeleton,
    },
];

pub fn find(name: &str) -> Option<&'static Demo> {
    DEMOS.iter().find(|demo| demo.name == name)
}

fn counter(name: &str, duration: u32) -> Node {
    Node::leaf(name, TickCounter::new(duration, Status::Success))
}

fn sequence() -> Result<BehaviourTree> {
    let root = Node::sequence("Sequence", true)
        .with_children([counter("Counter 1", 2), counter("Counter 2", 2)]);
    Ok(BehaviourTree::new(root)?)
}

fn parallel() -> Result<BehaviourTree> {
    let root = Node::parallel("Parallel", ParallelPolicy::SuccessOnAll).with_children([
        counter("Counter 1", 1),
        counter("Counter 2", 2),
        counter("Counter 3", 3),
    ]);
    Ok(BehaviourTree::new(root)?)
}

fn retry() -> Result<BehaviourTree> {
    let flaky = Node::leaf(
        "Flaky",
        StatusCycle::new([Status::Failure, Status::Failure, Status::Success]),
    );
    Ok(BehaviourTree::new(Node::retry("Retry", 3, flaky))?)
}

fn eternal_guard() -> Result<BehaviourTree> {
    let task = Node::sequence("Task", true)
        .with_children([counter("Counter 1", 2), counter("Counter 2", 3)]);
    let root = Node::eternal_guard("Guard", |ctx: &Context<'_>| ctx.tick() < 4, task);
    Ok(BehaviourTree::new(root)?)
}

fn condition() -> Result<BehaviourTree> {
    let child = Node::leaf(
        "Signal",
        StatusCycle::new([Status::Failure, Status::Running, Status::Success]),
    );
    Ok(BehaviourTree::new(Node::condition(
        "Wait For Success",
        Status::Success,
        child,
    ))?)
}

fn failure_is_success() -> Result<BehaviourTree> {
    let root = Node::failure_is_success("Failure Is Success", Node::leaf("Failure", Failure));
    Ok(BehaviourTree::new(root)?)
}

fn success_is_failure() -> Result<BehaviourTree> {
    let root = Node::success_is_failure("Success Is Failure", Node::leaf("Success", Success));
    Ok(BehaviourTree::new(root)?)
}

fn for_each() -> Result<BehaviourTree> {
    let mut blackboard = Blackboard::new();
    let seeder = blackboard.register_client("demo");
    blackboard.register_key(seeder, "rooms", Access::Write)?;
    blackboard.write(seeder, "rooms", json!(["kitchen", "hall", "study"]))?;
    blackboard.unregister_client(seeder)?;

    let visit = Node::sequence("Visit", true).with_children([
        Node::leaf("Room Known", CheckBlackboardVariableExists::new("room")),
        counter("Walk", 2),
    ]);
    let root = Node::for_each("Each Room", "rooms", "room", visit);
    Ok(BehaviourTree::with_blackboard(root, blackboard)?)
}

fn status_to_blackboard() -> Result<BehaviourTree> {
    let root = Node::status_to_blackboard("Record", "result", counter("Counter", 3));
    Ok(BehaviourTree::new(root)?)
}

fn skeleton() -> Result<BehaviourTree> {
    let work = Node::parallel("Work", ParallelPolicy::SuccessOnOne).with_children([
        Node::leaf("Idle", Running),
        counter("Job", 3),
    ]);
    let root = Node::sequence("Skeleton", false).with_children([
        Node::leaf("Ready", Success),
        Node::retry("Retry Work", 2, work),
        Node::inverter("Not Failed", Node::leaf("Failed", Failure)),
    ]);
    Ok(BehaviourTree::new(root)?)
}
