//! JSON tree descriptions.
//!
//! ```json
//! {
//!   "max_ticks": 10,
//!   "blackboard": { "targets": ["a", "b"] },
//!   "root": {
//!     "type": "for_each",
//!     "source_key": "targets",
//!     "target_key": "target",
//!     "children": [{ "type": "tick_counter", "duration": 2 }]
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use arbor_core::{Access, Blackboard, Context, Status};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::behaviours::{
    CheckBlackboardVariableExists, Failure, Running, SetBlackboardVariable, StatusCycle, Success,
    TickCounter,
};
use crate::{BehaviourTree, ConfigError, Decorator, Node, ParallelPolicy};

/// Name of the client that writes the initial blackboard values.
pub const SEED_CLIENT: &str = "config";

fn default_setup_timeout_ms() -> u64 {
    1_000
}

fn default_max_ticks() -> u64 {
    100
}

fn default_completion() -> Status {
    Status::Success
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeConfig {
    #[serde(default = "default_setup_timeout_ms")]
    pub setup_timeout_ms: u64,
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u64,
    /// Values written to the blackboard before the tree is built.
    #[serde(default)]
    pub blackboard: BTreeMap<String, Value>,
    pub root: NodeConfig,
}

impl TreeConfig {
    pub fn from_json_str(input: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(input)
    }

    pub fn setup_timeout(&self) -> Duration {
        Duration::from_millis(self.setup_timeout_ms)
    }

    /// Seeds a fresh blackboard and builds the tree. Setup is left to the
    /// caller.
    pub fn build(self) -> Result<BehaviourTree, ConfigError> {
        let TreeConfig {
            blackboard: seed,
            root,
            ..
        } = self;

        let mut blackboard = Blackboard::new();
        let seeder = blackboard.register_client(SEED_CLIENT);
        for (key, value) in seed {
            blackboard
                .register_key(seeder, key.clone(), Access::Write)
                .and_then(|()| blackboard.write_value(seeder, &key, value))
                .map_err(|source| ConfigError::Blackboard {
                    node: SEED_CLIENT.to_owned(),
                    source,
                })?;
        }
        blackboard
            .unregister_client(seeder)
            .map_err(|source| ConfigError::Blackboard {
                node: SEED_CLIENT.to_owned(),
                source,
            })?;

        BehaviourTree::with_blackboard(root.into_node(), blackboard)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub kind: NodeKindConfig,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKindConfig {
    Sequence {
        #[serde(default)]
        memory: bool,
    },
    Parallel {
        #[serde(default)]
        policy: ParallelPolicy,
    },
    Inverter,
    FailureIsSuccess,
    SuccessIsFailure,
    Condition {
        #[serde(alias = "status")]
        target_status: Status,
    },
    /// Guards on a boolean blackboard key; a missing key counts as false.
    EternalGuard {
        key: String,
    },
    Retry {
        num_failures: u32,
    },
    ForEach {
        source_key: String,
        target_key: String,
    },
    StatusToBlackboard {
        variable_name: String,
    },
    Success,
    Failure,
    Running,
    TickCounter {
        duration: u32,
        #[serde(default = "default_completion")]
        completion: Status,
    },
    StatusCycle {
        statuses: Vec<Status>,
    },
    SetBlackboardVariable {
        key: String,
        value: Value,
    },
    CheckBlackboardVariableExists {
        key: String,
    },
}

impl NodeKindConfig {
    pub fn default_name(&self) -> &'static str {
        match self {
            NodeKindConfig::Sequence { .. } => "Sequence",
            NodeKindConfig::Parallel { .. } => "Parallel",
            NodeKindConfig::Inverter => "Inverter",
            NodeKindConfig::FailureIsSuccess => "FailureIsSuccess",
            NodeKindConfig::SuccessIsFailure => "SuccessIsFailure",
            NodeKindConfig::Condition { .. } => "Condition",
            NodeKindConfig::EternalGuard { .. } => "EternalGuard",
            NodeKindConfig::Retry { .. } => "Retry",
            NodeKindConfig::ForEach { .. } => "ForEach",
            NodeKindConfig::StatusToBlackboard { .. } => "StatusToBlackboard",
            NodeKindConfig::Success => "Success",
            NodeKindConfig::Failure => "Failure",
            NodeKindConfig::Running => "Running",
            NodeKindConfig::TickCounter { .. } => "TickCounter",
            NodeKindConfig::StatusCycle { .. } => "StatusCycle",
            NodeKindConfig::SetBlackboardVariable { .. } => "SetBlackboardVariable",
            NodeKindConfig::CheckBlackboardVariableExists { .. } => "CheckBlackboardVariableExists",
        }
    }
}

impl NodeConfig {
    /// Converts the description into a [`Node`]. Structural checks happen
    /// when the node is built into a tree.
    pub fn into_node(self) -> Node {
        let NodeConfig {
            name,
            kind,
            children,
        } = self;
        let name = name.unwrap_or_else(|| kind.default_name().to_owned());

        let node = match kind {
            NodeKindConfig::Sequence { memory } => Node::sequence(name, memory),
            NodeKindConfig::Parallel { policy } => Node::parallel(name, policy),
            NodeKindConfig::Inverter => Node::decorator(name, Decorator::Inverter),
            NodeKindConfig::FailureIsSuccess => Node::decorator(name, Decorator::FailureIsSuccess),
            NodeKindConfig::SuccessIsFailure => Node::decorator(name, Decorator::SuccessIsFailure),
            NodeKindConfig::Condition { target_status } => {
                Node::decorator(name, Decorator::Condition { target: target_status })
            }
            NodeKindConfig::EternalGuard { key } => {
                let guard_key = key.clone();
                let guard = Decorator::eternal_guard(move |ctx: &Context<'_>| {
                    matches!(ctx.read(&guard_key), Ok(Value::Bool(true)))
                });
                Node::decorator(name, guard).with_access(key, Access::Read)
            }
            NodeKindConfig::Retry { num_failures } => {
                Node::decorator(name, Decorator::Retry { num_failures })
            }
            NodeKindConfig::ForEach {
                source_key,
                target_key,
            } => Node::decorator(
                name,
                Decorator::ForEach {
                    source_key,
                    target_key,
                },
            ),
            NodeKindConfig::StatusToBlackboard { variable_name } => {
                Node::decorator(name, Decorator::StatusToBlackboard { variable_name })
            }
            NodeKindConfig::Success => Node::leaf(name, Success),
            NodeKindConfig::Failure => Node::leaf(name, Failure),
            NodeKindConfig::Running => Node::leaf(name, Running),
            NodeKindConfig::TickCounter {
                duration,
                completion,
            } => Node::leaf(name, TickCounter::new(duration, completion)),
            NodeKindConfig::StatusCycle { statuses } => Node::leaf(name, StatusCycle::new(statuses)),
            NodeKindConfig::SetBlackboardVariable { key, value } => {
                Node::leaf(name, SetBlackboardVariable::new(key, value))
            }
            NodeKindConfig::CheckBlackboardVariableExists { key } => {
                Node::leaf(name, CheckBlackboardVariableExists::new(key))
            }
        };

        node.with_children(children.into_iter().map(NodeConfig::into_node))
    }
}
