//! Single-child decorators.
//!
//! A decorator ticks its child (unless a guard blocks it) and maps the child's
//! status to its own. Everything a decorator remembers between ticks lives in
//! [`DecoratorState`] and is cleared whenever the decorator is initialised or
//! terminated.

use std::fmt;

use arbor_core::{Access, Blackboard, Context, NodeId, Status};
use serde_json::Value;

use crate::tree::{Kind, Scope, Tree};
use crate::ConfigError;

pub type GuardCondition = Box<dyn FnMut(&Context<'_>) -> bool>;

pub enum Decorator {
    /// Swaps `SUCCESS` and `FAILURE`.
    Inverter,
    FailureIsSuccess,
    SuccessIsFailure,
    /// `SUCCESS` when the child returns `target`, `RUNNING` otherwise.
    Condition { target: Status },
    /// Re-checks the condition every tick before the child runs. A false
    /// condition fails the decorator and invalidates a running child.
    EternalGuard(GuardCondition),
    /// Absorbs child failures, reporting `RUNNING`, until `num_failures` have
    /// been seen in one activation.
    Retry { num_failures: u32 },
    /// Runs the child once per element of the array at `source_key`, writing
    /// the element to `target_key` first.
    ForEach {
        source_key: String,
        target_key: String,
    },
    /// Passes the child's status through and mirrors it to `variable_name`.
    StatusToBlackboard { variable_name: String },
}

impl Decorator {
    pub fn eternal_guard(condition: impl FnMut(&Context<'_>) -> bool + 'static) -> Self {
        Decorator::EternalGuard(Box::new(condition))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Decorator::Inverter => "Inverter",
            Decorator::FailureIsSuccess => "FailureIsSuccess",
            Decorator::SuccessIsFailure => "SuccessIsFailure",
            Decorator::Condition { .. } => "Condition",
            Decorator::EternalGuard(_) => "EternalGuard",
            Decorator::Retry { .. } => "Retry",
            Decorator::ForEach { .. } => "ForEach",
            Decorator::StatusToBlackboard { .. } => "StatusToBlackboard",
        }
    }

    pub(crate) fn blackboard_keys(&self) -> Vec<(String, Access)> {
        match self {
            Decorator::ForEach {
                source_key,
                target_key,
            } => vec![
                (source_key.clone(), Access::Read),
                (target_key.clone(), Access::Write),
            ],
            Decorator::StatusToBlackboard { variable_name } => {
                vec![(variable_name.clone(), Access::Write)]
            }
            _ => Vec::new(),
        }
    }

    pub(crate) fn validate(&self, node: &str) -> Result<(), ConfigError> {
        let invalid = |reason| ConfigError::InvalidParameter {
            node: node.to_owned(),
            reason,
        };
        let missing = |parameter| ConfigError::MissingParameter {
            node: node.to_owned(),
            parameter,
        };

        match self {
            Decorator::Condition {
                target: Status::Invalid,
            } => Err(invalid("condition target cannot be INVALID")),
            Decorator::Retry { num_failures: 0 } => Err(invalid("num_failures must be at least 1")),
            Decorator::ForEach { source_key, .. } if source_key.is_empty() => {
                Err(missing("source_key"))
            }
            Decorator::ForEach { target_key, .. } if target_key.is_empty() => {
                Err(missing("target_key"))
            }
            Decorator::ForEach {
                source_key,
                target_key,
            } if source_key == target_key => Err(invalid("source_key and target_key must differ")),
            Decorator::StatusToBlackboard { variable_name } if variable_name.is_empty() => {
                Err(missing("variable_name"))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for Decorator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decorator::Condition { target } => {
                f.debug_struct("Condition").field("target", target).finish()
            }
            Decorator::Retry { num_failures } => f
                .debug_struct("Retry")
                .field("num_failures", num_failures)
                .finish(),
            Decorator::ForEach {
                source_key,
                target_key,
            } => f
                .debug_struct("ForEach")
                .field("source_key", source_key)
                .field("target_key", target_key)
                .finish(),
            Decorator::StatusToBlackboard { variable_name } => f
                .debug_struct("StatusToBlackboard")
                .field("variable_name", variable_name)
                .finish(),
            other => f.write_str(other.type_name()),
        }
    }
}

#[derive(Debug)]
struct Iteration {
    items: Vec<Value>,
    cursor: usize,
}

#[derive(Debug)]
pub(crate) struct DecoratorState {
    pub(crate) decorator: Decorator,
    failures: u32,
    iteration: Option<Iteration>,
}

impl DecoratorState {
    pub(crate) fn new(decorator: Decorator) -> Self {
        Self {
            decorator,
            failures: 0,
            iteration: None,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.failures = 0;
        self.iteration = None;
    }
}

impl Tree {
    pub(crate) fn tick_decorator(&mut self, id: NodeId, scope: &mut Scope<'_>) -> Status {
        let Some(&child) = self[id].children.first() else {
            return Status::Failure;
        };

        if !self.guard_allows(id, scope.blackboard) {
            self.set_feedback(id, "guard condition is false");
            return Status::Failure;
        }
        if let Some(status) = self.next_item(id, scope.blackboard) {
            return status;
        }

        let child_status = self.tick_node(child, scope);
        self.decorate(id, child_status, scope.blackboard)
    }

    fn guard_allows(&mut self, id: NodeId, blackboard: &mut Blackboard) -> bool {
        let tick = self.tick_count();
        let entry = self.entry_mut(id);
        let Kind::Decorator(state) = &mut entry.kind else {
            return true;
        };
        let Decorator::EternalGuard(condition) = &mut state.decorator else {
            return true;
        };
        let ctx = Context::new(tick, id, entry.client, blackboard, &mut entry.feedback);
        condition(&ctx)
    }

    /// Loads the source array on the first tick of an activation and publishes
    /// the current element. Returns a status when the child must not run.
    fn next_item(&mut self, id: NodeId, blackboard: &mut Blackboard) -> Option<Status> {
        let tick = self.tick_count();
        let entry = self.entry_mut(id);
        let Kind::Decorator(state) = &mut entry.kind else {
            return None;
        };
        let Decorator::ForEach {
            source_key,
            target_key,
        } = &state.decorator
        else {
            return None;
        };
        let mut ctx = Context::new(tick, id, entry.client, blackboard, &mut entry.feedback);

        if state.iteration.is_none() {
            let loaded = match ctx.read(source_key) {
                Ok(Value::Array(items)) => Ok(items.clone()),
                Ok(other) => Err(format!("'{source_key}' holds {other}, not an array")),
                Err(error) => Err(error.to_string()),
            };
            match loaded {
                Ok(items) => state.iteration = Some(Iteration { items, cursor: 0 }),
                Err(message) => {
                    tracing::warn!(node = %entry.name, %id, %message, "nothing to iterate");
                    ctx.set_feedback(message);
                    return Some(Status::Failure);
                }
            }
        }

        let iteration = state.iteration.as_ref()?;
        let Some(item) = iteration.items.get(iteration.cursor).cloned() else {
            ctx.set_feedback(format!("'{source_key}' is empty"));
            return Some(Status::Success);
        };
        let progress = format!("item {} of {}", iteration.cursor + 1, iteration.items.len());

        if let Err(error) = ctx.write_value(target_key, item) {
            ctx.set_feedback(error.to_string());
            return Some(Status::Failure);
        }
        ctx.set_feedback(progress);
        None
    }

    fn decorate(&mut self, id: NodeId, child_status: Status, blackboard: &mut Blackboard) -> Status {
        let tick = self.tick_count();
        let entry = self.entry_mut(id);
        let Kind::Decorator(state) = &mut entry.kind else {
            return child_status;
        };
        let mut ctx = Context::new(tick, id, entry.client, blackboard, &mut entry.feedback);

        match &state.decorator {
            Decorator::Inverter => child_status.invert(),
            Decorator::FailureIsSuccess => match child_status {
                Status::Failure => Status::Success,
                other => other,
            },
            Decorator::SuccessIsFailure => match child_status {
                Status::Success => Status::Failure,
                other => other,
            },
            Decorator::Condition { target } => {
                if child_status == *target {
                    Status::Success
                } else {
                    ctx.set_feedback(format!("waiting for {target}, child is {child_status}"));
                    Status::Running
                }
            }
            Decorator::EternalGuard(_) => child_status,
            Decorator::Retry { num_failures } => match child_status {
                Status::Failure => {
                    state.failures += 1;
                    if state.failures < *num_failures {
                        ctx.set_feedback(format!(
                            "attempt failed [{} of {} failures]",
                            state.failures, num_failures
                        ));
                        Status::Running
                    } else {
                        ctx.set_feedback(format!("gave up after {num_failures} failures"));
                        Status::Failure
                    }
                }
                other => other,
            },
            Decorator::ForEach { .. } => match child_status {
                Status::Success => match &mut state.iteration {
                    Some(iteration) if iteration.cursor + 1 < iteration.items.len() => {
                        iteration.cursor += 1;
                        Status::Running
                    }
                    _ => Status::Success,
                },
                other => other,
            },
            Decorator::StatusToBlackboard { variable_name } => {
                if let Err(error) = ctx.write(variable_name, child_status) {
                    tracing::warn!(%id, %error, "could not record child status");
                    ctx.set_feedback(error.to_string());
                }
                child_status
            }
        }
    }
}
