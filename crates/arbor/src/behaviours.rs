//! Stock leaf behaviours.

use arbor_core::{Access, Behaviour, Context, Status};
use serde_json::Value;

/// Always `SUCCESS`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Success;

impl Behaviour for Success {
    fn update(&mut self, _ctx: &mut Context<'_>) -> Status {
        Status::Success
    }
}

/// Always `FAILURE`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Failure;

impl Behaviour for Failure {
    fn update(&mut self, _ctx: &mut Context<'_>) -> Status {
        Status::Failure
    }
}

/// Always `RUNNING`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Running;

impl Behaviour for Running {
    fn update(&mut self, _ctx: &mut Context<'_>) -> Status {
        Status::Running
    }
}

/// `RUNNING` for `duration - 1` ticks, then `completion`. The count restarts
/// on every initialise.
#[derive(Debug, Clone)]
pub struct TickCounter {
    duration: u32,
    completion: Status,
    counter: u32,
}

impl TickCounter {
    pub fn new(duration: u32, completion: Status) -> Self {
        Self {
            duration,
            completion,
            counter: 0,
        }
    }
}

impl Behaviour for TickCounter {
    fn initialise(&mut self, _ctx: &mut Context<'_>) {
        self.counter = 0;
    }

    fn update(&mut self, ctx: &mut Context<'_>) -> Status {
        self.counter += 1;
        if self.counter < self.duration {
            ctx.set_feedback(format!("{} of {}", self.counter, self.duration));
            Status::Running
        } else {
            ctx.set_feedback(format!("done after {} ticks", self.counter));
            self.completion
        }
    }
}

/// Returns the listed statuses in turn, wrapping around. The position survives
/// re-initialisation.
#[derive(Debug, Clone)]
pub struct StatusCycle {
    statuses: Vec<Status>,
    next: usize,
}

impl StatusCycle {
    pub fn new(statuses: impl Into<Vec<Status>>) -> Self {
        Self {
            statuses: statuses.into(),
            next: 0,
        }
    }
}

impl Behaviour for StatusCycle {
    fn update(&mut self, ctx: &mut Context<'_>) -> Status {
        let Some(&status) = self.statuses.get(self.next % self.statuses.len().max(1)) else {
            ctx.set_feedback("no statuses to cycle through");
            return Status::Failure;
        };
        self.next = (self.next + 1) % self.statuses.len();
        ctx.set_feedback(status.as_str());
        status
    }
}

#[derive(Debug, Clone)]
pub struct SetBlackboardVariable {
    key: String,
    value: Value,
}

impl SetBlackboardVariable {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl Behaviour for SetBlackboardVariable {
    fn blackboard_keys(&self) -> Vec<(String, Access)> {
        vec![(self.key.clone(), Access::Write)]
    }

    fn update(&mut self, ctx: &mut Context<'_>) -> Status {
        match ctx.write_value(&self.key, self.value.clone()) {
            Ok(()) => Status::Success,
            Err(error) => {
                ctx.set_feedback(error.to_string());
                Status::Failure
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckBlackboardVariableExists {
    key: String,
}

impl CheckBlackboardVariableExists {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl Behaviour for CheckBlackboardVariableExists {
    fn blackboard_keys(&self) -> Vec<(String, Access)> {
        vec![(self.key.clone(), Access::Read)]
    }

    fn update(&mut self, ctx: &mut Context<'_>) -> Status {
        match ctx.read(&self.key) {
            Ok(_) => Status::Success,
            Err(error) => {
                let message = error.to_string();
                ctx.set_feedback(message);
                Status::Failure
            }
        }
    }
}
