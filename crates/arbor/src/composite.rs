use arbor_core::{NodeId, Status};
use serde::{Deserialize, Serialize};

use crate::tree::{Kind, Scope, Tree};

/// Cursor of a sequence. With `memory` the sequence resumes at `current`
/// after a `RUNNING` tick instead of re-checking earlier children.
#[derive(Debug, Clone, Default)]
pub(crate) struct SequenceState {
    pub(crate) memory: bool,
    pub(crate) current: Option<usize>,
}

impl SequenceState {
    pub(crate) fn new(memory: bool) -> Self {
        Self {
            memory,
            current: None,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.current = None;
    }

    fn start(&self) -> usize {
        if self.memory {
            self.current.unwrap_or(0)
        } else {
            0
        }
    }

    /// Keeps the cursor on the same child when one is inserted before it.
    pub(crate) fn child_inserted(&mut self, index: usize) {
        if let Some(current) = &mut self.current {
            if index <= *current {
                *current += 1;
            }
        }
    }

    /// Removing the current child leaves the cursor on its successor.
    pub(crate) fn child_removed(&mut self, index: usize) {
        if let Some(current) = &mut self.current {
            if index < *current {
                *current -= 1;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParallelPolicy {
    /// `SUCCESS` once every child succeeds, `FAILURE` as soon as one fails.
    #[default]
    SuccessOnAll,
    /// `SUCCESS` as soon as one child succeeds, `FAILURE` once all fail.
    SuccessOnOne,
}

impl ParallelPolicy {
    /// Combines the statuses the children returned this tick.
    pub fn resolve(self, statuses: &[Status]) -> Status {
        match self {
            ParallelPolicy::SuccessOnAll => {
                if statuses.contains(&Status::Failure) {
                    Status::Failure
                } else if statuses.iter().all(|s| *s == Status::Success) {
                    Status::Success
                } else {
                    Status::Running
                }
            }
            ParallelPolicy::SuccessOnOne => {
                if statuses.contains(&Status::Success) {
                    Status::Success
                } else if statuses.iter().all(|s| *s == Status::Failure) {
                    Status::Failure
                } else {
                    Status::Running
                }
            }
        }
    }
}

impl Tree {
    pub(crate) fn tick_sequence(&mut self, id: NodeId, scope: &mut Scope<'_>) -> Status {
        let start = match &self[id].kind {
            Kind::Sequence(state) => state.start(),
            _ => 0,
        };

        for index in start..self[id].children.len() {
            let child = self[id].children[index];
            let status = self.tick_node(child, scope);
            if status == Status::Success {
                continue;
            }

            self.invalidate_children_from(id, index + 1, scope.blackboard);
            if let Kind::Sequence(state) = &mut self.entry_mut(id).kind {
                state.current = status.is_running().then_some(index);
            }
            return status;
        }

        if let Kind::Sequence(state) = &mut self.entry_mut(id).kind {
            state.reset();
        }
        Status::Success
    }

    /// Ticks every child, then lets the policy decide. Children still running
    /// when the parallel resolves are invalidated by the caller.
    pub(crate) fn tick_parallel(&mut self, id: NodeId, scope: &mut Scope<'_>) -> Status {
        let Kind::Parallel(policy) = self[id].kind else {
            return Status::Failure;
        };

        let count = self[id].children.len();
        let mut statuses = Vec::with_capacity(count);
        for index in 0..count {
            let child = self[id].children[index];
            statuses.push(self.tick_node(child, scope));
        }
        policy.resolve(&statuses)
    }
}
