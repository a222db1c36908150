use std::fmt;

use serde::{Deserialize, Serialize};

/// Result of ticking a node.
///
/// `Invalid` is the state of a node that has never been ticked or whose run
/// was cut short by its parent. `update` implementations only ever return the
/// other three variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    #[default]
    Invalid,
    Running,
    Success,
    Failure,
}

impl Status {
    pub fn is_running(self) -> bool {
        matches!(self, Status::Running)
    }

    /// `true` for `Success` and `Failure`.
    pub fn is_resolved(self) -> bool {
        matches!(self, Status::Success | Status::Failure)
    }

    /// Swaps `Success` and `Failure`; `Running` and `Invalid` are fixed points.
    pub fn invert(self) -> Self {
        match self {
            Status::Success => Status::Failure,
            Status::Failure => Status::Success,
            other => other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Invalid => "INVALID",
            Status::Running => "RUNNING",
            Status::Success => "SUCCESS",
            Status::Failure => "FAILURE",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
