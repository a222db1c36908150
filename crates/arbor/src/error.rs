use std::time::Duration;

use arbor_core::{BlackboardError, BoxError, NodeId};
use thiserror::Error;

/// Structural problems detected while building or editing a tree.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("leaf '{node}' cannot own children (found {found})")]
    LeafWithChildren { node: String, found: usize },

    #[error("decorator '{node}' must have exactly one child (found {found})")]
    DecoratorChildCount { node: String, found: usize },

    #[error("node '{node}': {reason}")]
    InvalidParameter { node: String, reason: &'static str },

    #[error("node '{node}' is missing required parameter '{parameter}'")]
    MissingParameter {
        node: String,
        parameter: &'static str,
    },

    #[error("node '{node}' could not register its blackboard keys: {source}")]
    Blackboard {
        node: String,
        #[source]
        source: BlackboardError,
    },

    #[error("node {0} is not part of the tree")]
    UnknownNode(NodeId),

    #[error("the root node cannot be detached")]
    RootDetach,

    #[error("subtree added after setup could not be set up: {0}")]
    Setup(#[from] SetupError),
}

/// Fatal failures of the one-time setup pass. A tree whose setup failed must
/// not be ticked.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("setup of '{node}' ({id}) took {elapsed:?}, over the {timeout:?} budget")]
    Timeout {
        id: NodeId,
        node: String,
        elapsed: Duration,
        timeout: Duration,
    },

    #[error("setup of '{node}' ({id}) failed: {source}")]
    Failed {
        id: NodeId,
        node: String,
        #[source]
        source: BoxError,
    },
}
