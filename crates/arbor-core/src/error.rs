use thiserror::Error;

use crate::{Access, ClientId};

/// Blackboard contract violations, reported to the caller of the offending
/// operation.
#[derive(Debug, Error)]
pub enum BlackboardError {
    #[error("blackboard client {0} is not registered")]
    UnknownClient(ClientId),

    #[error("blackboard key '{key}' has not been set")]
    KeyNotSet { key: String },

    #[error("client '{client}' lacks {required} access to key '{key}'")]
    AccessDenied {
        client: String,
        key: String,
        required: Access,
    },

    #[error("key '{key}' is exclusively written by client '{holder}'")]
    ExclusiveConflict { key: String, holder: String },

    #[error("value of key '{key}' could not be decoded: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("value for key '{key}' could not be encoded: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}
