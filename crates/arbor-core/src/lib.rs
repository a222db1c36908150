//! Engine-agnostic primitives shared by every arbor node.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod behaviour;
pub mod blackboard;
pub mod error;
pub mod node;
pub mod status;

pub use behaviour::{Behaviour, BoxError, Context};
pub use blackboard::{Access, Blackboard, ClientId};
pub use error::BlackboardError;
pub use node::NodeId;
pub use status::Status;
