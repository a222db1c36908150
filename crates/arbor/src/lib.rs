//! Tick-driven behaviour trees built on `arbor-core`.
//!
//! A [`Node`] describes a subtree; [`Tree`] turns it into an arena of live
//! nodes and drives the initialise/update/terminate lifecycle; and
//! [`BehaviourTree`] pairs a tree with its blackboard.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod behaviours;
pub mod composite;
pub mod config;
pub mod controller;
pub mod decorator;
pub mod error;
pub mod node;
pub mod tree;

pub use arbor_core::{
    Access, Behaviour, Blackboard, BlackboardError, BoxError, ClientId, Context, NodeId, Status,
};
pub use composite::ParallelPolicy;
pub use config::{NodeConfig, NodeKindConfig, TreeConfig};
pub use controller::BehaviourTree;
pub use decorator::Decorator;
pub use error::{ConfigError, SetupError};
pub use node::Node;
pub use tree::{NodeEntry, PreOrder, Traversal, Tree};
