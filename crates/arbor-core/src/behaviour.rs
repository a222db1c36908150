use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::{Access, Blackboard, BlackboardError, ClientId, NodeId, Status};

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Leaf task logic.
///
/// The tree drives the lifecycle: `initialise` runs whenever the node is
/// ticked while not `Running`, `update` runs on every tick, and `terminate`
/// runs when a tick resolves to `Success`/`Failure` or when a running node is
/// invalidated by its parent.
pub trait Behaviour: 'static {
    /// Blackboard keys registered for this node's client when it joins a tree.
    fn blackboard_keys(&self) -> Vec<(String, Access)> {
        Vec::new()
    }

    /// One-time initialisation before the first tick. Must finish within
    /// `timeout`.
    fn setup(&mut self, _timeout: Duration) -> Result<(), BoxError> {
        Ok(())
    }

    fn initialise(&mut self, _ctx: &mut Context<'_>) {}

    /// Must not block.
    fn update(&mut self, ctx: &mut Context<'_>) -> Status;

    fn terminate(&mut self, _new_status: Status, _ctx: &mut Context<'_>) {}
}

/// What a node sees while it is being ticked: the tick number, its feedback
/// message and the blackboard through its own client.
pub struct Context<'a> {
    tick: u64,
    node: NodeId,
    client: ClientId,
    blackboard: &'a mut Blackboard,
    feedback: &'a mut String,
}

impl<'a> Context<'a> {
    pub fn new(
        tick: u64,
        node: NodeId,
        client: ClientId,
        blackboard: &'a mut Blackboard,
        feedback: &'a mut String,
    ) -> Self {
        Self {
            tick,
            node,
            client,
            blackboard,
            feedback,
        }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn client(&self) -> ClientId {
        self.client
    }

    pub fn feedback(&self) -> &str {
        self.feedback.as_str()
    }

    pub fn set_feedback(&mut self, message: impl Into<String>) {
        *self.feedback = message.into();
    }

    pub fn clear_feedback(&mut self) {
        self.feedback.clear();
    }

    pub fn blackboard(&self) -> &Blackboard {
        &*self.blackboard
    }

    pub fn has(&self, key: &str) -> bool {
        self.blackboard.has(key)
    }

    pub fn read(&self, key: &str) -> Result<&Value, BlackboardError> {
        self.blackboard.read(self.client, key)
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T, BlackboardError> {
        self.blackboard.get(self.client, key)
    }

    pub fn write<T: Serialize>(&mut self, key: &str, value: T) -> Result<(), BlackboardError> {
        self.blackboard.write(self.client, key, value)
    }

    pub fn write_value(&mut self, key: &str, value: Value) -> Result<(), BlackboardError> {
        self.blackboard.write_value(self.client, key, value)
    }
}
