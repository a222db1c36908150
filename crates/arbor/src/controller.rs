use std::time::Duration;

use arbor_core::{Blackboard, NodeId, Status};
use arbor_tools::TraceSink;

use crate::tree::{Traversal, Tree};
use crate::{ConfigError, Node, SetupError};

pub type PreTickHandler = Box<dyn FnMut(&Tree)>;
pub type PostTickHandler = Box<dyn FnMut(&Tree, &Traversal)>;

/// Owns a tree together with its blackboard and drives it one tick at a time.
///
/// The root is never reset between ticks: a resolved root is re-initialised by
/// the next tick, a running one resumes.
pub struct BehaviourTree {
    tree: Tree,
    blackboard: Blackboard,
    pre_tick: Vec<PreTickHandler>,
    post_tick: Vec<PostTickHandler>,
}

impl BehaviourTree {
    pub fn new(root: Node) -> Result<Self, ConfigError> {
        Self::with_blackboard(root, Blackboard::new())
    }

    pub fn with_blackboard(root: Node, mut blackboard: Blackboard) -> Result<Self, ConfigError> {
        let tree = Tree::new(root, &mut blackboard)?;
        tracing::debug!(nodes = tree.iter().count(), "behaviour tree built");
        Ok(Self {
            tree,
            blackboard,
            pre_tick: Vec::new(),
            post_tick: Vec::new(),
        })
    }

    pub fn with_trace_sink(mut self, sink: impl TraceSink + 'static) -> Self {
        self.tree.set_trace_sink(sink);
        self
    }

    pub fn setup(&mut self, timeout: Duration) -> Result<(), SetupError> {
        self.tree.setup(timeout)?;
        tracing::info!(nodes = self.tree.iter().count(), ?timeout, "setup complete");
        Ok(())
    }

    pub fn tick(&mut self) -> Traversal {
        for handler in self.pre_tick.iter_mut() {
            handler(&self.tree);
        }
        let traversal = self.tree.tick(&mut self.blackboard);
        for handler in self.post_tick.iter_mut() {
            handler(&self.tree, &traversal);
        }
        traversal
    }

    pub fn tick_once(&mut self) -> Traversal {
        self.tick()
    }

    /// Ticks until the root resolves or `max_ticks` ticks have run, and
    /// returns the root's last status.
    pub fn tick_until_resolved(&mut self, max_ticks: u64) -> Status {
        for _ in 0..max_ticks {
            self.tick();
            if self.status().is_resolved() {
                break;
            }
        }
        self.status()
    }

    pub fn status(&self) -> Status {
        self.tree[self.tree.root()].status()
    }

    pub fn feedback_message(&self) -> &str {
        self.tree[self.tree.root()].feedback_message()
    }

    pub fn count(&self) -> u64 {
        self.tree.tick_count()
    }

    pub fn root(&self) -> NodeId {
        self.tree.root()
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn blackboard(&self) -> &Blackboard {
        &self.blackboard
    }

    pub fn blackboard_mut(&mut self) -> &mut Blackboard {
        &mut self.blackboard
    }

    pub fn into_parts(self) -> (Tree, Blackboard) {
        (self.tree, self.blackboard)
    }

    /// Stops whatever is running and leaves the whole tree `INVALID`.
    pub fn interrupt(&mut self) {
        let root = self.tree.root();
        self.tree.invalidate(root, &mut self.blackboard);
        tracing::info!(tick = self.count(), "tree interrupted");
    }

    pub fn insert_subtree(
        &mut self,
        parent: NodeId,
        index: usize,
        node: Node,
    ) -> Result<NodeId, ConfigError> {
        self.tree.insert(parent, index, node, &mut self.blackboard)
    }

    pub fn prune_subtree(&mut self, id: NodeId) -> Result<(), ConfigError> {
        self.tree.detach(id, &mut self.blackboard)
    }

    pub fn replace_subtree(&mut self, id: NodeId, node: Node) -> Result<NodeId, ConfigError> {
        self.tree.replace(id, node, &mut self.blackboard)
    }

    /// `handler` runs before every tick.
    pub fn add_pre_tick_handler(&mut self, handler: impl FnMut(&Tree) + 'static) {
        self.pre_tick.push(Box::new(handler));
    }

    /// `handler` runs after every tick with the nodes that tick visited.
    pub fn add_post_tick_handler(&mut self, handler: impl FnMut(&Tree, &Traversal) + 'static) {
        self.post_tick.push(Box::new(handler));
    }
}

impl std::fmt::Debug for BehaviourTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BehaviourTree")
            .field("tree", &self.tree)
            .field("blackboard", &self.blackboard)
            .finish_non_exhaustive()
    }
}
