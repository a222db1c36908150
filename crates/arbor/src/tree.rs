//! Arena of live nodes and the lifecycle protocol that drives them.
//!
//! Nodes are stored in a flat `Vec` and addressed by [`NodeId`]. Each entry
//! keeps its parent id for upward lookups; only the parent's `children` list
//! decides what is ticked.

use std::fmt;
use std::ops::Index;
use std::time::{Duration, Instant};

use arbor_core::{Access, Behaviour, Blackboard, ClientId, Context, NodeId, Status};
use arbor_tools::{NullTraceSink, Phase, TraceEvent, TraceSink};
use uuid::Uuid;

use crate::composite::{ParallelPolicy, SequenceState};
use crate::decorator::DecoratorState;
use crate::node::{Node, NodeKind};
use crate::{ConfigError, SetupError};

pub(crate) enum Kind {
    Leaf(Box<dyn Behaviour>),
    Sequence(SequenceState),
    Parallel(ParallelPolicy),
    Decorator(DecoratorState),
}

#[derive(Clone, Copy)]
enum Flavour {
    Leaf,
    Sequence,
    Parallel,
    Decorator,
}

impl Kind {
    fn flavour(&self) -> Flavour {
        match self {
            Kind::Leaf(_) => Flavour::Leaf,
            Kind::Sequence(_) => Flavour::Sequence,
            Kind::Parallel(_) => Flavour::Parallel,
            Kind::Decorator(_) => Flavour::Decorator,
        }
    }

    /// Clears per-activation state of composites and decorators.
    fn reset(&mut self) {
        match self {
            Kind::Sequence(state) => state.reset(),
            Kind::Decorator(state) => state.reset(),
            Kind::Leaf(_) | Kind::Parallel(_) => {}
        }
    }
}

impl From<NodeKind> for Kind {
    fn from(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Leaf(behaviour) => Kind::Leaf(behaviour),
            NodeKind::Sequence { memory } => Kind::Sequence(SequenceState::new(memory)),
            NodeKind::Parallel(policy) => Kind::Parallel(policy),
            NodeKind::Decorator(decorator) => Kind::Decorator(DecoratorState::new(decorator)),
        }
    }
}

pub struct NodeEntry {
    uid: Uuid,
    pub(crate) name: String,
    type_name: &'static str,
    pub(crate) status: Status,
    pub(crate) feedback: String,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) client: ClientId,
    pub(crate) kind: Kind,
}

impl NodeEntry {
    /// Unique for the lifetime of the process, unlike the arena index.
    pub fn uid(&self) -> Uuid {
        self.uid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn feedback_message(&self) -> &str {
        &self.feedback
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn client(&self) -> ClientId {
        self.client
    }
}

impl fmt::Debug for NodeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeEntry")
            .field("uid", &self.uid)
            .field("name", &self.name)
            .field("type", &self.type_name)
            .field("status", &self.status)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .finish_non_exhaustive()
    }
}

/// Nodes visited by one tick, in the order they were entered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Traversal {
    tick: u64,
    visited: Vec<NodeId>,
}

impl Traversal {
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn visited(&self) -> &[NodeId] {
        &self.visited
    }

    pub fn iter(&self) -> std::slice::Iter<'_, NodeId> {
        self.visited.iter()
    }

    pub fn len(&self) -> usize {
        self.visited.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visited.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.visited.contains(&id)
    }
}

impl IntoIterator for Traversal {
    type Item = NodeId;
    type IntoIter = std::vec::IntoIter<NodeId>;

    fn into_iter(self) -> Self::IntoIter {
        self.visited.into_iter()
    }
}

impl<'a> IntoIterator for &'a Traversal {
    type Item = &'a NodeId;
    type IntoIter = std::slice::Iter<'a, NodeId>;

    fn into_iter(self) -> Self::IntoIter {
        self.visited.iter()
    }
}

pub(crate) struct Scope<'a> {
    pub(crate) blackboard: &'a mut Blackboard,
    pub(crate) visited: Vec<NodeId>,
}

struct Slot {
    generation: u32,
    entry: Option<NodeEntry>,
}

/// Key registrations taken from a subtree's clients while it is swapped out.
type HeldKeys = Vec<(ClientId, Vec<(String, Access)>)>;

pub struct Tree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
    tick: u64,
    /// Budget of the last successful setup pass, applied to grafted subtrees.
    setup_timeout: Option<Duration>,
    trace: Box<dyn TraceSink>,
}

impl Tree {
    /// Builds the arena from `root`, registering one blackboard client per
    /// node. On error nothing stays registered.
    pub fn new(root: Node, blackboard: &mut Blackboard) -> Result<Self, ConfigError> {
        let mut tree = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: NodeId::new(0),
            tick: 0,
            setup_timeout: None,
            trace: Box::new(NullTraceSink),
        };
        tree.root = tree.graft(root, None, blackboard)?;
        Ok(tree)
    }

    pub fn set_trace_sink(&mut self, sink: impl TraceSink + 'static) {
        self.trace = Box::new(sink);
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of completed ticks.
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Number of arena slots, free ones included.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Returns the entry for `id`, or `None` once its subtree was removed.
    pub fn get(&self, id: NodeId) -> Option<&NodeEntry> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.entry.as_ref())
    }

    pub fn status(&self, id: NodeId) -> Option<Status> {
        self.get(id).map(NodeEntry::status)
    }

    /// Attached nodes in pre-order.
    pub fn iter(&self) -> PreOrder<'_> {
        self.descendants(self.root)
    }

    /// `id` and everything below it, in pre-order.
    pub fn descendants(&self, id: NodeId) -> PreOrder<'_> {
        let stack = match self.get(id) {
            Some(_) => vec![id],
            None => Vec::new(),
        };
        PreOrder { tree: self, stack }
    }

    /// First attached node with this name, in pre-order.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.iter().find(|id| self[*id].name == name)
    }

    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            let Some(entry) = self.get(current) else {
                return false;
            };
            match entry.parent {
                Some(parent) => current = parent,
                None => return current == self.root,
            }
        }
    }

    pub fn names(&self, traversal: &Traversal) -> Vec<&str> {
        traversal
            .iter()
            .filter_map(|id| self.get(*id))
            .map(NodeEntry::name)
            .collect()
    }

    /// Calls `setup` on every attached node in pre-order. The first failure
    /// or overrun stops the pass.
    ///
    /// Once this succeeds, subtrees added by [`Tree::insert`] or
    /// [`Tree::replace`] are set up with the same budget before they join.
    pub fn setup(&mut self, timeout: Duration) -> Result<(), SetupError> {
        self.setup_subtree(self.root, timeout)?;
        self.setup_timeout = Some(timeout);
        Ok(())
    }

    fn setup_subtree(&mut self, id: NodeId, timeout: Duration) -> Result<(), SetupError> {
        let order: Vec<NodeId> = self.descendants(id).collect();
        for id in order {
            let entry = self.entry_mut(id);
            let started = Instant::now();
            if let Kind::Leaf(behaviour) = &mut entry.kind {
                behaviour
                    .setup(timeout)
                    .map_err(|source| SetupError::Failed {
                        id,
                        node: entry.name.clone(),
                        source,
                    })?;
            }
            let elapsed = started.elapsed();
            if elapsed > timeout {
                return Err(SetupError::Timeout {
                    id,
                    node: entry.name.clone(),
                    elapsed,
                    timeout,
                });
            }
            tracing::debug!(node = %entry.name, %id, ?elapsed, "setup");
        }
        Ok(())
    }

    /// Ticks the root once and returns the nodes visited.
    pub fn tick(&mut self, blackboard: &mut Blackboard) -> Traversal {
        self.tick += 1;
        let mut scope = Scope {
            blackboard,
            visited: Vec::with_capacity(self.node_count()),
        };
        let root = self.root;
        let status = self.tick_node(root, &mut scope);
        tracing::debug!(tick = self.tick, %status, visited = scope.visited.len(), "tick");
        Traversal {
            tick: self.tick,
            visited: scope.visited,
        }
    }

    pub(crate) fn tick_node(&mut self, id: NodeId, scope: &mut Scope<'_>) -> Status {
        scope.visited.push(id);
        if self[id].status != Status::Running {
            self.initialise(id, scope.blackboard);
        }

        let status = match self[id].kind.flavour() {
            Flavour::Leaf => self.update_leaf(id, scope.blackboard),
            Flavour::Sequence => self.tick_sequence(id, scope),
            Flavour::Parallel => self.tick_parallel(id, scope),
            Flavour::Decorator => self.tick_decorator(id, scope),
        };
        self.emit(id, Phase::Update, status);

        if status.is_resolved() {
            self.invalidate_running_children(id, scope.blackboard);
            self.terminate(id, status, scope.blackboard);
        }
        self.entry_mut(id).status = status;
        status
    }

    /// Returns `id` and its subtree to `INVALID`, children first. Only a node
    /// that was `RUNNING` sees `terminate(INVALID)`.
    pub fn invalidate(&mut self, id: NodeId, blackboard: &mut Blackboard) {
        if self.get(id).is_none() {
            return;
        }
        self.invalidate_children_from(id, 0, blackboard);
        if self[id].status == Status::Running {
            self.terminate(id, Status::Invalid, blackboard);
        }
        self.entry_mut(id).status = Status::Invalid;
    }

    pub(crate) fn invalidate_children_from(
        &mut self,
        id: NodeId,
        start: usize,
        blackboard: &mut Blackboard,
    ) {
        for index in start..self[id].children.len() {
            let child = self[id].children[index];
            if self[child].status != Status::Invalid {
                self.invalidate(child, blackboard);
            }
        }
    }

    fn invalidate_running_children(&mut self, id: NodeId, blackboard: &mut Blackboard) {
        for index in 0..self[id].children.len() {
            let child = self[id].children[index];
            if self[child].status == Status::Running {
                self.invalidate(child, blackboard);
            }
        }
    }

    fn initialise(&mut self, id: NodeId, blackboard: &mut Blackboard) {
        let tick = self.tick;
        let entry = self.entry_mut(id);
        let from = entry.status;
        tracing::debug!(node = %entry.name, %id, %from, "initialise");
        match &mut entry.kind {
            Kind::Leaf(behaviour) => {
                let mut ctx = Context::new(tick, id, entry.client, blackboard, &mut entry.feedback);
                behaviour.initialise(&mut ctx);
            }
            other => other.reset(),
        }
        self.emit(id, Phase::Initialise, from);
    }

    fn update_leaf(&mut self, id: NodeId, blackboard: &mut Blackboard) -> Status {
        let tick = self.tick;
        let entry = self.entry_mut(id);
        let Kind::Leaf(behaviour) = &mut entry.kind else {
            return Status::Failure;
        };
        let mut ctx = Context::new(tick, id, entry.client, blackboard, &mut entry.feedback);
        let status = behaviour.update(&mut ctx);
        tracing::trace!(node = %entry.name, %id, %status, "update");
        match status {
            Status::Invalid => {
                tracing::warn!(node = %entry.name, %id, "update returned INVALID, treating it as FAILURE");
                Status::Failure
            }
            status => status,
        }
    }

    fn terminate(&mut self, id: NodeId, new_status: Status, blackboard: &mut Blackboard) {
        let tick = self.tick;
        let entry = self.entry_mut(id);
        tracing::debug!(node = %entry.name, %id, from = %entry.status, to = %new_status, "terminate");
        match &mut entry.kind {
            Kind::Leaf(behaviour) => {
                let mut ctx = Context::new(tick, id, entry.client, blackboard, &mut entry.feedback);
                behaviour.terminate(new_status, &mut ctx);
            }
            other => other.reset(),
        }
        self.emit(id, Phase::Terminate, new_status);
    }

    fn emit(&mut self, id: NodeId, phase: Phase, status: Status) {
        self.trace.emit(TraceEvent::new(self.tick, id, phase, status));
    }

    pub(crate) fn set_feedback(&mut self, id: NodeId, message: impl Into<String>) {
        self.entry_mut(id).feedback = message.into();
    }

    pub(crate) fn entry_mut(&mut self, id: NodeId) -> &mut NodeEntry {
        match self
            .slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.entry.as_mut())
        {
            Some(entry) => entry,
            None => panic!("node {id} is not in the arena"),
        }
    }

    /// Appends `node` as the last child of `parent`.
    pub fn attach(
        &mut self,
        parent: NodeId,
        node: Node,
        blackboard: &mut Blackboard,
    ) -> Result<NodeId, ConfigError> {
        let index = self.attached(parent)?.children.len();
        self.insert(parent, index, node, blackboard)
    }

    /// Inserts `node` at `index` among `parent`'s children. An index past the
    /// end appends.
    pub fn insert(
        &mut self,
        parent: NodeId,
        index: usize,
        node: Node,
        blackboard: &mut Blackboard,
    ) -> Result<NodeId, ConfigError> {
        let entry = self.attached(parent)?;
        match entry.kind {
            Kind::Leaf(_) => {
                return Err(ConfigError::LeafWithChildren {
                    node: entry.name.clone(),
                    found: entry.children.len() + 1,
                })
            }
            Kind::Decorator(_) => {
                return Err(ConfigError::DecoratorChildCount {
                    node: entry.name.clone(),
                    found: entry.children.len() + 1,
                })
            }
            Kind::Sequence(_) | Kind::Parallel(_) => {}
        }
        let index = index.min(entry.children.len());

        let child = self.graft_ready(node, parent, blackboard)?;
        let entry = self.entry_mut(parent);
        entry.children.insert(index, child);
        if let Kind::Sequence(state) = &mut entry.kind {
            state.child_inserted(index);
        }
        tracing::debug!(parent = %entry.name, %child, index, "subtree inserted");
        Ok(child)
    }

    /// Invalidates `id`'s subtree, unregisters its blackboard clients, unlinks
    /// it from its parent and frees its slots. `id` is stale afterwards.
    pub fn detach(&mut self, id: NodeId, blackboard: &mut Blackboard) -> Result<(), ConfigError> {
        let parent = self.attached(id)?.parent.ok_or(ConfigError::RootDetach)?;
        let parent_entry = &self[parent];
        if let Kind::Decorator(_) = parent_entry.kind {
            return Err(ConfigError::DecoratorChildCount {
                node: parent_entry.name.clone(),
                found: 0,
            });
        }

        self.invalidate(id, blackboard);
        self.discard(id, blackboard);
        let entry = self.entry_mut(parent);
        if let Some(position) = entry.children.iter().position(|child| *child == id) {
            entry.children.remove(position);
            if let Kind::Sequence(state) = &mut entry.kind {
                state.child_removed(position);
            }
        }
        tracing::debug!(parent = %entry.name, %id, "subtree detached");
        Ok(())
    }

    /// Puts `node` in `id`'s slot.
    ///
    /// The old subtree is invalidated and gives up its blackboard keys before
    /// the replacement registers, so the replacement may claim the same
    /// exclusive keys. If the replacement cannot be built the old subtree
    /// keeps its place and gets its keys back.
    pub fn replace(
        &mut self,
        id: NodeId,
        node: Node,
        blackboard: &mut Blackboard,
    ) -> Result<NodeId, ConfigError> {
        let parent = self.attached(id)?.parent.ok_or(ConfigError::RootDetach)?;
        node.validate_subtree()?;

        self.invalidate(id, blackboard);
        let held = self.release_keys(id, blackboard);
        let replacement = match self.graft_ready(node, parent, blackboard) {
            Ok(replacement) => replacement,
            Err(error) => {
                restore_keys(held, blackboard);
                return Err(error);
            }
        };

        self.discard(id, blackboard);
        let entry = self.entry_mut(parent);
        if let Some(slot) = entry.children.iter_mut().find(|child| **child == id) {
            *slot = replacement;
        }
        tracing::debug!(parent = %entry.name, old = %id, new = %replacement, "subtree replaced");
        Ok(replacement)
    }

    fn attached(&self, id: NodeId) -> Result<&NodeEntry, ConfigError> {
        if !self.is_attached(id) {
            return Err(ConfigError::UnknownNode(id));
        }
        Ok(&self[id])
    }

    fn release_keys(&self, id: NodeId, blackboard: &mut Blackboard) -> HeldKeys {
        self.descendants(id)
            .filter_map(|node| {
                let client = self[node].client;
                blackboard.release_keys(client).ok().map(|keys| (client, keys))
            })
            .collect()
    }

    /// Unregisters the clients of `id`'s subtree and frees its slots.
    fn discard(&mut self, id: NodeId, blackboard: &mut Blackboard) {
        let subtree: Vec<NodeId> = self.descendants(id).collect();
        for node in subtree {
            if let Some(entry) = self.release(node) {
                if let Err(error) = blackboard.unregister_client(entry.client) {
                    tracing::warn!(node = %entry.name, %error, "failed to release blackboard client");
                }
            }
        }
    }

    /// Grafts `node` under `parent` and, when the tree has been set up, sets
    /// the new subtree up too. Nothing is left behind on failure.
    fn graft_ready(
        &mut self,
        node: Node,
        parent: NodeId,
        blackboard: &mut Blackboard,
    ) -> Result<NodeId, ConfigError> {
        let child = self.graft(node, Some(parent), blackboard)?;
        if let Some(timeout) = self.setup_timeout {
            if let Err(error) = self.setup_subtree(child, timeout) {
                self.discard(child, blackboard);
                return Err(error.into());
            }
        }
        Ok(child)
    }

    /// Adds `node` and its subtree to the arena. A failure frees whatever was
    /// built and unregisters its clients.
    fn graft(
        &mut self,
        node: Node,
        parent: Option<NodeId>,
        blackboard: &mut Blackboard,
    ) -> Result<NodeId, ConfigError> {
        let mut built = Vec::new();
        let mut clients = Vec::new();
        let result = self.build(node, parent, blackboard, &mut built, &mut clients);
        if result.is_err() {
            for id in built {
                self.release(id);
            }
            for client in clients {
                let _ = blackboard.unregister_client(client);
            }
        }
        result
    }

    fn build(
        &mut self,
        node: Node,
        parent: Option<NodeId>,
        blackboard: &mut Blackboard,
        built: &mut Vec<NodeId>,
        clients: &mut Vec<ClientId>,
    ) -> Result<NodeId, ConfigError> {
        node.validate()?;
        let Node {
            name,
            kind,
            children,
            access,
        } = node;

        let client = blackboard.register_client(name.clone());
        clients.push(client);
        for (key, mode) in access.into_iter().chain(kind.blackboard_keys()) {
            blackboard
                .register_key(client, key, mode)
                .map_err(|source| ConfigError::Blackboard {
                    node: name.clone(),
                    source,
                })?;
        }

        let id = self.alloc(NodeEntry {
            uid: Uuid::new_v4(),
            type_name: kind.type_name(),
            name,
            status: Status::Invalid,
            feedback: String::new(),
            parent,
            children: Vec::with_capacity(children.len()),
            client,
            kind: Kind::from(kind),
        });
        built.push(id);

        for child in children {
            let child_id = self.build(child, Some(id), blackboard, built, clients)?;
            self.entry_mut(id).children.push(child_id);
        }
        Ok(id)
    }

    fn alloc(&mut self, entry: NodeEntry) -> NodeId {
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.entry = Some(entry);
                NodeId::with_generation(index, slot.generation)
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    entry: Some(entry),
                });
                NodeId::new(index)
            }
        }
    }

    /// Empties `id`'s slot and bumps its generation so `id` goes stale.
    fn release(&mut self, id: NodeId) -> Option<NodeEntry> {
        let slot = self
            .slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation())?;
        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index() as u32);
        Some(entry)
    }
}

fn restore_keys(held: HeldKeys, blackboard: &mut Blackboard) {
    for (client, keys) in held {
        for (key, access) in keys {
            if let Err(error) = blackboard.register_key(client, key, access) {
                tracing::warn!(%client, %error, "failed to restore blackboard key");
            }
        }
    }
}

impl Index<NodeId> for Tree {
    type Output = NodeEntry;

    fn index(&self, id: NodeId) -> &NodeEntry {
        match self.get(id) {
            Some(entry) => entry,
            None => panic!("node {id} is not in the arena"),
        }
    }
}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nodes: Vec<&NodeEntry> = self.slots.iter().filter_map(|slot| slot.entry.as_ref()).collect();
        f.debug_struct("Tree")
            .field("root", &self.root)
            .field("tick", &self.tick)
            .field("nodes", &nodes)
            .finish_non_exhaustive()
    }
}

pub struct PreOrder<'a> {
    tree: &'a Tree,
    stack: Vec<NodeId>,
}

impl Iterator for PreOrder<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.tree[id].children.iter().rev().copied());
        Some(id)
    }
}
