//! Owned node descriptions, consumed when a tree is built.
//!
//! A [`Node`] owns its children by value, so the same child can never be
//! handed to two parents.

use arbor_core::{Access, Behaviour, Context, Status};

use crate::composite::ParallelPolicy;
use crate::decorator::Decorator;
use crate::ConfigError;

pub(crate) enum NodeKind {
    Leaf(Box<dyn Behaviour>),
    Sequence { memory: bool },
    Parallel(ParallelPolicy),
    Decorator(Decorator),
}

impl NodeKind {
    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            NodeKind::Leaf(_) => "Leaf",
            NodeKind::Sequence { .. } => "Sequence",
            NodeKind::Parallel(_) => "Parallel",
            NodeKind::Decorator(decorator) => decorator.type_name(),
        }
    }

    pub(crate) fn blackboard_keys(&self) -> Vec<(String, Access)> {
        match self {
            NodeKind::Leaf(behaviour) => behaviour.blackboard_keys(),
            NodeKind::Decorator(decorator) => decorator.blackboard_keys(),
            NodeKind::Sequence { .. } | NodeKind::Parallel(_) => Vec::new(),
        }
    }
}

pub struct Node {
    pub(crate) name: String,
    pub(crate) kind: NodeKind,
    pub(crate) children: Vec<Node>,
    pub(crate) access: Vec<(String, Access)>,
}

impl Node {
    fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            children: Vec::new(),
            access: Vec::new(),
        }
    }

    pub fn leaf(name: impl Into<String>, behaviour: impl Behaviour) -> Self {
        Self::new(name, NodeKind::Leaf(Box::new(behaviour)))
    }

    pub fn sequence(name: impl Into<String>, memory: bool) -> Self {
        Self::new(name, NodeKind::Sequence { memory })
    }

    pub fn parallel(name: impl Into<String>, policy: ParallelPolicy) -> Self {
        Self::new(name, NodeKind::Parallel(policy))
    }

    /// A decorator without its child. The child must be added before the node
    /// is built into a tree.
    pub fn decorator(name: impl Into<String>, decorator: Decorator) -> Self {
        Self::new(name, NodeKind::Decorator(decorator))
    }

    pub fn inverter(name: impl Into<String>, child: Node) -> Self {
        Self::decorator(name, Decorator::Inverter).with_child(child)
    }

    pub fn failure_is_success(name: impl Into<String>, child: Node) -> Self {
        Self::decorator(name, Decorator::FailureIsSuccess).with_child(child)
    }

    pub fn success_is_failure(name: impl Into<String>, child: Node) -> Self {
        Self::decorator(name, Decorator::SuccessIsFailure).with_child(child)
    }

    pub fn condition(name: impl Into<String>, target: Status, child: Node) -> Self {
        Self::decorator(name, Decorator::Condition { target }).with_child(child)
    }

    pub fn eternal_guard(
        name: impl Into<String>,
        condition: impl FnMut(&Context<'_>) -> bool + 'static,
        child: Node,
    ) -> Self {
        Self::decorator(name, Decorator::eternal_guard(condition)).with_child(child)
    }

    pub fn retry(name: impl Into<String>, num_failures: u32, child: Node) -> Self {
        Self::decorator(name, Decorator::Retry { num_failures }).with_child(child)
    }

    pub fn for_each(
        name: impl Into<String>,
        source_key: impl Into<String>,
        target_key: impl Into<String>,
        child: Node,
    ) -> Self {
        let decorator = Decorator::ForEach {
            source_key: source_key.into(),
            target_key: target_key.into(),
        };
        Self::decorator(name, decorator).with_child(child)
    }

    pub fn status_to_blackboard(
        name: impl Into<String>,
        variable_name: impl Into<String>,
        child: Node,
    ) -> Self {
        let decorator = Decorator::StatusToBlackboard {
            variable_name: variable_name.into(),
        };
        Self::decorator(name, decorator).with_child(child)
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = Node>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn add_child(&mut self, child: Node) {
        self.children.push(child);
    }

    /// Registers an extra blackboard key for this node's client, typically
    /// one an eternal-guard condition reads.
    pub fn with_access(mut self, key: impl Into<String>, access: Access) -> Self {
        self.access.push((key.into(), access));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        match &self.kind {
            NodeKind::Leaf(_) if !self.children.is_empty() => Err(ConfigError::LeafWithChildren {
                node: self.name.clone(),
                found: self.children.len(),
            }),
            NodeKind::Decorator(decorator) => {
                if self.children.len() != 1 {
                    return Err(ConfigError::DecoratorChildCount {
                        node: self.name.clone(),
                        found: self.children.len(),
                    });
                }
                decorator.validate(&self.name)
            }
            _ => Ok(()),
        }
    }

    /// Structural checks for the whole subtree, without building anything.
    pub(crate) fn validate_subtree(&self) -> Result<(), ConfigError> {
        self.validate()?;
        self.children.iter().try_for_each(Node::validate_subtree)
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("type", &self.kind.type_name())
            .field("children", &self.children)
            .finish()
    }
}
