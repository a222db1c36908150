use std::fmt;

use serde::{Deserialize, Serialize};

/// Handle of a node inside a tree arena.
///
/// Handles are only meaningful for the tree that issued them. Arena slots are
/// reused once a subtree is removed, and the generation tells a stale handle
/// apart from the slot's new occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    pub const fn new(index: u32) -> Self {
        Self::with_generation(index, 0)
    }

    pub const fn with_generation(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(self) -> usize {
        self.index as usize
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.generation {
            0 => write!(f, "#{}", self.index),
            generation => write!(f, "#{}.{generation}", self.index),
        }
    }
}
