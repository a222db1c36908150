use std::cell::{Ref, RefCell};
use std::rc::Rc;

use arbor_core::{NodeId, Status};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Lifecycle call the event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Phase {
    Initialise,
    Update,
    Terminate,
}

/// A small, copyable lifecycle event.
///
/// `status` is the status the node resolved to for `Update`, the status it is
/// terminating into for `Terminate`, and the status on entry for `Initialise`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TraceEvent {
    pub tick: u64,
    pub node: NodeId,
    pub phase: Phase,
    pub status: Status,
}

impl TraceEvent {
    pub fn new(tick: u64, node: NodeId, phase: Phase, status: Status) -> Self {
        Self {
            tick,
            node,
            phase,
            status,
        }
    }
}

pub trait TraceSink {
    fn emit(&mut self, event: TraceEvent);
}

#[derive(Debug, Default)]
pub struct NullTraceSink;

impl TraceSink for NullTraceSink {
    fn emit(&mut self, _event: TraceEvent) {}
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TraceLog {
    pub events: Vec<TraceEvent>,
}

impl TraceLog {
    pub fn push(&mut self, event: TraceEvent) {
        self.events.push(event);
    }

    pub fn for_node(&self, node: NodeId) -> impl Iterator<Item = &TraceEvent> {
        self.events.iter().filter(move |e| e.node == node)
    }

    pub fn count(&self, node: NodeId, phase: Phase) -> usize {
        self.for_node(node).filter(|e| e.phase == phase).count()
    }

    /// Statuses passed to `terminate` for `node`, in order.
    pub fn terminations(&self, node: NodeId) -> Vec<Status> {
        self.for_node(node)
            .filter(|e| e.phase == Phase::Terminate)
            .map(|e| e.status)
            .collect()
    }
}

impl TraceSink for TraceLog {
    fn emit(&mut self, event: TraceEvent) {
        self.push(event);
    }
}

/// Cloneable handle to a [`TraceLog`], so the log can still be inspected after
/// a tree has taken ownership of the sink.
#[derive(Debug, Default, Clone)]
pub struct SharedTraceLog(Rc<RefCell<TraceLog>>);

impl SharedTraceLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> Ref<'_, TraceLog> {
        self.0.borrow()
    }

    pub fn take(&self) -> TraceLog {
        std::mem::take(&mut *self.0.borrow_mut())
    }
}

impl TraceSink for SharedTraceLog {
    fn emit(&mut self, event: TraceEvent) {
        self.0.borrow_mut().push(event);
    }
}
