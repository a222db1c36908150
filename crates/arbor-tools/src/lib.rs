//! Tooling primitives for observing arbor trees.
//!
//! This crate is intentionally small: it records what the engine did, and
//! leaves rendering to whoever consumes the events.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod trace;

pub use trace::{NullTraceSink, Phase, SharedTraceLog, TraceEvent, TraceLog, TraceSink};
