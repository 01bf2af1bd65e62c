//! Decoder-facing data: interned tables, events and event sources.
//!
//! This module handles:
//! - The append-only string / instruction-pointer / trace tables
//! - The decoded event vocabulary
//! - Reading events from a JSON-lines stream or from memory

pub mod event;
pub mod source;
pub mod tables;

// Re-export main types
pub use event::TraceEvent;
pub use source::{EventSource, IterSource, JsonLinesSource};
pub use tables::{InstructionPointer, IpIndex, StringIndex, TraceIndex, TraceNode, TraceTables};
