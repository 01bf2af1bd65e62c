//! Decoded trace events, as delivered by the trace decoder.

use super::tables::{IpIndex, StringIndex, TraceIndex};
use serde::{Deserialize, Serialize};

/// One event of the decoded allocation trace
///
/// Events arrive in the order they were recorded. Interning events
/// (`String`, `Ip`, `Trace`) always precede the events that reference them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceEvent {
    /// Interns the next string
    String { value: String },

    /// Interns the next instruction pointer
    Ip {
        address: u64,
        #[serde(default)]
        function: StringIndex,
        #[serde(default)]
        file: StringIndex,
        #[serde(default)]
        module: StringIndex,
        #[serde(default)]
        line: u32,
    },

    /// Interns the next trace node
    Trace {
        ip: IpIndex,
        #[serde(default)]
        parent: TraceIndex,
    },

    /// `size` bytes were allocated from the call path `trace`
    #[serde(alias = "allocation")]
    Alloc { trace: TraceIndex, size: u64 },

    /// `size` bytes allocated from `trace` were released again
    #[serde(alias = "deallocation")]
    Free { trace: TraceIndex, size: u64 },

    /// Time boundary, in milliseconds since the debuggee started
    #[serde(alias = "time_stamp")]
    Timestamp { stamp: u64 },

    /// Command line of the traced program
    Debuggee { command: String },
}
