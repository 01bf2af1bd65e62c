//! Interned string, instruction-pointer and trace-node tables.
//!
//! All three tables are append-only and addressed by 1-based indices.
//! Index 0 is the "none" sentinel and is never dereferenced.

use serde::{Deserialize, Serialize};

macro_rules! interned_index {
    ($(#[$attr:meta])* $name:ident) => {
        $(#[$attr])*
        #[derive(
            Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            pub const NONE: Self = Self(0);

            pub fn is_none(self) -> bool {
                self.0 == 0
            }

            /// Position in the backing vector, or None for the sentinel
            fn slot(self) -> Option<usize> {
                (self.0 as usize).checked_sub(1)
            }
        }

        impl From<u32> for $name {
            fn from(raw: u32) -> Self {
                Self(raw)
            }
        }
    };
}

interned_index!(
    /// Index into the string table
    StringIndex
);
interned_index!(
    /// Index into the instruction-pointer table
    IpIndex
);
interned_index!(
    /// Index into the trace-node table
    TraceIndex
);

/// A symbolized code address
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionPointer {
    pub address: u64,
    #[serde(default)]
    pub function: StringIndex,
    #[serde(default)]
    pub file: StringIndex,
    #[serde(default)]
    pub module: StringIndex,
    #[serde(default)]
    pub line: u32,
}

/// One frame of the call-stack trie
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceNode {
    pub ip: IpIndex,
    /// Calling frame; `TraceIndex::NONE` at the outermost frame
    #[serde(default)]
    pub parent: TraceIndex,
}

/// The decoder-owned interning tables
#[derive(Debug, Clone, Default)]
pub struct TraceTables {
    strings: Vec<String>,
    ips: Vec<InstructionPointer>,
    traces: Vec<TraceNode>,
}

impl TraceTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_string(&mut self, value: impl Into<String>) -> StringIndex {
        self.strings.push(value.into());
        StringIndex(self.strings.len() as u32)
    }

    pub fn push_ip(&mut self, ip: InstructionPointer) -> IpIndex {
        self.ips.push(ip);
        IpIndex(self.ips.len() as u32)
    }

    pub fn push_trace(&mut self, trace: TraceNode) -> TraceIndex {
        self.traces.push(trace);
        TraceIndex(self.traces.len() as u32)
    }

    /// Every interned string in index order (slot 0 holds index 1)
    pub fn strings(&self) -> &[String] {
        &self.strings
    }

    /// Interned string, or "" for the sentinel and out-of-range indices
    pub fn string(&self, index: StringIndex) -> &str {
        index
            .slot()
            .and_then(|slot| self.strings.get(slot))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn ip(&self, index: IpIndex) -> Option<&InstructionPointer> {
        index.slot().and_then(|slot| self.ips.get(slot))
    }

    pub fn trace(&self, index: TraceIndex) -> Option<&TraceNode> {
        index.slot().and_then(|slot| self.traces.get(slot))
    }

    pub fn string_count(&self) -> usize {
        self.strings.len()
    }

    pub fn ip_count(&self) -> usize {
        self.ips.len()
    }

    pub fn trace_count(&self) -> usize {
        self.traces.len()
    }
}
