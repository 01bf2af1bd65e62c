//! Display locations for instruction pointers.
//!
//! The resolver is a cache owned by one aggregation run. It mirrors the
//! string table (so lookups never touch the decoder's storage) and memoizes
//! the hexadecimal labels of unsymbolized addresses, which recur across many
//! allocation records.

use crate::trace::{InstructionPointer, StringIndex};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Human-readable form of an instruction pointer
///
/// The derived ordering (function, file, module, line) is the sibling order
/// of every cost tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Location {
    pub function: String,
    pub file: String,
    pub module: String,
    pub line: u32,
}

/// Memoizing `InstructionPointer` -> `Location` resolver
#[derive(Debug, Default)]
pub struct LocationResolver {
    strings: Vec<String>,
    unresolved: HashMap<u64, String>,
}

impl LocationResolver {
    pub fn new() -> Self {
        Self {
            strings: Vec::new(),
            unresolved: HashMap::with_capacity(16384),
        }
    }

    /// Pick up strings interned since the previous sync
    ///
    /// `strings` is the full, append-only table; calling this again without
    /// growth is a no-op.
    pub fn sync(&mut self, strings: &[String]) {
        if strings.len() <= self.strings.len() {
            return;
        }
        debug!(
            "Syncing {} new strings into location cache",
            strings.len() - self.strings.len()
        );
        self.strings
            .extend(strings[self.strings.len()..].iter().cloned());
    }

    /// Number of strings mirrored so far
    pub fn synced_len(&self) -> usize {
        self.strings.len()
    }

    pub fn resolve(&mut self, ip: &InstructionPointer) -> Location {
        Location {
            function: self.function(ip),
            file: self.file(ip),
            module: self.stringify(ip.module),
            line: ip.line,
        }
    }

    /// Function name, or a stable `0x...` label for unsymbolized addresses
    pub fn function(&mut self, ip: &InstructionPointer) -> String {
        if !ip.function.is_none() {
            return self.stringify(ip.function);
        }
        self.unresolved
            .entry(ip.address)
            .or_insert_with(|| format!("0x{:x}", ip.address))
            .clone()
    }

    pub fn file(&self, ip: &InstructionPointer) -> String {
        if ip.file.is_none() {
            String::new()
        } else {
            self.stringify(ip.file)
        }
    }

    pub fn stringify(&self, index: StringIndex) -> String {
        if index.is_none() {
            return String::new();
        }
        self.strings
            .get(index.0 as usize - 1)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of memoized address labels
    pub fn unresolved_count(&self) -> usize {
        self.unresolved.len()
    }
}
