//! Final scalar totals of a run.
//!
//! Formatting (byte units, localisation) is left to the presentation layer;
//! the summary only carries raw numbers.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Command line of the traced program
    pub debuggee: String,

    /// Run duration in milliseconds
    pub total_time_ms: u64,

    /// Bytes allocated in total, ignoring deallocations
    pub total_allocated: u64,

    /// Calls to allocation functions
    pub total_allocations: u64,

    /// Peak heap consumption in bytes
    pub peak: u64,

    /// Bytes still allocated at the end of the run
    pub leaked: u64,
}

impl Summary {
    pub fn total_time_secs(&self) -> f64 {
        self.total_time_ms as f64 / 1000.0
    }

    /// Allocated bytes per second, 0 for an empty run
    pub fn allocated_per_second(&self) -> f64 {
        self.per_second(self.total_allocated)
    }

    /// Allocation calls per second, 0 for an empty run
    pub fn allocations_per_second(&self) -> f64 {
        self.per_second(self.total_allocations)
    }

    fn per_second(&self, value: u64) -> f64 {
        let secs = self.total_time_secs();
        if secs > 0.0 {
            value as f64 / secs
        } else {
            0.0
        }
    }
}
