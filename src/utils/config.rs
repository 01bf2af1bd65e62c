//! Configuration and constants for aggregation runs.

/// Current report schema version
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Maximum number of ranked functions per chart row (the total is extra)
pub const MAX_CHART_ENTRIES: usize = 10;

/// Label of the reserved chart id 0
pub const TOTAL_LABEL: &str = "total";

/// Chart id reserved for the grand total
pub const TOTAL_LABEL_ID: u32 = 0;

/// Events consumed between two cancellation checks
pub const EVENTS_PER_CANCEL_CHECK: usize = 4096;

// Frames above these are runtime entry code; merging past them would join
// unrelated call sites.
pub const DEFAULT_STOP_FUNCTIONS: &[&str] = &[
    "main",
    "__libc_start_main",
    "__static_initialization_and_destruction_0",
];

/// Per-run aggregation settings
#[derive(Debug, Clone)]
pub struct AggregationConfig {
    /// Function names at which the bottom-up walk stops
    pub stop_functions: Vec<String>,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            stop_functions: DEFAULT_STOP_FUNCTIONS
                .iter()
                .map(|name| name.to_string())
                .collect(),
        }
    }
}

impl AggregationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stop-boundary function names
    pub fn with_stop_functions<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stop_functions = names.into_iter().map(Into::into).collect();
        self
    }

    /// Disable the stop boundary entirely: every path is walked to its root
    pub fn without_stop_functions(mut self) -> Self {
        self.stop_functions.clear();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_stop_functions() {
        let config = AggregationConfig::default();
        assert_eq!(config.stop_functions.len(), DEFAULT_STOP_FUNCTIONS.len());
        assert!(config.stop_functions.iter().any(|f| f == "main"));
    }

    #[test]
    fn test_builder_methods() {
        let config = AggregationConfig::new().with_stop_functions(["run", "start"]);
        assert_eq!(config.stop_functions, vec!["run", "start"]);
        assert!(config.without_stop_functions().stop_functions.is_empty());
    }
}
