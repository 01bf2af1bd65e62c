//! Output writers for aggregation results.
//!
//! This module handles writing data to disk in various formats:
//! - JSON reports
//! - Folded stacks for flame-graph tools

pub mod folded;
pub mod json;

// Re-export main functions
pub use folded::write_collapsed;
pub use json::{read_report, write_report};
