//! Report JSON schema definitions.
//!
//! This module defines the structure of JSON files we write to disk.
//! Schema is versioned to allow future evolution.

use super::job::AggregationResult;
use crate::aggregator::{ChartData, FlatTree, Summary};
use crate::utils::config::SCHEMA_VERSION;
use serde::{Deserialize, Serialize};

/// Top-level report structure written to JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Schema version for compatibility checking
    pub version: String,

    /// Final totals of the run
    pub summary: Summary,

    /// Allocation sites first, callers below
    pub bottom_up: FlatTree,

    /// Outermost callers first, allocation sites below
    pub top_down: FlatTree,

    /// Time series of the top functions, one per metric
    pub charts: ReportCharts,

    /// Timestamp when the report was generated
    pub generated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportCharts {
    pub consumed: ChartData,
    pub allocations: ChartData,
    pub allocated: ChartData,
}

/// Convert a finished run into the report format
///
/// **Public** - used by commands to create final output
pub fn to_report(result: &AggregationResult) -> Report {
    use chrono::Utc;

    Report {
        version: SCHEMA_VERSION.to_string(),
        summary: result.summary.clone(),
        bottom_up: result.bottom_up.to_flat(),
        top_down: result.top_down.to_flat(),
        charts: ReportCharts {
            consumed: result.consumed.clone(),
            allocations: result.allocations.clone(),
            allocated: result.allocated.clone(),
        },
        generated_at: Utc::now().to_rfc3339(),
    }
}
