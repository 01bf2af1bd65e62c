//! Aggregation of allocation traces into cost trees and charts.
//!
//! This module transforms the decoded event stream into:
//! - Accumulated allocation records and run totals
//! - A bottom-up cost tree (allocation sites first)
//! - A top-down cost tree (outermost callers first)
//! - Per-timestamp top-function charts
//! - The run summary

pub mod accumulator;
pub mod bottom_up;
pub mod chart;
pub mod location;
pub mod summary;
pub mod top_down;
pub mod tree;

// Re-export main types and functions
pub use accumulator::{AccumulatedTraceData, AllocationRecord, StopBoundary, StopIndices, Totals};
pub use bottom_up::merge_allocations;
pub use chart::{ChartAggregator, ChartData, ChartRow, ChartSeries, Metric};
pub use location::{Location, LocationResolver};
pub use summary::Summary;
pub use top_down::to_top_down;
pub use tree::{Cost, CostRow, CostTree, CostTreeBuilder, FlatRow, FlatTree, RowId};
