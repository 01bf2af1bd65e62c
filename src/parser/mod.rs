//! The aggregation run and its report schema.
//!
//! This module handles:
//! - Driving one run over an event source (inline or on a worker thread)
//! - Delivering results in their fixed order
//! - Defining the report schema

pub mod job;
pub mod schema;

// Re-export main types
pub use job::{
    aggregate, aggregate_with, collect_messages, AggregationResult, CancellationFlag, Parser,
    ParserHandle, ParserMessage,
};
pub use schema::{to_report, Report, ReportCharts};
