//! Alloc Trace Studio
//!
//! Aggregates symbol-resolved heap-allocation events into cost trees and
//! time-series charts for profiling analysis.
//!
//! This crate provides the core implementation for the
//! `alloc-trace` CLI tool.
//!
//! ## Getting Started
//!
//! ```ignore
//! use alloc_trace_studio::parser::Parser;
//! use alloc_trace_studio::trace::JsonLinesSource;
//! use alloc_trace_studio::utils::AggregationConfig;
//!
//! let source = JsonLinesSource::new(std::io::BufReader::new(file));
//! let result = Parser::spawn(source, AggregationConfig::default()).wait()?;
//! println!("{} bytes allocated", result.summary.total_allocated);
//! ```

pub mod aggregator;
pub mod commands;
pub mod flamegraph;
pub mod output;
pub mod parser;
pub mod trace;
pub mod utils;
