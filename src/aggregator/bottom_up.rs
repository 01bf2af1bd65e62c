//! Bottom-up cost tree: allocation sites at the roots, callers below.
//!
//! Every allocation record walks its call path from the allocation site
//! outwards. Records sharing a prefix of that path share rows, so costs are
//! summed at each shared depth instead of duplicated.

use super::accumulator::{AllocationRecord, StopBoundary};
use super::location::LocationResolver;
use super::tree::{CostTree, CostTreeBuilder, RowId};
use crate::trace::{InstructionPointer, TraceTables};
use crate::utils::error::AggregationError;
use log::{debug, warn};

/// Merge all allocation records into one bottom-up forest
///
/// **Public** - main entry point for the bottom-up view
///
/// # Arguments
/// * `records` - One record per distinct call path
/// * `tables` - Interned tables the record traces point into
/// * `resolver` - Location cache, synced with `tables`
/// * `stop` - Frames at which a walk ends (the frame itself is included)
///
/// # Errors
/// * `AggregationError::InvariantViolation` - a trace's parent links form a
///   cycle, or the finished tree fails its consistency checks
pub fn merge_allocations(
    records: &[AllocationRecord],
    tables: &TraceTables,
    resolver: &mut LocationResolver,
    stop: &(impl StopBoundary + ?Sized),
) -> Result<CostTree, AggregationError> {
    debug!("Merging {} allocation records bottom-up", records.len());
    resolver.sync(tables.strings());

    let unknown = InstructionPointer::default();
    // no valid path visits a trace node twice
    let max_depth = tables.trace_count();
    let mut builder = CostTreeBuilder::new();

    for record in records {
        let cost = record.cost();
        let mut trace_index = record.trace;
        let mut parent: Option<RowId> = None;
        let mut depth = 0;

        while !trace_index.is_none() {
            let Some(trace) = tables.trace(trace_index) else {
                warn!("Record refers to unknown trace {}", trace_index.0);
                break;
            };
            depth += 1;
            if depth > max_depth {
                return Err(AggregationError::InvariantViolation(format!(
                    "trace {} has cyclic parent links",
                    record.trace.0
                )));
            }

            let ip = tables.ip(trace.ip).unwrap_or(&unknown);
            let row = builder.find_or_insert(parent, resolver.resolve(ip));
            builder.add_cost(row, cost);

            if stop.is_stop(ip.function) {
                break;
            }
            trace_index = trace.parent;
            parent = Some(row);
        }
    }

    // the shape is final only now; parents are linked in finish()
    builder.finish()
}
