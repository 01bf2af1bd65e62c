//! Accumulation of the decoded event stream.
//!
//! `AccumulatedTraceData` owns everything one run builds while events
//! arrive: the interned tables, one `AllocationRecord` per call path, the
//! global totals and the time-series charts.

use super::chart::{ChartAggregator, ChartTotals};
use super::location::LocationResolver;
use super::summary::Summary;
use super::tree::Cost;
use crate::trace::{EventSource, InstructionPointer, StringIndex, TraceEvent, TraceIndex, TraceNode, TraceTables};
use crate::utils::config::AggregationConfig;
use crate::utils::error::DecodeError;
use log::{debug, warn};
use std::collections::HashMap;

/// Costs of one distinct call path
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocationRecord {
    pub trace: TraceIndex,
    pub allocations: u64,
    pub allocated: u64,
    /// Bytes currently outstanding; what remains at the end leaked
    pub leaked: u64,
    /// Highest `leaked` seen for this path
    pub peak: u64,
}

impl AllocationRecord {
    pub fn new(trace: TraceIndex) -> Self {
        Self {
            trace,
            ..Default::default()
        }
    }

    pub fn cost(&self) -> Cost {
        Cost {
            allocations: self.allocations,
            peak: self.peak,
            leaked: self.leaked,
            allocated: self.allocated,
        }
    }
}

/// Frames at which the bottom-up walk stops
pub trait StopBoundary {
    fn is_stop(&self, function: StringIndex) -> bool;
}

impl<F> StopBoundary for F
where
    F: Fn(StringIndex) -> bool,
{
    fn is_stop(&self, function: StringIndex) -> bool {
        self(function)
    }
}

/// String indices of the configured stop function names
///
/// Indices are collected as the matching strings get interned.
#[derive(Debug, Clone, Default)]
pub struct StopIndices {
    names: Vec<String>,
    indices: Vec<StringIndex>,
}

impl StopIndices {
    pub fn new(names: &[String]) -> Self {
        Self {
            names: names.to_vec(),
            indices: Vec::new(),
        }
    }

    /// Note a freshly interned string
    pub fn observe(&mut self, index: StringIndex, value: &str) {
        if self.names.iter().any(|name| name == value) {
            debug!("Stop boundary '{}' interned as string {}", value, index.0);
            self.indices.push(index);
        }
    }
}

impl StopBoundary for StopIndices {
    fn is_stop(&self, function: StringIndex) -> bool {
        !function.is_none() && self.indices.contains(&function)
    }
}

/// Global counters of the run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    pub total_allocated: u64,
    pub total_allocations: u64,
    pub peak: u64,
    pub leaked: u64,
    pub total_time: u64,
}

/// Accumulated state of one aggregation run
#[derive(Debug)]
pub struct AccumulatedTraceData {
    tables: TraceTables,
    records: Vec<AllocationRecord>,
    record_slots: HashMap<TraceIndex, usize>,
    totals: Totals,
    debuggee: String,
    last_time_stamp: u64,
    max_consumed_since_last_time_stamp: u64,
    resolver: LocationResolver,
    charts: ChartAggregator,
    stop: StopIndices,
    finished: bool,
}

impl AccumulatedTraceData {
    pub fn new(config: &AggregationConfig) -> Self {
        Self {
            tables: TraceTables::new(),
            records: Vec::new(),
            record_slots: HashMap::new(),
            totals: Totals::default(),
            debuggee: String::new(),
            last_time_stamp: 0,
            max_consumed_since_last_time_stamp: 0,
            resolver: LocationResolver::new(),
            charts: ChartAggregator::new(),
            stop: StopIndices::new(&config.stop_functions),
            finished: false,
        }
    }

    /// Consume `source` to its end and process the final boundary
    pub fn read(&mut self, source: &mut impl EventSource) -> Result<(), DecodeError> {
        while let Some(event) = source.next_event()? {
            self.handle_event(event);
        }
        self.finish();
        Ok(())
    }

    pub fn handle_event(&mut self, event: TraceEvent) {
        match event {
            TraceEvent::String { value } => {
                let index = self.tables.push_string(value);
                self.stop.observe(index, self.tables.string(index));
            }
            TraceEvent::Ip {
                address,
                function,
                file,
                module,
                line,
            } => {
                self.tables.push_ip(InstructionPointer {
                    address,
                    function,
                    file,
                    module,
                    line,
                });
            }
            TraceEvent::Trace { ip, parent } => {
                self.tables.push_trace(TraceNode { ip, parent });
            }
            TraceEvent::Alloc { trace, size } => self.handle_allocation(trace, size),
            TraceEvent::Free { trace, size } => self.handle_deallocation(trace, size),
            TraceEvent::Timestamp { stamp } => {
                if stamp <= self.last_time_stamp {
                    warn!(
                        "Ignoring non-increasing timestamp {} (last was {})",
                        stamp, self.last_time_stamp
                    );
                    return;
                }
                self.handle_time_stamp(stamp, false);
            }
            TraceEvent::Debuggee { command } => self.debuggee = command,
        }
    }

    fn handle_allocation(&mut self, trace: TraceIndex, size: u64) {
        let slot = match self.record_slots.get(&trace) {
            Some(&slot) => slot,
            None => {
                self.records.push(AllocationRecord::new(trace));
                self.record_slots.insert(trace, self.records.len() - 1);
                self.records.len() - 1
            }
        };
        let record = &mut self.records[slot];
        record.allocations = record.allocations.saturating_add(1);
        record.allocated = record.allocated.saturating_add(size);
        record.leaked = record.leaked.saturating_add(size);
        record.peak = record.peak.max(record.leaked);

        self.totals.total_allocations = self.totals.total_allocations.saturating_add(1);
        self.totals.total_allocated = self.totals.total_allocated.saturating_add(size);
        self.totals.leaked = self.totals.leaked.saturating_add(size);
        self.totals.peak = self.totals.peak.max(self.totals.leaked);
        self.max_consumed_since_last_time_stamp = self
            .max_consumed_since_last_time_stamp
            .max(self.totals.leaked);
    }

    fn handle_deallocation(&mut self, trace: TraceIndex, size: u64) {
        let Some(&slot) = self.record_slots.get(&trace) else {
            warn!("Ignoring free of {} bytes from unknown trace {}", size, trace.0);
            return;
        };
        let record = &mut self.records[slot];
        if size > record.leaked {
            warn!(
                "Free of {} bytes exceeds the {} bytes outstanding for trace {}",
                size, record.leaked, trace.0
            );
        }
        let released = size.min(record.leaked);
        record.leaked -= released;
        self.totals.leaked = self.totals.leaked.saturating_sub(released);
    }

    fn handle_time_stamp(&mut self, stamp: u64, is_final: bool) {
        self.resolver.sync(self.tables.strings());
        self.max_consumed_since_last_time_stamp = self
            .max_consumed_since_last_time_stamp
            .max(self.totals.leaked);

        let totals = ChartTotals {
            consumed: self.max_consumed_since_last_time_stamp,
            allocated: self.totals.total_allocated,
            allocations: self.totals.total_allocations,
        };
        self.charts.handle_time_stamp(
            stamp,
            is_final,
            &self.records,
            &self.tables,
            &mut self.resolver,
            totals,
        );

        self.last_time_stamp = stamp;
        self.max_consumed_since_last_time_stamp = 0;
    }

    /// Close the stream: the run lasted one tick past the last timestamp
    ///
    /// Fires the final boundary, which freezes the chart labels. When the
    /// last timestamp is already `u64::MAX` there is no later tick, so the
    /// labels are frozen on the rows recorded so far.
    pub fn finish(&mut self) {
        if self.finished {
            return;
        }
        match self.last_time_stamp.checked_add(1) {
            Some(end) => {
                self.totals.total_time = end;
                self.handle_time_stamp(end, true);
            }
            None => {
                warn!("Last timestamp is u64::MAX, freezing charts without a final row");
                self.totals.total_time = self.last_time_stamp;
                self.charts.freeze();
            }
        }
        self.finished = true;
        debug!(
            "Accumulated {} allocation records over {} ms",
            self.records.len(),
            self.totals.total_time
        );
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn summary(&self) -> Summary {
        Summary {
            debuggee: self.debuggee.clone(),
            total_time_ms: self.totals.total_time,
            total_allocated: self.totals.total_allocated,
            total_allocations: self.totals.total_allocations,
            peak: self.totals.peak,
            leaked: self.totals.leaked,
        }
    }

    pub fn totals(&self) -> Totals {
        self.totals
    }

    pub fn records(&self) -> &[AllocationRecord] {
        &self.records
    }

    pub fn tables(&self) -> &TraceTables {
        &self.tables
    }

    pub fn charts(&self) -> &ChartAggregator {
        &self.charts
    }

    pub fn stop_indices(&self) -> &StopIndices {
        &self.stop
    }

    /// Split into the parts the later phases need
    pub fn into_parts(self) -> AccumulatedParts {
        AccumulatedParts {
            summary: self.summary(),
            tables: self.tables,
            records: self.records,
            resolver: self.resolver,
            charts: self.charts,
            stop: self.stop,
        }
    }
}

/// Owned state handed from stream consumption to the tree phases
#[derive(Debug)]
pub struct AccumulatedParts {
    pub summary: Summary,
    pub tables: TraceTables,
    pub records: Vec<AllocationRecord>,
    pub resolver: LocationResolver,
    pub charts: ChartAggregator,
    pub stop: StopIndices,
}
