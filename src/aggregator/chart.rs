//! Time-series charts of the top allocating functions.
//!
//! At every timestamp boundary the live allocation records are grouped by
//! function name and ranked three ways (consumed, allocated, allocation
//! count). Each series gets one row per boundary holding the grand total at
//! id 0 plus the top contributors.

use super::accumulator::AllocationRecord;
use super::location::LocationResolver;
use crate::trace::TraceTables;
use crate::utils::config::{MAX_CHART_ENTRIES, TOTAL_LABEL, TOTAL_LABEL_ID};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Which per-function value a series ranks by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Bytes currently outstanding
    Consumed,
    /// Bytes allocated so far, ignoring frees
    Allocated,
    /// Allocation calls so far
    Allocations,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Consumed, Metric::Allocated, Metric::Allocations];

    pub fn value(self, data: &FunctionCost) -> u64 {
        match self {
            Metric::Consumed => data.consumed,
            Metric::Allocated => data.allocated,
            Metric::Allocations => data.allocations,
        }
    }
}

/// Costs of every record whose allocation site is in one function
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FunctionCost {
    pub consumed: u64,
    pub allocated: u64,
    pub allocations: u64,
}

/// One sample of a series
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartRow {
    pub time_stamp: u64,
    /// Label id -> value; id 0 is the total
    pub cost: BTreeMap<u32, u64>,
}

/// A finished series: rows plus the dense id -> label list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartData {
    pub rows: Vec<ChartRow>,
    /// `labels[id]` names label id `id`; empty until the series is frozen
    pub labels: Vec<String>,
}

impl ChartData {
    pub fn label(&self, id: u32) -> Option<&str> {
        self.labels.get(id as usize).map(String::as_str)
    }
}

/// A series under construction
#[derive(Debug, Clone)]
pub struct ChartSeries {
    metric: Metric,
    data: ChartData,
    label_ids: HashMap<String, u32>,
    frozen: bool,
}

impl ChartSeries {
    pub fn new(metric: Metric) -> Self {
        let mut label_ids = HashMap::new();
        label_ids.insert(TOTAL_LABEL.to_string(), TOTAL_LABEL_ID);
        Self {
            metric,
            // null sample at the origin
            data: ChartData {
                rows: vec![ChartRow::default()],
                labels: Vec::new(),
            },
            label_ids,
            frozen: false,
        }
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn data(&self) -> &ChartData {
        &self.data
    }

    /// Id assigned to `function`, if it ever appeared
    pub fn label_id(&self, function: &str) -> Option<u32> {
        self.label_ids.get(function).copied()
    }

    /// Append the row for `time_stamp`
    ///
    /// `ranked` must already be sorted by this series' metric, descending.
    fn push_row(&mut self, time_stamp: u64, total: u64, ranked: &[(&String, &FunctionCost)]) {
        let mut row = ChartRow {
            time_stamp,
            cost: BTreeMap::new(),
        };
        row.cost.insert(TOTAL_LABEL_ID, total);

        for (function, cost) in ranked.iter().take(MAX_CHART_ENTRIES) {
            let value = self.metric.value(cost);
            if value == 0 {
                break;
            }
            let next_id = self.label_ids.len() as u32;
            let id = *self
                .label_ids
                .entry(function.to_string())
                .or_insert(next_id);
            row.cost.insert(id, value);
        }

        self.data.rows.push(row);
    }

    /// Convert the name -> id map into the dense label list
    fn freeze(&mut self) {
        let mut labels = vec![String::new(); self.label_ids.len()];
        for (name, &id) in &self.label_ids {
            labels[id as usize] = name.clone();
        }
        self.data.labels = labels;
        self.frozen = true;
        debug!(
            "Froze {:?} chart with {} labels and {} rows",
            self.metric,
            self.data.labels.len(),
            self.data.rows.len()
        );
    }

    /// The finished data, or None while labels are not frozen
    pub fn into_data(self) -> Option<ChartData> {
        self.frozen.then_some(self.data)
    }
}

/// Grand totals reported at id 0 of each series
#[derive(Debug, Clone, Copy, Default)]
pub struct ChartTotals {
    /// Maximum outstanding bytes since the previous boundary
    pub consumed: u64,
    pub allocated: u64,
    pub allocations: u64,
}

impl ChartTotals {
    fn for_metric(&self, metric: Metric) -> u64 {
        match metric {
            Metric::Consumed => self.consumed,
            Metric::Allocated => self.allocated,
            Metric::Allocations => self.allocations,
        }
    }
}

/// The three series of one aggregation run
#[derive(Debug, Clone)]
pub struct ChartAggregator {
    consumed: ChartSeries,
    allocated: ChartSeries,
    allocations: ChartSeries,
}

impl Default for ChartAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl ChartAggregator {
    pub fn new() -> Self {
        Self {
            consumed: ChartSeries::new(Metric::Consumed),
            allocated: ChartSeries::new(Metric::Allocated),
            allocations: ChartSeries::new(Metric::Allocations),
        }
    }

    pub fn series(&self, metric: Metric) -> &ChartSeries {
        match metric {
            Metric::Consumed => &self.consumed,
            Metric::Allocated => &self.allocated,
            Metric::Allocations => &self.allocations,
        }
    }

    fn series_mut(&mut self, metric: Metric) -> &mut ChartSeries {
        match metric {
            Metric::Consumed => &mut self.consumed,
            Metric::Allocated => &mut self.allocated,
            Metric::Allocations => &mut self.allocations,
        }
    }

    /// Record one timestamp boundary in all three series
    ///
    /// The resolver must already be synced with `tables`. `is_final` freezes
    /// the label maps; later boundaries are ignored.
    pub fn handle_time_stamp(
        &mut self,
        time_stamp: u64,
        is_final: bool,
        records: &[AllocationRecord],
        tables: &TraceTables,
        resolver: &mut LocationResolver,
        totals: ChartTotals,
    ) {
        if self.consumed.is_frozen() {
            warn!("Ignoring timestamp {} after the final boundary", time_stamp);
            return;
        }

        let merged = merge_by_function(records, tables, resolver);
        let mut ranked: Vec<(&String, &FunctionCost)> = merged.iter().collect();

        for metric in Metric::ALL {
            // ties go to the smaller name so output is deterministic
            ranked.sort_by(|left, right| {
                metric
                    .value(right.1)
                    .cmp(&metric.value(left.1))
                    .then_with(|| left.0.cmp(right.0))
            });
            let series = self.series_mut(metric);
            series.push_row(time_stamp, totals.for_metric(metric), &ranked);
            if is_final {
                series.freeze();
            }
        }
    }

    /// Freeze the labels without adding a row
    pub fn freeze(&mut self) {
        for metric in Metric::ALL {
            let series = self.series_mut(metric);
            if !series.is_frozen() {
                series.freeze();
            }
        }
    }

    /// Finished series in (consumed, allocations, allocated) order
    ///
    /// Returns None unless the final boundary has been processed.
    pub fn into_data(self) -> Option<(ChartData, ChartData, ChartData)> {
        Some((
            self.consumed.into_data()?,
            self.allocations.into_data()?,
            self.allocated.into_data()?,
        ))
    }
}

/// Group records by the function name of their allocation site
fn merge_by_function(
    records: &[AllocationRecord],
    tables: &TraceTables,
    resolver: &mut LocationResolver,
) -> BTreeMap<String, FunctionCost> {
    let mut merged: BTreeMap<String, FunctionCost> = BTreeMap::new();
    for record in records {
        let function = tables
            .trace(record.trace)
            .and_then(|trace| tables.ip(trace.ip))
            .map(|ip| resolver.function(ip))
            .unwrap_or_default();

        let entry = merged.entry(function).or_default();
        entry.consumed = entry.consumed.saturating_add(record.leaked);
        entry.allocated = entry.allocated.saturating_add(record.allocated);
        entry.allocations = entry.allocations.saturating_add(record.allocations);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{InstructionPointer, TraceIndex, TraceNode};

    /// One single-frame trace per function name
    fn setup(functions: &[&str]) -> (TraceTables, LocationResolver) {
        let mut tables = TraceTables::new();
        for (i, name) in functions.iter().enumerate() {
            let function = tables.push_string(*name);
            let ip = tables.push_ip(InstructionPointer {
                address: 0x100 + i as u64,
                function,
                ..Default::default()
            });
            tables.push_trace(TraceNode {
                ip,
                parent: TraceIndex::NONE,
            });
        }
        let mut resolver = LocationResolver::new();
        resolver.sync(tables.strings());
        (tables, resolver)
    }

    fn record(trace: u32, allocated: u64, leaked: u64, allocations: u64) -> AllocationRecord {
        AllocationRecord {
            trace: TraceIndex(trace),
            allocations,
            allocated,
            leaked,
            peak: leaked,
        }
    }

    #[test]
    fn test_row_has_total_and_ranked_functions() {
        let (tables, mut resolver) = setup(&["small", "big"]);
        let records = vec![record(1, 10, 5, 1), record(2, 90, 45, 3)];
        let mut charts = ChartAggregator::new();

        charts.handle_time_stamp(
            10,
            true,
            &records,
            &tables,
            &mut resolver,
            ChartTotals {
                consumed: 50,
                allocated: 100,
                allocations: 4,
            },
        );

        let allocated = charts.series(Metric::Allocated);
        let row = allocated.data().rows.last().unwrap();
        assert_eq!(row.time_stamp, 10);
        assert_eq!(row.cost[&0], 100);
        let big = allocated.label_id("big").unwrap();
        let small = allocated.label_id("small").unwrap();
        assert_eq!(big, 1);
        assert_eq!(small, 2);
        assert_eq!(row.cost[&big], 90);
        assert_eq!(allocated.data().labels, vec!["total", "big", "small"]);
    }

    #[test]
    fn test_zero_values_are_not_recorded() {
        let (tables, mut resolver) = setup(&["freed", "held"]);
        let records = vec![record(1, 10, 0, 1), record(2, 10, 10, 1)];
        let mut charts = ChartAggregator::new();

        charts.handle_time_stamp(1, false, &records, &tables, &mut resolver, ChartTotals::default());

        let consumed = charts.series(Metric::Consumed);
        let row = consumed.data().rows.last().unwrap();
        assert_eq!(row.cost.len(), 2);
        assert!(consumed.label_id("freed").is_none());
        assert!(row.cost.values().skip(1).all(|&v| v > 0));
    }

    #[test]
    fn test_at_most_ten_entries_per_row() {
        let names: Vec<String> = (0..15).map(|i| format!("f{:02}", i)).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let (tables, mut resolver) = setup(&refs);
        let records: Vec<_> = (1..=15).map(|t| record(t, t as u64, t as u64, 1)).collect();
        let mut charts = ChartAggregator::new();

        charts.handle_time_stamp(1, false, &records, &tables, &mut resolver, ChartTotals::default());

        for metric in Metric::ALL {
            let row = charts.series(metric).data().rows.last().unwrap();
            assert_eq!(row.cost.len(), MAX_CHART_ENTRIES + 1);
        }
        // largest values win
        assert!(charts.series(Metric::Allocated).label_id("f14").is_some());
        assert!(charts.series(Metric::Allocated).label_id("f00").is_none());
    }

    #[test]
    fn test_label_ids_are_reused_across_rows() {
        let (tables, mut resolver) = setup(&["a", "b"]);
        let mut charts = ChartAggregator::new();

        let first = vec![record(1, 10, 10, 1)];
        charts.handle_time_stamp(1, false, &first, &tables, &mut resolver, ChartTotals::default());
        let second = vec![record(1, 10, 10, 1), record(2, 50, 50, 1)];
        charts.handle_time_stamp(2, true, &second, &tables, &mut resolver, ChartTotals::default());

        let series = charts.series(Metric::Allocated);
        assert_eq!(series.label_id("a"), Some(1));
        assert_eq!(series.label_id("b"), Some(2));
        assert_eq!(series.data().rows.len(), 3);
        assert_eq!(series.data().rows[2].cost[&1], 10);
        assert_eq!(series.data().rows[2].cost[&2], 50);
    }

    #[test]
    fn test_records_with_same_function_are_merged() {
        let mut tables = TraceTables::new();
        let function = tables.push_string("shared");
        let outer = tables.push_string("outer");
        let site = tables.push_ip(InstructionPointer {
            address: 1,
            function,
            ..Default::default()
        });
        let caller = tables.push_ip(InstructionPointer {
            address: 2,
            function: outer,
            ..Default::default()
        });
        let root = tables.push_trace(TraceNode {
            ip: caller,
            parent: TraceIndex::NONE,
        });
        tables.push_trace(TraceNode {
            ip: site,
            parent: root,
        });
        tables.push_trace(TraceNode {
            ip: site,
            parent: TraceIndex::NONE,
        });
        let mut resolver = LocationResolver::new();
        resolver.sync(tables.strings());

        let records = vec![record(2, 30, 0, 1), record(3, 12, 0, 2)];
        let merged = merge_by_function(&records, &tables, &mut resolver);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged["shared"].allocated, 42);
        assert_eq!(merged["shared"].allocations, 3);
    }

    #[test]
    fn test_series_unavailable_until_frozen() {
        let charts = ChartAggregator::new();
        assert!(charts.into_data().is_none());

        let (tables, mut resolver) = setup(&["a"]);
        let mut charts = ChartAggregator::new();
        charts.handle_time_stamp(5, true, &[], &tables, &mut resolver, ChartTotals::default());
        let (consumed, _, _) = charts.into_data().unwrap();
        assert_eq!(consumed.labels, vec!["total"]);
    }

    #[test]
    fn test_boundaries_after_freeze_are_ignored() {
        let (tables, mut resolver) = setup(&["a"]);
        let records = vec![record(1, 10, 10, 1)];
        let mut charts = ChartAggregator::new();
        charts.handle_time_stamp(5, true, &[], &tables, &mut resolver, ChartTotals::default());
        charts.handle_time_stamp(6, true, &records, &tables, &mut resolver, ChartTotals::default());

        let series = charts.series(Metric::Allocated);
        assert_eq!(series.data().rows.len(), 2);
        assert!(series.label_id("a").is_none());
    }
}
