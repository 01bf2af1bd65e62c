use alloc_trace_studio::aggregator::{to_top_down, CostTree};
use alloc_trace_studio::flamegraph::CostField;
use alloc_trace_studio::parser::{aggregate, AggregationResult, CancellationFlag};
use alloc_trace_studio::trace::{IpIndex, IterSource, StringIndex, TraceEvent, TraceIndex};
use alloc_trace_studio::utils::AggregationConfig;
use pretty_assertions::assert_eq;

fn string(value: &str) -> TraceEvent {
    TraceEvent::String {
        value: value.to_string(),
    }
}

fn ip(address: u64, function: u32) -> TraceEvent {
    TraceEvent::Ip {
        address,
        function: StringIndex(function),
        file: StringIndex::NONE,
        module: StringIndex::NONE,
        line: 0,
    }
}

fn trace(ip: u32, parent: u32) -> TraceEvent {
    TraceEvent::Trace {
        ip: IpIndex(ip),
        parent: TraceIndex(parent),
    }
}

fn alloc(trace: u32, size: u64) -> TraceEvent {
    TraceEvent::Alloc {
        trace: TraceIndex(trace),
        size,
    }
}

fn free(trace: u32, size: u64) -> TraceEvent {
    TraceEvent::Free {
        trace: TraceIndex(trace),
        size,
    }
}

fn run(events: Vec<TraceEvent>) -> AggregationResult {
    let mut source = IterSource::new(events);
    aggregate(
        &mut source,
        &AggregationConfig::default(),
        &CancellationFlag::new(),
    )
    .unwrap()
}

/// X calls Y, Y calls both A and B; A allocates 100 and B 50
fn diamond() -> Vec<TraceEvent> {
    vec![
        string("X"),
        string("Y"),
        string("A"),
        string("B"),
        ip(0x10, 1),
        ip(0x20, 2),
        ip(0x30, 3),
        ip(0x40, 4),
        trace(1, 0),
        trace(2, 1),
        trace(3, 2),
        trace(4, 2),
        alloc(3, 100),
        alloc(4, 50),
    ]
}

fn path(tree: &CostTree, names: &[&str]) -> u64 {
    let mut row = tree.find_root(names[0]).unwrap();
    for name in &names[1..] {
        row = tree.find_child(row, name).unwrap();
    }
    tree.row(row).cost.allocated
}

#[test]
fn test_bottom_up_starts_at_allocation_sites() {
    let result = run(diamond());
    let tree = &result.bottom_up;

    assert_eq!(tree.roots().len(), 2);
    assert_eq!(path(tree, &["A"]), 100);
    assert_eq!(path(tree, &["A", "Y", "X"]), 100);
    assert_eq!(path(tree, &["B", "Y", "X"]), 50);
}

#[test]
fn test_top_down_starts_at_outermost_caller() {
    let result = run(diamond());
    let tree = &result.top_down;

    assert_eq!(tree.roots().len(), 1);
    assert_eq!(path(tree, &["X"]), 150);
    assert_eq!(path(tree, &["X", "Y"]), 150);
    assert_eq!(path(tree, &["X", "Y", "A"]), 100);
    assert_eq!(path(tree, &["X", "Y", "B"]), 50);
}

/// S allocates when called from P directly, and from P when P is called by Q
fn shared_prefix() -> Vec<TraceEvent> {
    vec![
        string("S"),
        string("P"),
        string("Q"),
        ip(0x10, 1),
        ip(0x20, 2),
        ip(0x30, 3),
        trace(2, 0),
        trace(1, 1),
        trace(3, 0),
        trace(2, 3),
        trace(1, 4),
    ]
}

#[test]
fn test_costs_are_conserved() {
    let result = run(diamond());

    let bottom_up = result.bottom_up.total_cost();
    assert_eq!(bottom_up.allocated, result.summary.total_allocated);
    assert_eq!(bottom_up.allocations, result.summary.total_allocations);
    assert_eq!(result.top_down.total_cost(), bottom_up);
}

#[test]
fn test_costs_are_conserved_with_frees() {
    let mut events = shared_prefix();
    events.extend([
        alloc(2, 100),
        alloc(5, 50),
        alloc(5, 30),
        free(2, 40),
        free(5, 30),
    ]);
    let result = run(events);
    let summary = &result.summary;
    assert_eq!(summary.total_allocated, 180);
    assert_eq!(summary.total_allocations, 3);
    assert_eq!(summary.leaked, 110);

    for tree in [&result.bottom_up, &result.top_down] {
        let total = tree.total_cost();
        assert_eq!(total.allocated, summary.total_allocated);
        assert_eq!(total.allocations, summary.total_allocations);
        assert_eq!(total.leaked, summary.leaked);
    }

    // the path ending at P keeps its own cost in the inversion
    assert_eq!(path(&result.top_down, &["P", "S"]), 100);
    assert_eq!(path(&result.top_down, &["Q", "P", "S"]), 80);

    let stacks = result.flame_graph().collapsed(CostField::Leaked);
    let weight: u64 = stacks.iter().map(|stack| stack.weight).sum();
    assert_eq!(weight, summary.leaked);
}

#[test]
fn test_inverting_twice_keeps_the_totals() {
    let result = run(diamond());
    let again = to_top_down(&result.top_down).unwrap();
    assert_eq!(again.total_cost(), result.top_down.total_cost());
}

#[test]
fn test_consumed_chart_reports_the_peak_between_boundaries() {
    let mut events = diamond();
    events.extend([
        alloc(3, 500),
        free(3, 500),
        alloc(3, 100),
        TraceEvent::Timestamp { stamp: 10 },
    ]);
    let result = run(events);

    let rows = &result.consumed.rows;
    let stamps: Vec<u64> = rows.iter().map(|row| row.time_stamp).collect();
    assert_eq!(stamps, vec![0, 10, 11]);
    // 150 from the diamond plus the 500 still outstanding at the peak
    assert_eq!(rows[1].cost[&0], 650);
    assert_eq!(rows[2].cost[&0], 250);
    assert_eq!(result.summary.total_time_ms, 11);
}

#[test]
fn test_chart_rows_are_bounded_and_never_zero() {
    let mut events = Vec::new();
    for i in 1..=15u32 {
        events.push(string(&format!("f{:02}", i)));
        events.push(ip(u64::from(i) * 0x10, i));
        events.push(trace(i, 0));
    }
    for i in 1..=12u32 {
        events.push(alloc(i, u64::from(i)));
    }
    events.push(TraceEvent::Timestamp { stamp: 5 });
    let result = run(events);

    for chart in [&result.consumed, &result.allocated, &result.allocations] {
        for row in &chart.rows[1..] {
            // ten ranked functions plus the total
            assert_eq!(row.cost.len(), 11);
            assert!(row.cost.iter().all(|(&id, &v)| id == 0 || v > 0));
        }
    }
    // f01 and f02 are the two smallest and fall off
    let top = result.allocated.label(1).unwrap();
    assert_eq!(top, "f12");
    assert!(result.allocated.labels.iter().all(|l| l != "f13"));
}

#[test]
fn test_labels_are_frozen_with_total_first() {
    let result = run(diamond());
    for chart in [&result.consumed, &result.allocated, &result.allocations] {
        assert_eq!(chart.label(0), Some("total"));
        let mut labels = chart.labels[1..].to_vec();
        labels.sort();
        assert_eq!(labels, vec!["A", "B"]);
        assert_eq!(chart.rows[0].time_stamp, 0);
        assert!(chart.rows[0].cost.is_empty());
    }
}

#[test]
fn test_non_increasing_timestamps_are_ignored() {
    let mut events = diamond();
    events.extend([
        TraceEvent::Timestamp { stamp: 5 },
        TraceEvent::Timestamp { stamp: 5 },
        TraceEvent::Timestamp { stamp: 3 },
    ]);
    let result = run(events);
    let stamps: Vec<u64> = result.allocated.rows.iter().map(|r| r.time_stamp).collect();
    assert_eq!(stamps, vec![0, 5, 6]);
}

#[test]
fn test_empty_stream() {
    let result = run(Vec::new());
    assert!(result.bottom_up.is_empty());
    assert!(result.top_down.is_empty());
    assert_eq!(result.summary.total_time_ms, 1);
    assert_eq!(result.allocations.rows.len(), 2);
}
