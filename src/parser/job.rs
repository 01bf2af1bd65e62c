//! The aggregation run, synchronous and as a background job.
//!
//! A run consumes the event stream, merges the bottom-up tree, inverts it,
//! and finalizes the charts. Results are only handed out once all of them
//! exist; a failed or cancelled run publishes nothing but the failure.

use crate::aggregator::{
    merge_allocations, to_top_down, AccumulatedTraceData, ChartData, CostTree, StopBoundary,
    Summary,
};
use crate::flamegraph::FlameGraphData;
use crate::trace::EventSource;
use crate::utils::config::{AggregationConfig, EVENTS_PER_CANCEL_CHECK};
use crate::utils::error::AggregationError;
use crossbeam_channel::{Receiver, Sender};
use log::{debug, error, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

/// Shared flag a requester sets to abandon a run
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn check(&self, phase: &str) -> Result<(), AggregationError> {
        if self.is_cancelled() {
            info!("Aggregation cancelled before {}", phase);
            return Err(AggregationError::Cancelled);
        }
        Ok(())
    }
}

/// Everything one run produces
#[derive(Debug, Clone)]
pub struct AggregationResult {
    pub summary: Summary,
    pub bottom_up: Arc<CostTree>,
    pub consumed: ChartData,
    pub allocations: ChartData,
    pub allocated: ChartData,
    pub top_down: Arc<CostTree>,
}

impl AggregationResult {
    pub fn flame_graph(&self) -> FlameGraphData {
        FlameGraphData::new(Arc::clone(&self.top_down))
    }

    /// The results in delivery order, ending with `Finished`
    pub fn into_messages(self) -> Vec<ParserMessage> {
        let flame_graph = self.flame_graph();
        vec![
            ParserMessage::Summary(self.summary),
            ParserMessage::BottomUp(self.bottom_up),
            ParserMessage::ConsumedChart(self.consumed),
            ParserMessage::AllocationsChart(self.allocations),
            ParserMessage::AllocatedChart(self.allocated),
            ParserMessage::TopDown(self.top_down),
            ParserMessage::FlameGraph(flame_graph),
            ParserMessage::Finished,
        ]
    }
}

/// One result handed from the background job to its requester
#[derive(Debug)]
pub enum ParserMessage {
    Summary(Summary),
    BottomUp(Arc<CostTree>),
    ConsumedChart(ChartData),
    AllocationsChart(ChartData),
    AllocatedChart(ChartData),
    TopDown(Arc<CostTree>),
    FlameGraph(FlameGraphData),
    Finished,
    /// The run failed; no other message is sent
    Failed(AggregationError),
}

/// Run a full aggregation on the calling thread
///
/// **Public** - main entry point for aggregation
///
/// # Arguments
/// * `source` - Decoded event stream
/// * `config` - Stop-boundary names and other settings
/// * `cancel` - Checked between phases and periodically while reading
///
/// # Errors
/// * `AggregationError::Decode` - the event source failed
/// * `AggregationError::Cancelled` - `cancel` was set
/// * `AggregationError::InvariantViolation` - inconsistent trace data
pub fn aggregate(
    source: &mut impl EventSource,
    config: &AggregationConfig,
    cancel: &CancellationFlag,
) -> Result<AggregationResult, AggregationError> {
    aggregate_with(source, config, cancel, None)
}

/// Like `aggregate`, but with an externally supplied stop boundary
///
/// When `stop` is given it replaces the boundary derived from
/// `config.stop_functions`.
pub fn aggregate_with(
    source: &mut impl EventSource,
    config: &AggregationConfig,
    cancel: &CancellationFlag,
    stop: Option<&dyn StopBoundary>,
) -> Result<AggregationResult, AggregationError> {
    let start_time = Instant::now();

    // Phase 1: consume the event stream
    debug!("Phase 1/4: consuming event stream");
    let mut data = AccumulatedTraceData::new(config);
    let mut consumed_events = 0usize;
    while let Some(event) = source.next_event()? {
        data.handle_event(event);
        consumed_events += 1;
        if consumed_events % EVENTS_PER_CANCEL_CHECK == 0 {
            cancel.check("event stream")?;
        }
    }
    data.finish();
    debug!("Consumed {} events", consumed_events);
    cancel.check("bottom-up merge")?;

    // Phase 2: bottom-up merge
    debug!("Phase 2/4: merging bottom-up tree");
    let mut parts = data.into_parts();
    let boundary: &dyn StopBoundary = match stop {
        Some(stop) => stop,
        None => &parts.stop,
    };
    let bottom_up = merge_allocations(&parts.records, &parts.tables, &mut parts.resolver, boundary)?;
    cancel.check("top-down build")?;

    // Phase 3: top-down inversion
    debug!("Phase 3/4: building top-down tree");
    let top_down = to_top_down(&bottom_up)?;
    cancel.check("chart finalization")?;

    // Phase 4: charts
    debug!("Phase 4/4: finalizing charts");
    let (consumed, allocations, allocated) = parts.charts.into_data().ok_or_else(|| {
        AggregationError::InvariantViolation("chart labels were never frozen".to_string())
    })?;
    cancel.check("publishing results")?;

    info!(
        "Aggregated {} records into {} bottom-up / {} top-down rows in {:.2}s",
        parts.records.len(),
        bottom_up.len(),
        top_down.len(),
        start_time.elapsed().as_secs_f64()
    );

    Ok(AggregationResult {
        summary: parts.summary,
        bottom_up: Arc::new(bottom_up),
        consumed,
        allocations,
        allocated,
        top_down: Arc::new(top_down),
    })
}

/// Launches aggregation runs off the requester's thread
pub struct Parser;

impl Parser {
    /// Start a run on a dedicated worker thread
    ///
    /// Results arrive on the handle's channel in the order of
    /// `AggregationResult::into_messages`, or as a single `Failed` message.
    pub fn spawn<S>(mut source: S, config: AggregationConfig) -> ParserHandle
    where
        S: EventSource + Send + 'static,
    {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let cancel = CancellationFlag::new();
        let worker_cancel = cancel.clone();

        let handle = std::thread::spawn(move || {
            let result = aggregate(&mut source, &config, &worker_cancel);
            publish(&sender, result);
        });

        ParserHandle {
            receiver,
            cancel,
            handle: Some(handle),
        }
    }
}

fn publish(sender: &Sender<ParserMessage>, result: Result<AggregationResult, AggregationError>) {
    match result {
        Ok(result) => {
            for message in result.into_messages() {
                if sender.send(message).is_err() {
                    debug!("Requester went away, dropping remaining results");
                    return;
                }
            }
        }
        Err(e) => {
            error!("Aggregation failed: {}", e);
            let _ = sender.send(ParserMessage::Failed(e));
        }
    }
}

/// Requester side of a background run
pub struct ParserHandle {
    receiver: Receiver<ParserMessage>,
    cancel: CancellationFlag,
    handle: Option<JoinHandle<()>>,
}

impl ParserHandle {
    /// Results as they arrive
    pub fn messages(&self) -> &Receiver<ParserMessage> {
        &self.receiver
    }

    /// Ask the worker to stop at its next check
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Block until the run is over and reassemble its results
    ///
    /// # Errors
    /// * The run's own failure, if it sent `Failed`
    /// * `AggregationError::WorkerPanicked` - the worker died without finishing
    /// * `AggregationError::InvariantViolation` - messages out of order
    pub fn wait(mut self) -> Result<AggregationResult, AggregationError> {
        let collected = collect_messages(self.receiver.iter());
        if let Some(handle) = self.handle.take() {
            handle.join().map_err(|_| AggregationError::WorkerPanicked)?;
        }
        collected
    }
}

/// Rebuild an `AggregationResult` from messages in delivery order
pub fn collect_messages(
    messages: impl IntoIterator<Item = ParserMessage>,
) -> Result<AggregationResult, AggregationError> {
    let mut messages = messages.into_iter();
    let out_of_order =
        |what: &str| AggregationError::InvariantViolation(format!("expected {} message", what));

    macro_rules! expect {
        ($variant:ident, $what:literal) => {
            match messages.next() {
                Some(ParserMessage::$variant(value)) => value,
                Some(ParserMessage::Failed(e)) => return Err(e),
                None => return Err(AggregationError::WorkerPanicked),
                Some(_) => return Err(out_of_order($what)),
            }
        };
    }

    let summary = expect!(Summary, "summary");
    let bottom_up = expect!(BottomUp, "bottom-up");
    let consumed = expect!(ConsumedChart, "consumed chart");
    let allocations = expect!(AllocationsChart, "allocations chart");
    let allocated = expect!(AllocatedChart, "allocated chart");
    let top_down = expect!(TopDown, "top-down");
    let _flame_graph = expect!(FlameGraph, "flame graph");
    match messages.next() {
        Some(ParserMessage::Finished) => {}
        Some(ParserMessage::Failed(e)) => return Err(e),
        None => return Err(AggregationError::WorkerPanicked),
        Some(_) => return Err(out_of_order("finished")),
    }

    Ok(AggregationResult {
        summary,
        bottom_up,
        consumed,
        allocations,
        allocated,
        top_down,
    })
}
