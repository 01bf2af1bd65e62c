//! Aggregate command implementation.
//!
//! The aggregate command:
//! 1. Opens the decoded event stream
//! 2. Runs the aggregation on a worker thread
//! 3. Collects the results in delivery order
//! 4. Writes the JSON report (and folded stacks, if requested)

use super::models::AggregateArgs;
use crate::aggregator::Summary;
use crate::flamegraph::{collapsed_stacks, CollapsedStack};
use crate::output::{write_collapsed, write_report};
use crate::parser::{to_report, Parser};
use crate::trace::JsonLinesSource;
use crate::utils::config::AggregationConfig;
use anyhow::{Context, Result};
use log::{debug, info};
use std::fs::File;
use std::io::BufReader;
use std::time::Instant;

/// Execute the aggregate command
///
/// **Public** - main entry point called from main.rs
///
/// # Errors
/// * Input file cannot be opened
/// * Event stream is malformed
/// * File write errors
pub fn execute_aggregate(args: AggregateArgs) -> Result<()> {
    let start_time = Instant::now();

    info!("Aggregating allocation trace: {}", args.input.display());

    info!("Step 1/3: Opening event stream...");
    let file = File::open(&args.input)
        .with_context(|| format!("Failed to open {}", args.input.display()))?;
    let source = JsonLinesSource::new(BufReader::new(file));

    info!("Step 2/3: Aggregating...");
    let config = AggregationConfig::new().with_stop_functions(args.stop_functions.clone());
    let result = Parser::spawn(source, config)
        .wait()
        .context("Failed to aggregate allocation trace")?;

    debug!(
        "Bottom-up rows: {}, top-down rows: {}",
        result.bottom_up.len(),
        result.top_down.len()
    );

    info!("Step 3/3: Writing output files...");
    write_report(&to_report(&result), &args.output_json).context("Failed to write report JSON")?;
    info!("✓ Report written to: {}", args.output_json.display());

    let stacks = collapsed_stacks(&result.top_down, args.metric);
    if let Some(folded_path) = &args.output_folded {
        write_collapsed(&stacks, folded_path).context("Failed to write folded stacks")?;
        info!("✓ Folded stacks written to: {}", folded_path.display());
    }

    if args.print_summary {
        print_summary(&result.summary, &stacks);
    }

    info!(
        "Aggregation completed in {:.2}s",
        start_time.elapsed().as_secs_f64()
    );

    Ok(())
}

fn print_summary(summary: &Summary, stacks: &[CollapsedStack]) {
    println!("\n{}", "=".repeat(80));
    println!("ALLOCATION SUMMARY");
    println!("{}", "=".repeat(80));
    println!("Debuggee:          {}", summary.debuggee);
    println!("Total runtime:     {:.3}s", summary.total_time_secs());
    println!(
        "Bytes allocated:   {} ({:.0}/s)",
        summary.total_allocated,
        summary.allocated_per_second()
    );
    println!(
        "Allocation calls:  {} ({:.0}/s)",
        summary.total_allocations,
        summary.allocations_per_second()
    );
    println!("Peak consumption:  {}", summary.peak);
    println!("Leaked:            {}", summary.leaked);
    println!("\nTop call paths:");
    for stack in stacks.iter().take(10) {
        println!("  {:>12}  {}", stack.weight, stack.stack);
    }
    println!("{}", "=".repeat(80));
}

/// Validate aggregate arguments
///
/// **Public** - can be called before execute_aggregate for early validation
pub fn validate_args(args: &AggregateArgs) -> Result<()> {
    if args.input.as_os_str().is_empty() {
        anyhow::bail!("Input path cannot be empty");
    }

    if !args.input.exists() {
        anyhow::bail!("Input file does not exist: {}", args.input.display());
    }

    if args.input.is_dir() {
        anyhow::bail!("Input path is a directory: {}", args.input.display());
    }

    if args.stop_functions.iter().any(|name| name.trim().is_empty()) {
        anyhow::bail!("Stop function names cannot be empty");
    }

    Ok(())
}
