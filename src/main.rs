//! Alloc Trace Studio CLI
//!
//! Aggregates decoded heap-allocation traces into cost trees, charts and
//! folded stacks.

use anyhow::Result;
use clap::{Parser, Subcommand};
use env_logger::Env;
use std::path::PathBuf;

use alloc_trace_studio::commands::{
    display_version, execute_aggregate, validate_args, validate_report_file, AggregateArgs,
};
use alloc_trace_studio::flamegraph::CostField;
use alloc_trace_studio::utils::config::DEFAULT_STOP_FUNCTIONS;

/// Alloc Trace Studio - heap allocation trace aggregation
#[derive(Parser, Debug)]
#[command(name = "alloc-trace")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Aggregate a decoded event stream
    Aggregate {
        /// JSON-lines event stream
        #[arg(short, long)]
        input: PathBuf,

        /// Output path for JSON report
        #[arg(short, long, default_value = "report.json")]
        output: PathBuf,

        /// Output path for folded stacks
        #[arg(short, long)]
        folded: Option<PathBuf>,

        /// Cost field weighting the folded stacks
        #[arg(long, default_value = "allocated")]
        metric: CostField,

        /// Function at which call paths are cut (repeatable)
        #[arg(long = "stop")]
        stop: Vec<String>,

        /// Walk every call path to its outermost frame
        #[arg(long, conflicts_with = "stop")]
        no_stop: bool,

        /// Print text summary to stdout
        #[arg(long)]
        summary: bool,
    },

    /// Validate a report JSON file
    Validate {
        /// Path to report JSON file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Display version information
    Version,
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    match cli.command {
        Commands::Aggregate {
            input,
            output,
            folded,
            metric,
            stop,
            no_stop,
            summary,
        } => {
            let stop_functions = if no_stop {
                Vec::new()
            } else if stop.is_empty() {
                DEFAULT_STOP_FUNCTIONS.iter().map(|s| s.to_string()).collect()
            } else {
                stop
            };

            let args = AggregateArgs {
                input,
                output_json: output,
                output_folded: folded,
                metric,
                stop_functions,
                print_summary: summary,
            };

            validate_args(&args)?;
            execute_aggregate(args)?;
        }

        Commands::Validate { file } => {
            validate_report_file(file)?;
        }

        Commands::Version => {
            display_version();
        }
    }

    Ok(())
}
