use crate::flamegraph::CostField;
use crate::utils::config::DEFAULT_STOP_FUNCTIONS;
use std::path::PathBuf;

/// Arguments for the aggregate command
///
/// **Public** - used by main.rs to construct from CLI args
#[derive(Debug, Clone)]
pub struct AggregateArgs {
    /// JSON-lines event stream to aggregate
    pub input: PathBuf,

    /// Output path for the JSON report
    pub output_json: PathBuf,

    /// Output path for folded stacks (optional)
    pub output_folded: Option<PathBuf>,

    /// Cost field weighting the folded stacks
    pub metric: CostField,

    /// Function names at which call paths are cut
    pub stop_functions: Vec<String>,

    /// Print text summary to stdout
    pub print_summary: bool,
}

impl Default for AggregateArgs {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            output_json: PathBuf::from("report.json"),
            output_folded: None,
            metric: CostField::Allocated,
            stop_functions: DEFAULT_STOP_FUNCTIONS
                .iter()
                .map(|name| name.to_string())
                .collect(),
            print_summary: false,
        }
    }
}
