use crate::output::read_report;
use crate::utils::config::SCHEMA_VERSION;
use anyhow::Result;
use std::path::PathBuf;

/// Validate a report JSON file
pub fn validate_report_file(file_path: PathBuf) -> Result<()> {
    println!("Validating report: {}", file_path.display());

    let report = read_report(&file_path)?;

    println!("✓ Valid report JSON");
    println!("  Version: {}", report.version);
    println!("  Debuggee: {}", report.summary.debuggee);
    println!("  Bytes allocated: {}", report.summary.total_allocated);
    println!(
        "  Bottom-up: {} roots, {} rows",
        report.bottom_up.roots.len(),
        report.bottom_up.rows.len()
    );
    println!(
        "  Top-down: {} roots, {} rows",
        report.top_down.roots.len(),
        report.top_down.rows.len()
    );
    println!("  Chart rows: {}", report.charts.allocated.rows.len());

    Ok(())
}

/// Display version information
pub fn display_version() {
    println!("Alloc Trace Studio v{}", env!("CARGO_PKG_VERSION"));
    println!("Report Schema: v{}", SCHEMA_VERSION);
}
