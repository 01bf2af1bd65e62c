//! Folded-stack output writer.
//!
//! Writes collapsed stacks, one `stack weight` line each, for consumption by
//! external flame-graph tools.

use super::json::{create_parent_dirs, validate_output_path};
use crate::flamegraph::CollapsedStack;
use crate::utils::error::OutputError;
use log::{info, warn};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Write collapsed stacks to a folded file
///
/// **Public** - main entry point for folded output
///
/// # Errors
/// * `OutputError::WriteFailed` - I/O error during write
/// * `OutputError::InvalidPath` - Path is invalid
pub fn write_collapsed(
    stacks: &[CollapsedStack],
    output_path: impl AsRef<Path>,
) -> Result<(), OutputError> {
    let output_path = output_path.as_ref();

    info!("Writing {} folded stacks to: {}", stacks.len(), output_path.display());

    validate_output_path(output_path)?;
    if let Some(ext) = output_path.extension() {
        if ext != "folded" && ext != "txt" {
            warn!("Unusual extension for folded stacks: {:?}", ext);
        }
    }
    create_parent_dirs(output_path)?;

    let file = File::create(output_path).map_err(OutputError::WriteFailed)?;
    let mut writer = BufWriter::new(file);
    for stack in stacks {
        writeln!(writer, "{}", stack.to_line()).map_err(OutputError::WriteFailed)?;
    }
    writer.flush().map_err(OutputError::WriteFailed)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_collapsed_lines() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("out.folded");
        let stacks = vec![
            CollapsedStack::new("main;work".to_string(), 30),
            CollapsedStack::new("main".to_string(), 5),
        ];

        write_collapsed(&stacks, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "main;work 30\nmain 5\n");
    }

    #[test]
    fn test_write_collapsed_rejects_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(write_collapsed(&[], temp_dir.path()).is_err());
    }
}
