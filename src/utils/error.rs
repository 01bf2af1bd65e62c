//! Error types for the entire application.
//!
//! We use `thiserror` for library-style errors with custom types,
//! and `anyhow` for application-level error propagation in main.rs and commands.

use thiserror::Error;

/// Errors raised while reading the decoded event stream
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Failed to read event stream: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed event on line {line}: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors that abort an aggregation run
///
/// A run either produces every result or none of them, so each variant
/// means nothing was published.
#[derive(Error, Debug)]
pub enum AggregationError {
    #[error("Decoder failure: {0}")]
    Decode(#[from] DecodeError),

    #[error("Aggregation was cancelled")]
    Cancelled,

    /// Upstream interning contract broken (cyclic links, unsorted siblings).
    #[error("Internal invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Aggregation worker thread panicked")]
    WorkerPanicked,
}

/// Errors that can occur during file output
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to write file: {0}")]
    WriteFailed(#[from] std::io::Error),

    #[error("Failed to read file: {0}")]
    ReadFailed(std::io::Error),

    #[error("Failed to serialize JSON: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("Invalid output path: {0}")]
    InvalidPath(String),
}
