//! Event sources feeding an aggregation run.
//!
//! The binary trace format is decoded elsewhere; this module only defines the
//! seam (`EventSource`) plus two sources: a JSON-lines reader and an
//! in-memory iterator adapter.

use super::event::TraceEvent;
use crate::utils::error::DecodeError;
use log::debug;
use std::io::BufRead;

/// Ordered producer of decoded trace events
pub trait EventSource {
    /// Next event, `Ok(None)` at the end of the stream
    fn next_event(&mut self) -> Result<Option<TraceEvent>, DecodeError>;
}

impl<S: EventSource + ?Sized> EventSource for Box<S> {
    fn next_event(&mut self) -> Result<Option<TraceEvent>, DecodeError> {
        (**self).next_event()
    }
}

/// Reads one JSON-encoded `TraceEvent` per line
///
/// Blank lines and lines starting with `#` are skipped.
pub struct JsonLinesSource<R> {
    reader: R,
    line: usize,
    buffer: String,
}

impl<R: BufRead> JsonLinesSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            buffer: String::new(),
        }
    }

    /// Number of lines consumed so far
    pub fn lines_read(&self) -> usize {
        self.line
    }
}

impl<R: BufRead> EventSource for JsonLinesSource<R> {
    fn next_event(&mut self) -> Result<Option<TraceEvent>, DecodeError> {
        loop {
            self.buffer.clear();
            if self.reader.read_line(&mut self.buffer)? == 0 {
                debug!("Event stream ended after {} lines", self.line);
                return Ok(None);
            }
            self.line += 1;

            let trimmed = self.buffer.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            return serde_json::from_str(trimmed)
                .map(Some)
                .map_err(|source| DecodeError::Json {
                    line: self.line,
                    source,
                });
        }
    }
}

/// Adapts an in-memory sequence of events
pub struct IterSource<I> {
    events: I,
}

impl<I> IterSource<I>
where
    I: Iterator<Item = TraceEvent>,
{
    pub fn new(events: impl IntoIterator<IntoIter = I, Item = TraceEvent>) -> Self {
        Self {
            events: events.into_iter(),
        }
    }
}

impl<I> EventSource for IterSource<I>
where
    I: Iterator<Item = TraceEvent>,
{
    fn next_event(&mut self) -> Result<Option<TraceEvent>, DecodeError> {
        Ok(self.events.next())
    }
}
