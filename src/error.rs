//! Error types for feed replay.
//!
//! Clean error handling using `thiserror` for ergonomic error definitions.
//!
//! Two faults are fatal for the stream that raised them:
//!
//! - [`DecodeFault`]: a record of a recognized type has the wrong length or an
//!   unparsable subfield.
//! - [`BookIntegrityFault`]: an Execute/Cancel would drive a price level's
//!   aggregate volume below zero.
//!
//! Both carry the offending line and its position so the caller can report
//! them without re-reading the input.

use thiserror::Error;

use crate::types::{Price, Side};

/// Result type alias for replay operations.
pub type Result<T> = std::result::Result<T, ReplayError>;

/// A record could not be decoded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("decode fault at line {line_no}: {reason} (line: {line:?})")]
pub struct DecodeFault {
    /// The offending record as received
    pub line: String,
    /// Position of the record in its stream
    pub line_no: u64,
    /// Human-readable cause
    pub reason: String,
}

impl DecodeFault {
    pub fn new(line: impl Into<String>, line_no: u64, reason: impl Into<String>) -> Self {
        Self {
            line: line.into(),
            line_no,
            reason: reason.into(),
        }
    }
}

/// Applying an event would corrupt the aggregated book.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("book integrity fault at line {line_no}: {reason} (line: {line:?})")]
pub struct BookIntegrityFault {
    pub line: String,
    pub line_no: u64,
    pub reason: String,
}

/// A reduction larger than the resting aggregate at a price level.
///
/// Raised by the book itself, which knows nothing about lines; the engine
/// attaches the line context when converting it into a [`BookIntegrityFault`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("{side} level {price} holds {resting}, cannot remove {requested}")]
pub struct LevelUnderflow {
    pub side: Side,
    pub price: Price,
    pub resting: u64,
    pub requested: u64,
}

impl LevelUnderflow {
    /// Attach the offending line.
    pub fn at_line(self, line: impl Into<String>, line_no: u64) -> BookIntegrityFault {
        BookIntegrityFault {
            line: line.into(),
            line_no,
            reason: self.to_string(),
        }
    }
}

/// Main error type for replay operations.
#[derive(Error, Debug, Clone)]
pub enum ReplayError {
    /// Malformed record; halts the current stream
    #[error(transparent)]
    Decode(#[from] DecodeFault),

    /// Book would go negative; halts the current stream
    #[error(transparent)]
    BookIntegrity(#[from] BookIntegrityFault),

    /// Invalid engine configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// I/O failure in a source or an exporter
    #[error("IO error: {0}")]
    Io(String),

    /// Generic error with context
    #[error("Error: {0}")]
    Generic(String),
}

impl ReplayError {
    /// Create a generic error from any string-like type.
    pub fn generic(msg: impl Into<String>) -> Self {
        ReplayError::Generic(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        ReplayError::Config(msg.into())
    }

    /// True for the two faults that abort a stream.
    pub fn is_stream_fault(&self) -> bool {
        matches!(self, ReplayError::Decode(_) | ReplayError::BookIntegrity(_))
    }

    /// Line position of a stream fault.
    pub fn line_no(&self) -> Option<u64> {
        match self {
            ReplayError::Decode(f) => Some(f.line_no),
            ReplayError::BookIntegrity(f) => Some(f.line_no),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ReplayError {
    fn from(err: std::io::Error) -> Self {
        ReplayError::Io(err.to_string())
    }
}

impl From<csv::Error> for ReplayError {
    fn from(err: csv::Error) -> Self {
        ReplayError::Io(format!("CSV error: {err}"))
    }
}

impl From<serde_json::Error> for ReplayError {
    fn from(err: serde_json::Error) -> Self {
        ReplayError::Generic(format!("JSON error: {err}"))
    }
}
