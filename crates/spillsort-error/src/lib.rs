use std::path::PathBuf;

use spillsort_types::{CompareError, DecodeError};
use thiserror::Error;

/// Primary error type for spillsort operations.
///
/// Structured variants for the cases callers can react to; no recovery is
/// attempted inside the engine. A sorter that surfaces one of these from
/// `output` is terminal.
#[derive(Error, Debug)]
pub enum SortError {
    /// Invalid or missing builder option, or a missing temp directory.
    #[error("invalid sorter configuration: {detail}")]
    Config { detail: String },

    /// `input` was called after `output` began.
    #[error("input after output has begun")]
    WrongPhase,

    /// Any public call after `close`.
    #[error("sorter has been closed")]
    AlreadyClosed,

    /// The typed comparator refused a key comparison.
    #[error("key comparison failed: {0}")]
    Compare(#[from] CompareError),

    /// A value failed to encode or decode.
    #[error("value codec error: {0}")]
    Codec(DecodeError),

    /// A run file violated the block framing: short read, truncated header,
    /// arity mismatch, or trailing payload bytes.
    #[error("malformed run file: {detail}")]
    MalformedRun { detail: String },

    /// Underlying filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A registered run produced no rows during merge init.
    #[error("registered run is empty: '{file}'")]
    EmptyRun { file: PathBuf },

    /// Internal misuse or a sorter already in a failed state.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SortError {
    /// Create a configuration error.
    pub fn config(detail: impl Into<String>) -> Self {
        Self::Config {
            detail: detail.into(),
        }
    }

    /// Create a malformed-run error.
    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::MalformedRun {
            detail: detail.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<DecodeError> for SortError {
    /// Truncated input while decoding a run payload is a framing defect;
    /// anything else is a codec failure.
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::UnexpectedEnd => Self::malformed("payload ended mid-value"),
            other => Self::Codec(other),
        }
    }
}

/// Result type alias using [`SortError`].
pub type Result<T> = std::result::Result<T, SortError>;
