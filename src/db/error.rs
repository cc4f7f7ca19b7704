use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Everything a store operation can fail with. Lookups that simply match
/// nothing are not errors; they come back as `Ok(None)` or a zero count.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{op} failed on {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{0} must not be empty")]
    EmptyKey(&'static str),

    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error(
        "{} is {len} bytes, not a multiple of the {record_size}-byte record size",
        path.display()
    )]
    Misaligned {
        path: PathBuf,
        len: u64,
        record_size: usize,
    },

    #[error("offset {offset} no longer addresses a record in {}", path.display())]
    StaleOffset { path: PathBuf, offset: u64 },

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("line {line}: expected `{expected}` label, found {found:?}")]
    Malformed {
        line: usize,
        expected: &'static str,
        found: String,
    },

    /// The delete/rename window of a rewrite failed. The original may already
    /// be gone, in which case the data only lives in `temp`.
    #[error(
        "CRITICAL: replacing {} with {} failed (original removed: {original_removed}): {source}",
        original.display(),
        temp.display()
    )]
    ReplaceFailed {
        original: PathBuf,
        temp: PathBuf,
        original_removed: bool,
        #[source]
        source: io::Error,
    },

    #[error("cannot (re)open {}: {source}", path.display())]
    Reopen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            op,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }

    /// The process cannot keep going without its backing file.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Reopen { .. })
    }

    /// The store may be inconsistent on disk and needs a human to look at it.
    pub fn is_critical(&self) -> bool {
        matches!(self, Self::ReplaceFailed { .. })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
