use std::path::PathBuf;
use thiserror::Error;

/// Errors the index can return. Key/value absence on `get`/`delete` is
/// never an error — those operations return `Option`/`bool` instead.
#[derive(Error, Debug)]
pub enum HashIndexError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unknown MAGIC in header of {path:?}")]
    InvalidMagic { path: PathBuf },

    #[error("incorrect file length for {path:?} (expected {expected}, got {actual})")]
    LengthMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("invalid key_size/value_size ({key_size}, {value_size})")]
    InvalidWidth { key_size: usize, value_size: usize },

    #[error("key has width {actual}, index expects {expected}")]
    KeyWidthMismatch { expected: usize, actual: usize },

    #[error("value has width {actual}, index expects {expected}")]
    ValueWidthMismatch { expected: usize, actual: usize },

    #[error("hash table capacity overflow")]
    CapacityOverflow,
}

pub type Result<T> = std::result::Result<T, HashIndexError>;
