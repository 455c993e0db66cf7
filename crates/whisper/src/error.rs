//! Whisper read errors.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, WhisperError>;

#[derive(Debug, Error)]
pub enum WhisperError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("truncated file: expected at least {expected} bytes, found {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("malformed header: {0}")]
    Malformed(String),

    #[error("archive index {index} out of range ({count} archives)")]
    ArchiveIndex { index: usize, count: usize },
}
