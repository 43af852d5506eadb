//! Error types for the synthesis engine and the database builder.
//!
//! The taxonomy is deliberately closed: every failure surfaced to a caller is
//! one of these variants, and each variant maps to a stable negative integer
//! code that the CLI prints alongside the display message.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while building or using a unit database.
#[derive(Debug, Error)]
pub enum Error {
    /// A caller-supplied argument was unusable.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A required file does not exist.
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    /// Reading from disk (or mapping a file) failed.
    #[error("file read error: {0}")]
    Read(#[source] std::io::Error),

    /// Writing to disk failed.
    #[error("file write error: {0}")]
    Write(#[source] std::io::Error),

    /// The database image is malformed (bad magic, truncated, out-of-range
    /// offsets, non-UTF-8 unit text).
    #[error("invalid database format: {0}")]
    InvalidFormat(String),

    /// An allocation was refused. Kept for the stable code table; Rust's
    /// global allocator aborts before this can normally be observed.
    #[error("out of memory")]
    OutOfMemory,

    /// A training WAV file could not be decoded as 16-bit PCM.
    #[error("invalid WAV file: {0}")]
    InvalidWav(String),

    /// The database was written by an incompatible engine version.
    #[error("database version mismatch (found {found}, expected {expected})")]
    VersionMismatch { found: u32, expected: u32 },
}

impl Error {
    /// Stable negative code for each variant, for display and scripting.
    pub fn code(&self) -> i32 {
        match self {
            Error::InvalidArgument(_) => -1,
            Error::FileNotFound(_) => -2,
            Error::Read(_) => -3,
            Error::Write(_) => -4,
            Error::InvalidFormat(_) => -5,
            Error::OutOfMemory => -6,
            Error::InvalidWav(_) => -7,
            Error::VersionMismatch { .. } => -8,
        }
    }
}

/// Result type for engine and builder operations.
pub type Result<T> = std::result::Result<T, Error>;
