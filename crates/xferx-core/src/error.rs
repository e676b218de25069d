//! The closed error taxonomy every L1+ layer maps its failures into.
//!
//! Format drivers see dozens of distinct on-disk failure modes (a bad
//! checksum, a retrieval pointer past EOF, a directory segment that
//! doesn't chain); all of them collapse into one of these variants so
//! that callers above `xferx-fs` never need to match on a per-format
//! error type.

#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    Exists(String),

    #[error("not a directory: {0}")]
    NotDirectory(String),

    #[error("no space left on device")]
    NoSpace,

    #[error("volume is mounted read-only")]
    ReadOnly,

    #[error("corrupt on-disk structure: {0}")]
    Corrupt(String),

    #[error("device I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid argument: {0}")]
    Invalid(String),
}

pub type FsResult<T> = Result<T, FsError>;
