//! Error types for stream and process-stream operations.
//!
//! Every variant that originates in a syscall keeps the raw errno so the ABI
//! layer can publish it unchanged.

use thiserror::Error;

/// Failure to open a file stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OpenError {
    /// The mode string is not one of `r`, `r+`, `w`, `w+`, `a`, `a+`.
    #[error("invalid open mode {0:?}")]
    InvalidMode(String),
    /// `open(2)` failed.
    #[error("open failed (errno {0})")]
    Os(i32),
}

impl OpenError {
    /// errno value to report for this failure.
    #[must_use]
    pub fn errno(&self) -> i32 {
        match self {
            Self::InvalidMode(_) => libc::EINVAL,
            Self::Os(errno) => *errno,
        }
    }
}

/// Failure to start a process stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpawnError {
    /// The direction string is neither `r` nor `w`.
    #[error("invalid process stream direction {0:?}")]
    InvalidDirection(String),
    /// The command line contains an interior NUL byte.
    #[error("command contains an interior NUL byte")]
    InvalidCommand,
    /// `pipe(2)` or `fork(2)` failed.
    #[error("spawn failed (errno {0})")]
    Os(i32),
    /// The shell could not be executed in the child.
    #[error("exec of shell failed in child (errno {0})")]
    Exec(i32),
}

impl SpawnError {
    /// errno value to report for this failure.
    #[must_use]
    pub fn errno(&self) -> i32 {
        match self {
            Self::InvalidDirection(_) | Self::InvalidCommand => libc::EINVAL,
            Self::Os(errno) | Self::Exec(errno) => *errno,
        }
    }
}

/// Outcome of a failed stream operation.
///
/// `Eof` and `Os` both latch the stream's sticky flags; the variant tells the
/// caller which of the two actually happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StreamError {
    /// The descriptor reported end of data.
    #[error("end of file")]
    Eof,
    /// A read, write, seek or close syscall failed.
    #[error("I/O error (errno {0})")]
    Os(i32),
    /// Waiting for the child of a process stream failed.
    #[error("waitpid failed (errno {0})")]
    Child(i32),
}

impl StreamError {
    /// errno value to report for this failure (0 for a clean end of file).
    #[must_use]
    pub fn errno(&self) -> i32 {
        match self {
            Self::Eof => 0,
            Self::Os(errno) | Self::Child(errno) => *errno,
        }
    }

    /// True if this is a clean end of data rather than an I/O failure.
    #[must_use]
    pub fn is_eof(&self) -> bool {
        matches!(self, Self::Eof)
    }
}
