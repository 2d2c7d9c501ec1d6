//! Error types
//!
//! Every failure the pipeline can report to a caller.

use std::io;

use thiserror::Error;

/// Errors raised by the frame pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// The negotiated geometry is malformed. The pipeline keeps its prior state.
    #[error("invalid buffer format: {0}")]
    InvalidFormat(String),

    /// The OS refused to pin a plane. No partially pinned state is kept.
    #[error("failed to pin plane {plane} ({len} bytes): {source}")]
    PinFailed {
        plane: usize,
        len: usize,
        #[source]
        source: io::Error,
    },

    /// The allocator returned no memory for a plane.
    #[error("failed to allocate {size} bytes for a frame plane")]
    AllocationFailed { size: usize },

    /// The thread holding the frame permit tried to acquire it again.
    #[error("frame permit acquired twice by the same thread")]
    ReentrancyViolation,

    /// The frame permit was released while nobody held it.
    #[error("frame permit released without being held")]
    NotHeld,

    /// A frame was locked before any format was negotiated.
    #[error("no buffer format has been negotiated")]
    NotConfigured,

    /// A readiness wait exceeded its budget.
    #[error("timed out waiting for readiness")]
    TimedOut,

    #[error("failed to read configuration: {0}")]
    Io(#[from] io::Error),

    #[error("failed to parse configuration: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn invalid_format(msg: impl Into<String>) -> Self {
        Error::InvalidFormat(msg.into())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = Error::invalid_format("zero planes");
        assert_eq!(err.to_string(), "invalid buffer format: zero planes");

        let err = Error::PinFailed {
            plane: 1,
            len: 4096,
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        assert!(err.to_string().starts_with("failed to pin plane 1 (4096 bytes)"));
    }
}
