//! Error types for frame acquisition.
//!
//! All errors implement the `std::error::Error` trait and carry structured
//! context for debugging and recovery guidance.
//!
//! ## Error Categories
//!
//! - **Connection Errors**: the named channel endpoint could not be opened
//! - **Channel Closed**: the producer closed its end; expected termination
//! - **Read Errors**: unexpected transport failures mid-stream
//! - **Malformed Headers**: per-message decode failures, recovered locally
//! - **Config Errors**: invalid acquisition configuration or ring geometry
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use lightbox::AcquireError;
//!
//! let error = AcquireError::connection_failed("producer endpoint not found");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use thiserror::Error;

/// Result type alias for acquisition operations.
pub type Result<T, E = AcquireError> = std::result::Result<T, E>;

/// Main error type for acquisition operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AcquireError {
    #[error("Failed to connect to frame channel: {reason}")]
    Connection {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The producer closed its end of the channel. This is the normal way a
    /// stream ends and drives a graceful stop, never an application failure.
    #[error("Frame channel closed by peer")]
    ChannelClosed,

    #[error("Channel read failed: {context}")]
    Read {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed frame header in {context}: {details}")]
    MalformedHeader { context: String, details: String },

    #[error("Invalid acquisition config: {reason}")]
    Config { reason: String },

    #[error("Internal error: {context}")]
    Internal { context: String },
}

impl AcquireError {
    /// Returns whether this error is potentially recoverable through retry.
    ///
    /// `Connection` failures may clear once the producer is up; a
    /// `MalformedHeader` skips one message and the loop keeps reading.
    /// Everything else is terminal for the operation that produced it.
    pub fn is_retryable(&self) -> bool {
        match self {
            AcquireError::Connection { .. } => true,
            AcquireError::MalformedHeader { .. } => true,
            AcquireError::ChannelClosed => false,
            AcquireError::Read { .. } => false,
            AcquireError::Config { .. } => false,
            AcquireError::Internal { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            AcquireError::Connection { .. } => vec![
                "Ensure the producer process is running and has created the endpoint",
                "Check the channel name matches the producer's",
                "Verify permissions on the endpoint path",
            ],
            AcquireError::ChannelClosed => vec![
                "Restart the producer to resume streaming",
                "Open a fresh acquisition once the endpoint exists again",
            ],
            AcquireError::Read { .. } => vec![
                "Check the producer process is healthy",
                "Inspect system logs for transport-level failures",
            ],
            AcquireError::MalformedHeader { .. } => vec![
                "Verify producer and consumer agree on the header layout",
                "Check for a desynchronized stream after a producer restart",
            ],
            AcquireError::Config { .. } => vec![
                "Review ring capacity and message size settings",
                "Check the configuration against the producer's frame sizes",
            ],
            AcquireError::Internal { .. } => vec![
                "Restart the acquisition",
                "Report the error context upstream",
            ],
        }
    }

    /// Helper constructor for connection errors.
    pub fn connection_failed(reason: impl Into<String>) -> Self {
        AcquireError::Connection { reason: reason.into(), source: None }
    }

    /// Helper constructor for connection errors with source.
    pub fn connection_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        AcquireError::Connection { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for transport read errors.
    pub fn read_failed(context: impl Into<String>, source: std::io::Error) -> Self {
        AcquireError::Read { context: context.into(), source }
    }

    /// Helper constructor for malformed header errors.
    pub fn malformed_header(context: impl Into<String>, details: impl Into<String>) -> Self {
        AcquireError::MalformedHeader { context: context.into(), details: details.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        AcquireError::Config { reason: reason.into() }
    }

    /// Helper constructor for internal invariant breaches.
    pub fn internal(context: impl Into<String>) -> Self {
        AcquireError::Internal { context: context.into() }
    }
}

impl From<std::io::Error> for AcquireError {
    /// Peer-closure error kinds collapse into [`AcquireError::ChannelClosed`]
    /// so `?` in read paths reports a closed channel rather than a transport
    /// fault; everything else becomes a [`AcquireError::Read`].
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::UnexpectedEof
            | ErrorKind::BrokenPipe
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted => AcquireError::ChannelClosed,
            _ => AcquireError::Read { context: "channel i/o".to_string(), source: err },
        }
    }
}
