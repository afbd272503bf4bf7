//! Acquisition configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{AcquireError, Result};
use crate::wire::HEADER_SIZE;

/// Configuration for one acquisition.
///
/// The defaults match a typical detector host setup; embed the struct in an
/// application config file and override what differs. All sizes are fixed for
/// the lifetime of the acquisition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquireConfig {
    /// Name of the producer's channel endpoint.
    pub channel: String,

    /// Ring capacity expressed in maximum-size frames.
    pub ring_frames: usize,

    /// Upper bound on one message (header + payload) in bytes. Headers
    /// declaring more than this are treated as malformed rather than read.
    pub max_message_bytes: usize,

    /// Consecutive malformed messages tolerated before the loop stops.
    pub decode_failure_threshold: u32,

    /// Producer frame rate in Hz, used to normalize consumer update rates.
    pub source_hz: f64,

    /// Directory for the Unix socket endpoint; the system temp directory
    /// when unset. Ignored on Windows.
    pub endpoint_dir: Option<PathBuf>,
}

impl Default for AcquireConfig {
    fn default() -> Self {
        Self {
            channel: "PipeOutput".to_string(),
            ring_frames: 16,
            max_message_bytes: 2_000_000,
            decode_failure_threshold: 5,
            source_hz: 30.0,
            endpoint_dir: None,
        }
    }
}

impl AcquireConfig {
    /// Config with everything defaulted except the channel name.
    pub fn for_channel(channel: impl Into<String>) -> Self {
        Self { channel: channel.into(), ..Self::default() }
    }

    /// Check the configuration is usable before opening anything.
    pub fn validate(&self) -> Result<()> {
        if self.channel.is_empty() {
            return Err(AcquireError::invalid_config("channel name must not be empty"));
        }
        if self.ring_frames == 0 {
            return Err(AcquireError::invalid_config("ring_frames must be at least 1"));
        }
        if self.max_message_bytes <= HEADER_SIZE {
            return Err(AcquireError::invalid_config(format!(
                "max_message_bytes must exceed the {HEADER_SIZE} byte header"
            )));
        }
        if self.decode_failure_threshold == 0 {
            return Err(AcquireError::invalid_config(
                "decode_failure_threshold must be at least 1",
            ));
        }
        if !(self.source_hz > 0.0) {
            return Err(AcquireError::invalid_config("source_hz must be positive"));
        }
        Ok(())
    }

    /// Largest pixel count a single frame can declare under the message cap.
    pub fn max_frame_pixels(&self) -> usize {
        (self.max_message_bytes - HEADER_SIZE) / 2
    }

    /// Total pixel capacity of the ring.
    pub fn ring_capacity_pixels(&self) -> usize {
        self.ring_frames * self.max_frame_pixels()
    }

    /// Unix socket path for the channel endpoint.
    pub fn socket_path(&self) -> PathBuf {
        self.endpoint_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
            .join(format!("{}.sock", self.channel))
    }

    /// Windows named pipe path for the channel endpoint.
    pub fn pipe_name(&self) -> String {
        format!(r"\\.\pipe\{}", self.channel)
    }
}
