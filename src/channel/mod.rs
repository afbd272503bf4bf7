//! Channel client for the producer's named byte stream.
//!
//! The producer process writes frame messages into a named duplex byte
//! channel; this module owns the consuming endpoint. [`Channel`] is the
//! transport seam: the acquisition loop only ever sees complete
//! [`RawMessage`]s, so alternate transports and scripted test doubles plug in
//! without touching the loop. [`PipeChannel`] is the production
//! implementation over a Unix domain socket or a Windows named pipe.

mod pipe;

#[cfg(any(unix, windows))]
pub use pipe::PipeChannel;

use crate::Result;
use crate::wire::HEADER_SIZE;

/// One channel read's worth of bytes: a frame header plus its payload.
///
/// Sentinel messages carry no payload, so their length is exactly
/// [`HEADER_SIZE`].
#[derive(Debug, Clone)]
pub struct RawMessage {
    bytes: Vec<u8>,
}

impl RawMessage {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Whole message as delivered by the channel.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The leading header bytes (the whole message when it is shorter than a
    /// header, which the codec will reject).
    pub fn header(&self) -> &[u8] {
        &self.bytes[..self.bytes.len().min(HEADER_SIZE)]
    }

    /// The payload bytes following the header.
    pub fn payload(&self) -> &[u8] {
        &self.bytes[self.bytes.len().min(HEADER_SIZE)..]
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Trait for frame message transports
///
/// Channels abstract over how messages arrive (named pipe, socket, scripted
/// test feed) and deliver them one complete message at a time. The trait is
/// designed for simplicity - two methods cover all needs.
#[async_trait::async_trait]
pub trait Channel: Send + 'static {
    /// Read the next complete frame message.
    ///
    /// Returns:
    /// - `Ok(Some(message))` - One header-plus-payload message
    /// - `Ok(None)` - Peer closed the channel (normal termination)
    /// - `Err(e)` - `MalformedHeader` when the leading header cannot frame a
    ///   payload read, `ChannelClosed` when the peer vanished mid-message,
    ///   `Read` for unexpected transport failures
    ///
    /// The call awaits until a full message is available or the channel
    /// closes.
    async fn read_message(&mut self) -> Result<Option<RawMessage>>;

    /// Release the endpoint.
    ///
    /// Idempotent: closing an already-closed channel is a no-op, and
    /// subsequent reads report a closed channel.
    async fn close(&mut self) -> Result<()>;
}
