//! Named byte-channel endpoint.
//!
//! Connects to the producer's named channel and performs the header-driven
//! framing read: 44 header bytes first, then exactly the payload the header
//! declares. Sentinel headers end the message immediately (the producer
//! writes them header-only).

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, trace};

use super::{Channel, RawMessage};
use crate::config::AcquireConfig;
use crate::error::{AcquireError, Result};
use crate::wire::{FrameHeader, HEADER_SIZE};

#[cfg(unix)]
type Endpoint = tokio::net::UnixStream;
#[cfg(windows)]
type Endpoint = tokio::net::windows::named_pipe::NamedPipeClient;

/// Production channel over the platform's named duplex byte stream.
///
/// Unix uses a domain socket at `<dir>/<name>.sock`; Windows opens the
/// `\\.\pipe\<name>` client end. The producer must have created the endpoint
/// before [`PipeChannel::connect`] is called; a missing or busy endpoint
/// surfaces as a retryable [`AcquireError::Connection`].
#[cfg(any(unix, windows))]
#[derive(Debug)]
pub struct PipeChannel {
    endpoint: Option<Endpoint>,
    max_message_bytes: usize,
}

#[cfg(any(unix, windows))]
impl PipeChannel {
    /// Open the named endpoint described by `config`.
    pub async fn connect(config: &AcquireConfig) -> Result<Self> {
        #[cfg(unix)]
        let endpoint = {
            let path = config.socket_path();
            tokio::net::UnixStream::connect(&path).await.map_err(|e| {
                AcquireError::connection_failed_with_source(
                    format!("unix socket {} not reachable", path.display()),
                    Box::new(e),
                )
            })?
        };

        #[cfg(windows)]
        let endpoint = {
            let name = config.pipe_name();
            tokio::net::windows::named_pipe::ClientOptions::new().open(&name).map_err(|e| {
                AcquireError::connection_failed_with_source(
                    format!("named pipe {name} not reachable"),
                    Box::new(e),
                )
            })?
        };

        debug!(channel = %config.channel, "connected to frame channel");
        Ok(Self { endpoint: Some(endpoint), max_message_bytes: config.max_message_bytes })
    }

    #[cfg(all(test, unix))]
    fn from_stream(stream: Endpoint, max_message_bytes: usize) -> Self {
        Self { endpoint: Some(stream), max_message_bytes }
    }
}

#[cfg(any(unix, windows))]
#[async_trait::async_trait]
impl Channel for PipeChannel {
    async fn read_message(&mut self) -> Result<Option<RawMessage>> {
        let endpoint = match self.endpoint.as_mut() {
            Some(endpoint) => endpoint,
            None => return Ok(None),
        };

        // The first chunk distinguishes a clean close (zero bytes at a
        // message boundary) from a peer vanishing mid-message.
        let mut head = [0u8; HEADER_SIZE];
        let n = endpoint.read(&mut head).await?;
        if n == 0 {
            debug!("peer closed the frame channel");
            return Ok(None);
        }
        if n < HEADER_SIZE {
            endpoint.read_exact(&mut head[n..]).await?;
        }

        let header = FrameHeader::decode(&head)?;
        if header.is_sentinel() {
            trace!("sentinel message, no payload follows");
            return Ok(Some(RawMessage::new(head.to_vec())));
        }

        let message_len = HEADER_SIZE + header.payload_bytes();
        if message_len > self.max_message_bytes {
            return Err(AcquireError::malformed_header(
                "message framing",
                format!(
                    "{}x{} header declares a {} byte message, cap is {}",
                    header.width, header.height, message_len, self.max_message_bytes
                ),
            ));
        }

        let mut bytes = vec![0u8; message_len];
        bytes[..HEADER_SIZE].copy_from_slice(&head);
        endpoint.read_exact(&mut bytes[HEADER_SIZE..]).await?;
        trace!(frame_id = header.frame_id, len = message_len, "read frame message");
        Ok(Some(RawMessage::new(bytes)))
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut endpoint) = self.endpoint.take() {
            // The peer may already be gone; close stays quiet either way.
            if let Err(e) = endpoint.shutdown().await {
                trace!(error = %e, "endpoint shutdown during close");
            }
            debug!("frame channel closed");
        }
        Ok(())
    }
}
