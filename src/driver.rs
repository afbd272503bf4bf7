//! Driver spawns and manages the acquisition task
//!
//! One task owns the channel and the frame ring for the whole run: it reads
//! framed messages, decodes them, records pixels into the ring and hands the
//! newest frame to the publisher. Status transitions are published on a
//! watch channel so callers can follow `Idle -> Running -> Stopping ->
//! Stopped` without touching the task.

use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::channel::{Channel, RawMessage};
use crate::config::AcquireConfig;
use crate::error::{AcquireError, Result};
use crate::publisher::{FramePublisher, FrameTap};
use crate::store::FrameRing;
use crate::types::SensorFrame;
use crate::wire::{FrameHeader, decode_pixels};

/// Lifecycle states of the acquisition loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Spawned but not yet reading.
    Idle,
    /// Reading messages from the channel.
    Running,
    /// Stop observed; closing the channel and flushing the publisher.
    Stopping,
    /// Terminal. A stopped loop is never resumed; reconnect instead.
    Stopped,
}

/// Why the loop left `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCause {
    /// `request_stop()` was called or the handle was dropped.
    Requested,
    /// The peer closed the channel, cleanly or mid-message.
    ChannelClosed,
    /// An unrecoverable error; the error itself is in the report.
    Fatal,
}

/// Snapshot of the loop's lifecycle, published on the status channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopStatus {
    /// Current lifecycle state.
    pub state: LoopState,
    /// Populated from `Stopping` onwards.
    pub stop_cause: Option<StopCause>,
}

impl LoopStatus {
    fn idle() -> Self {
        Self { state: LoopState::Idle, stop_cause: None }
    }

    fn running() -> Self {
        Self { state: LoopState::Running, stop_cause: None }
    }

    fn stopping(cause: StopCause) -> Self {
        Self { state: LoopState::Stopping, stop_cause: Some(cause) }
    }

    fn stopped(cause: StopCause) -> Self {
        Self { state: LoopState::Stopped, stop_cause: Some(cause) }
    }
}

/// Final accounting handed back when the acquisition task ends.
///
/// The frame ring rides along so recent pixel history stays inspectable
/// after shutdown.
#[derive(Debug)]
pub struct AcquisitionReport {
    /// Why the loop stopped.
    pub stop_cause: StopCause,
    /// The error behind a `StopCause::Fatal` stop.
    pub fatal_error: Option<AcquireError>,
    /// Well-formed frames decoded from the channel.
    pub frames_received: u64,
    /// Frames handed to the publisher.
    pub frames_published: u64,
    /// Header-only "no frame available" messages observed.
    pub sentinel_frames: u64,
    /// Messages that failed to decode, across the whole run.
    pub decode_failures: u64,
    /// The ring, with whatever pixel history the run left in it.
    pub store: FrameRing,
}

/// Result of spawning the acquisition task
pub struct DriverChannels {
    /// Consumer side of the latest-frame handoff
    pub frames: FrameTap,
    /// Receiver for loop lifecycle updates
    pub status: watch::Receiver<LoopStatus>,
    /// Cancellation token for graceful shutdown
    pub cancel: CancellationToken,
    /// Resolves with the final report once the loop reaches `Stopped`
    pub task: JoinHandle<AcquisitionReport>,
}

/// Driver spawns and manages the acquisition task
pub struct Driver;

impl Driver {
    /// Spawn the acquisition task over an already connected channel.
    ///
    /// Returns the frame tap, a status receiver, a cancellation token for
    /// graceful shutdown and the join handle yielding the final report.
    pub fn spawn<C>(channel: C, store: FrameRing, config: &AcquireConfig) -> DriverChannels
    where
        C: Channel,
    {
        let (publisher, frames) = FramePublisher::new();
        let (status_tx, status_rx) = watch::channel(LoopStatus::idle());
        let cancel = CancellationToken::new();

        let cancel_task = cancel.clone();
        let failure_threshold = config.decode_failure_threshold;

        let task = tokio::spawn(async move {
            acquisition_task(channel, store, publisher, status_tx, cancel_task, failure_threshold)
                .await
        });

        DriverChannels { frames, status: status_rx, cancel, task }
    }
}

/// Frames decoded between progress log lines.
const PROGRESS_EVERY: u64 = 1800;

/// Acquisition task - reads messages until the channel closes, a stop is
/// requested or an error proves unrecoverable.
async fn acquisition_task<C>(
    mut channel: C,
    mut store: FrameRing,
    publisher: FramePublisher,
    status_tx: watch::Sender<LoopStatus>,
    cancel: CancellationToken,
    failure_threshold: u32,
) -> AcquisitionReport
where
    C: Channel,
{
    info!("Acquisition task started");
    status_tx.send_replace(LoopStatus::running());

    let mut frames_received = 0u64;
    let mut frames_published = 0u64;
    let mut sentinel_frames = 0u64;
    let mut decode_failures = 0u64;
    let mut consecutive_failures = 0u32;

    let (stop_cause, fatal_error) = loop {
        // Check for cancellation between messages
        if cancel.is_cancelled() {
            info!("Acquisition cancelled");
            break (StopCause::Requested, None);
        }

        // Use select so a stop request interrupts a parked read instead of
        // waiting for the peer to produce one more message
        let result = tokio::select! {
            _ = cancel.cancelled() => {
                info!("Acquisition cancelled during read");
                break (StopCause::Requested, None);
            }
            result = channel.read_message() => result,
        };

        match result {
            Ok(Some(raw)) => match decode_frame(&raw) {
                Ok(Some(frame)) => {
                    consecutive_failures = 0;
                    frames_received += 1;

                    trace!(
                        "Frame {}: id={}, {}x{}",
                        frames_received, frame.frame_id, frame.width, frame.height
                    );

                    match store.write(&frame) {
                        Ok(outcome) => {
                            if outcome.wrapped {
                                debug!(
                                    "Ring wrapped (wrap #{}) at frame {}",
                                    store.wrap_count(),
                                    frames_received
                                );
                            }
                        }
                        Err(e) => {
                            error!("Frame does not fit the ring: {}", e);
                            break (StopCause::Fatal, Some(e));
                        }
                    }

                    publisher.publish(Arc::new(frame));
                    frames_published += 1;

                    if frames_received % PROGRESS_EVERY == 0 {
                        debug!(
                            "Acquired {} frames so far ({} sentinels, {} decode failures, {} ring wraps)",
                            frames_received,
                            sentinel_frames,
                            decode_failures,
                            store.wrap_count()
                        );
                    }
                }
                Ok(None) => {
                    // Sentinel: the producer had nothing for us. A well-formed
                    // message, so the consecutive failure streak ends here.
                    sentinel_frames += 1;
                    consecutive_failures = 0;
                    trace!("No frame available (sentinel {})", sentinel_frames);
                }
                Err(e) => {
                    decode_failures += 1;
                    consecutive_failures += 1;
                    warn!(
                        "Malformed message ({}/{}): {}",
                        consecutive_failures, failure_threshold, e
                    );

                    if consecutive_failures >= failure_threshold {
                        error!("Too many consecutive decode failures, shutting down");
                        break (StopCause::Fatal, Some(e));
                    }
                }
            },
            Ok(None) => {
                info!("Channel closed by peer after {} frames", frames_received);
                break (StopCause::ChannelClosed, None);
            }
            Err(AcquireError::ChannelClosed) => {
                info!("Channel closed mid-message after {} frames", frames_received);
                break (StopCause::ChannelClosed, None);
            }
            Err(e @ AcquireError::MalformedHeader { .. }) => {
                // The channel could not even frame the message. Count it like
                // any other decode failure; if the stream is desynchronized
                // for good, the streak escalates below.
                decode_failures += 1;
                consecutive_failures += 1;
                warn!(
                    "Unframeable message ({}/{}): {}",
                    consecutive_failures, failure_threshold, e
                );

                if consecutive_failures >= failure_threshold {
                    error!("Too many consecutive decode failures, shutting down");
                    break (StopCause::Fatal, Some(e));
                }
            }
            Err(e) => {
                error!("Channel read failed: {}", e);
                break (StopCause::Fatal, Some(e));
            }
        }
    };

    status_tx.send_replace(LoopStatus::stopping(stop_cause));

    if let Err(e) = channel.close().await {
        warn!("Channel close reported an error: {}", e);
    }

    // End-of-stream marker; taps and streams resolve with None from here on
    publisher.finish();

    status_tx.send_replace(LoopStatus::stopped(stop_cause));
    info!(
        "Acquisition task ended: {} frames, {} sentinels, {} decode failures ({:?})",
        frames_received, sentinel_frames, decode_failures, stop_cause
    );

    AcquisitionReport {
        stop_cause,
        fatal_error,
        frames_received,
        frames_published,
        sentinel_frames,
        decode_failures,
        store,
    }
}

/// Decode one framed message into a frame, `None` for sentinels.
fn decode_frame(raw: &RawMessage) -> Result<Option<SensorFrame>> {
    let header = FrameHeader::decode(raw.header())?;
    if header.is_sentinel() {
        return Ok(None);
    }
    header.validate()?;
    let pixels = decode_pixels(raw.payload(), header.payload_pixels())?;
    SensorFrame::from_wire(&header, pixels).map(Some)
}
