//! Real-time sensor frame acquisition from detector host processes.
//!
//! Lightbox connects to a detector host over a named byte channel, decodes
//! the fixed-layout frame messages it emits and fans the frames out two
//! ways: the newest frame is always available to a live consumer through a
//! latest-wins publisher, and recent pixel history accumulates in a lossy
//! ring store for post-run inspection.
//!
//! # Features
//!
//! - **Live frames**: streaming from a running detector host process
//! - **Lossy by construction**: a slow consumer skips frames, never stalls
//!   acquisition
//! - **Bounded memory**: pixel history lives in a fixed-size ring
//! - **Graceful shutdown**: peer closure, stop requests and fatal errors all
//!   converge on one orderly stop path
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use lightbox::{AcquireConfig, Lightbox, UpdateRate};
//!
//! #[tokio::main]
//! async fn main() -> lightbox::Result<()> {
//!     let acquisition = Lightbox::connect(AcquireConfig::default()).await?;
//!
//!     let mut frames = acquisition.subscribe(UpdateRate::Max(10));
//!     while let Some(frame) = frames.next().await {
//!         println!("frame {}: {}x{}", frame.frame_id, frame.width, frame.height);
//!     }
//!
//!     let report = acquisition.stopped().await?;
//!     println!("acquired {} frames", report.frames_received);
//!     Ok(())
//! }
//! ```

// Core types and error handling
mod config;
mod error;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Acquisition architecture
pub mod channel;
pub mod driver;
pub mod publisher;
pub mod store;
pub mod stream;
pub mod wire;

// Core exports
pub use config::AcquireConfig;
pub use error::*;
pub use types::*;

// Pipeline exports
pub use channel::{Channel, RawMessage};
pub use driver::{AcquisitionReport, Driver, DriverChannels, LoopState, LoopStatus, StopCause};
pub use publisher::{FramePublisher, FrameTap};
pub use store::{FrameRing, SlotMeta, SlotStatus, WriteOutcome};
pub use wire::{FrameHeader, HEADER_SIZE, SENTINEL_NO_FRAME};

#[cfg(any(unix, windows))]
pub use channel::PipeChannel;

use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::stream::ThrottleExt;

/// Unified entry point for frame acquisition.
///
/// # Examples
///
/// ## Connect to a running detector host
///
/// ```rust,no_run
/// use lightbox::{AcquireConfig, Lightbox};
///
/// #[tokio::main]
/// async fn main() -> lightbox::Result<()> {
///     let acquisition = Lightbox::connect(AcquireConfig::for_channel("PipeOutput")).await?;
///     // Use acquisition...
///     Ok(())
/// }
/// ```
pub struct Lightbox;

impl Lightbox {
    /// Connect to a detector host's named channel and start acquiring.
    ///
    /// Opens the channel endpoint named in the config (a Unix domain socket
    /// or a Windows named pipe, depending on platform), builds the frame
    /// ring and spawns the acquisition task.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid or no producer is
    /// listening on the named endpoint. Connection errors are retryable;
    /// callers typically wait for the detector host to come up and try
    /// again.
    #[cfg(any(unix, windows))]
    pub async fn connect(config: AcquireConfig) -> Result<Acquisition> {
        config.validate()?;
        info!("Connecting to frame producer on channel '{}'", config.channel);

        let channel = PipeChannel::connect(&config).await?;
        Self::attach(channel, config).await
    }

    /// Start acquiring over an already connected channel.
    ///
    /// The transport-agnostic sibling of [`Lightbox::connect`]; anything
    /// implementing [`Channel`] works, which is how tests drive the loop
    /// with scripted messages.
    pub async fn attach<C>(channel: C, config: AcquireConfig) -> Result<Acquisition>
    where
        C: Channel,
    {
        config.validate()?;

        let store = FrameRing::new(config.ring_capacity_pixels(), config.ring_frames)?;
        let source_hz = config.source_hz;
        let channels = Driver::spawn(channel, store, &config);

        info!("Acquisition started on channel '{}' ({}Hz source)", config.channel, source_hz);

        Ok(Acquisition {
            frames: channels.frames,
            status: channels.status,
            cancel: channels.cancel,
            task: Some(channels.task),
            source_hz,
        })
    }
}

/// Handle to a running acquisition.
///
/// Frames arrive through [`frames`](Acquisition::frames) or
/// [`subscribe`](Acquisition::subscribe); lifecycle is observed through
/// [`status`](Acquisition::status) and steered with
/// [`request_stop`](Acquisition::request_stop). Dropping the handle also
/// requests a stop.
pub struct Acquisition {
    frames: FrameTap,
    status: watch::Receiver<LoopStatus>,
    cancel: CancellationToken,
    task: Option<JoinHandle<AcquisitionReport>>,
    source_hz: f64,
}

impl Acquisition {
    /// A tap on the latest-frame slot.
    ///
    /// Each returned tap observes independently; clone freely.
    pub fn frames(&self) -> FrameTap {
        self.frames.clone()
    }

    /// Subscribe to frames as a stream.
    ///
    /// `UpdateRate::Native` delivers at the producer's pace;
    /// `UpdateRate::Max(hz)` throttles with latest-wins coalescing. The
    /// stream ends when the acquisition loop stops.
    pub fn subscribe(&self, rate: UpdateRate) -> impl Stream<Item = Arc<SensorFrame>> + Send + 'static {
        let frames = self.frames.clone().into_stream();

        match rate.throttle_interval(self.source_hz) {
            None => frames.boxed(),
            Some(interval) => frames.throttle(interval).boxed(),
        }
    }

    /// Receiver for lifecycle updates, `Idle` through `Stopped`.
    pub fn status(&self) -> watch::Receiver<LoopStatus> {
        self.status.clone()
    }

    /// The loop's current lifecycle state.
    pub fn state(&self) -> LoopState {
        self.status.borrow().state
    }

    /// The nominal frame rate of the producer, from the config.
    pub fn source_hz(&self) -> f64 {
        self.source_hz
    }

    /// Ask the acquisition loop to stop.
    ///
    /// Returns immediately; the loop observes the request even while parked
    /// in a read. Await [`stopped`](Acquisition::stopped) for the final
    /// report.
    pub fn request_stop(&self) {
        info!("Stop requested");
        self.cancel.cancel();
    }

    /// Wait for the loop to reach `Stopped` and take the final report.
    ///
    /// Does not itself request a stop: call
    /// [`request_stop`](Acquisition::request_stop) first, or let the peer
    /// close the channel.
    pub async fn stopped(mut self) -> Result<AcquisitionReport> {
        let task = self
            .task
            .take()
            .ok_or_else(|| AcquireError::internal("acquisition task already joined"))?;

        task.await
            .map_err(|e| AcquireError::internal(format!("acquisition task failed: {}", e)))
    }
}

impl Drop for Acquisition {
    fn drop(&mut self) {
        debug!("Dropping acquisition handle");
        // Cancel the task on drop for clean shutdown
        self.cancel.cancel();
    }
}
