//! Single-slot frame handoff between the acquisition task and its consumer.
//!
//! The producer side ([`FramePublisher`]) replaces whatever frame is pending
//! on every publish; an unread previous frame is simply dropped. There is no
//! queueing and no backpressure, so a slow consumer (a render pass, say) can
//! never stall acquisition - it just skips frames. The consumer side
//! ([`FrameTap`]) offers a non-blocking `try_take`, an awaiting `next_frame`,
//! and a `Stream` adapter.
//!
//! Built on `tokio::sync::watch`; the terminal `None` value marks the end of
//! the stream once the acquisition loop stops.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::types::SensorFrame;

/// Producer side of the latest-frame-wins handoff.
#[derive(Debug)]
pub struct FramePublisher {
    tx: watch::Sender<Option<Arc<SensorFrame>>>,
}

impl FramePublisher {
    /// Create a connected publisher/tap pair.
    pub fn new() -> (Self, FrameTap) {
        let (tx, rx) = watch::channel(None);
        (Self { tx }, FrameTap { rx })
    }

    /// Hand the latest frame to the consumer, replacing any unread one.
    ///
    /// Never blocks and never fails; publishing with no live tap is a no-op.
    pub fn publish(&self, frame: Arc<SensorFrame>) {
        self.tx.send_replace(Some(frame));
    }

    /// Mark the end of the stream. Taps see no more frames after this.
    pub fn finish(&self) {
        self.tx.send_replace(None);
    }
}

/// Consumer side of the latest-frame-wins handoff.
///
/// Clones are independent: each tap tracks what it has seen, so two
/// consumers can both observe the same published frame.
#[derive(Debug, Clone)]
pub struct FrameTap {
    rx: watch::Receiver<Option<Arc<SensorFrame>>>,
}

impl FrameTap {
    /// Take the pending frame, if one was published since the last look.
    ///
    /// Non-blocking, at most once per published frame: returns `None` both
    /// before the first publish and when the pending frame was already
    /// taken.
    pub fn try_take(&mut self) -> Option<Arc<SensorFrame>> {
        if !self.rx.has_changed().unwrap_or(false) {
            return None;
        }
        self.rx.borrow_and_update().clone()
    }

    /// Wait for the next published frame.
    ///
    /// Resolves with the newest unseen frame, or `None` once the acquisition
    /// loop has stopped publishing.
    pub async fn next_frame(&mut self) -> Option<Arc<SensorFrame>> {
        if self.rx.changed().await.is_err() {
            return None;
        }
        self.rx.borrow_and_update().clone()
    }

    /// Peek at the most recently published frame without consuming it.
    pub fn latest(&self) -> Option<Arc<SensorFrame>> {
        self.rx.borrow().clone()
    }

    /// Frames as a `Stream`, ending when the acquisition loop stops.
    ///
    /// The stream yields the currently pending frame immediately (if any),
    /// then every publish it can keep up with; intermediate frames are
    /// dropped while the consumer is busy, which is the whole point of the
    /// single slot.
    pub fn into_stream(self) -> impl Stream<Item = Arc<SensorFrame>> + Send + 'static {
        // WatchStream yields the current value immediately. Leading `None`s
        // mean no frame has arrived yet and must not end the stream; after
        // frames have flowed, the first `None` is the end-of-stream marker.
        WatchStream::new(self.rx)
            .skip_while(|opt| {
                let is_none = opt.is_none();
                async move { is_none }
            })
            .take_while(|opt| {
                let is_some = opt.is_some();
                async move { is_some }
            })
            .filter_map(|opt| async move { opt })
    }
}
