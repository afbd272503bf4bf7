//! Integration tests for the acquisition loop
//!
//! These tests drive the full pipeline (channel -> decode -> ring -> publisher)
//! through the public API, using a scripted channel that plays back a fixed
//! sequence of wire messages, errors and pauses.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tracing::info;

use lightbox::{
    AcquireConfig, AcquireError, Channel, FrameHeader, Lightbox, LoopState, RawMessage,
    SENTINEL_NO_FRAME, StopCause, UpdateRate,
};

/// One scripted action for [`ScriptedChannel`].
enum Step {
    /// Deliver a complete wire message.
    Message(Vec<u8>),
    /// Sleep before the next step, pacing the producer.
    Wait(Duration),
    /// Fail the read with this error.
    Error(AcquireError),
}

/// Channel that plays back a fixed script.
///
/// An exhausted script reads as a clean peer close, unless `park_when_done`
/// keeps the channel open with the read parked forever (for stop-request
/// tests).
struct ScriptedChannel {
    steps: VecDeque<Step>,
    park_when_done: bool,
    closed: bool,
}

impl ScriptedChannel {
    fn new(steps: Vec<Step>) -> Self {
        Self { steps: steps.into(), park_when_done: false, closed: false }
    }

    fn parked_after(steps: Vec<Step>) -> Self {
        Self { steps: steps.into(), park_when_done: true, closed: false }
    }
}

#[async_trait]
impl Channel for ScriptedChannel {
    async fn read_message(&mut self) -> lightbox::Result<Option<RawMessage>> {
        loop {
            if self.closed {
                return Ok(None);
            }

            match self.steps.pop_front() {
                Some(Step::Message(bytes)) => return Ok(Some(RawMessage::new(bytes))),
                Some(Step::Wait(pause)) => tokio::time::sleep(pause).await,
                Some(Step::Error(e)) => return Err(e),
                None => {
                    if self.park_when_done {
                        futures::future::pending::<()>().await;
                        unreachable!("pending future resolved");
                    }
                    return Ok(None);
                }
            }
        }
    }

    async fn close(&mut self) -> lightbox::Result<()> {
        self.closed = true;
        Ok(())
    }
}

fn header(frame_id: i16, width: u16, height: u16) -> FrameHeader {
    FrameHeader {
        reserved_lead: [0; 3],
        frame_id,
        width,
        height,
        reserved_mid: [0; 2],
        year: 2024,
        month: 6,
        reserved_cal: 0,
        day: 15,
        hour: 12,
        minute: 30,
        second: 45,
        subsec_ms: 0,
        reserved_wide: 0,
        reserved_tail: [0; 2],
    }
}

fn frame_message(frame_id: i16, width: u16, height: u16) -> Vec<u8> {
    let header = header(frame_id, width, height);
    let mut message = header.encode().to_vec();
    for i in 0..header.payload_pixels() {
        message.extend_from_slice(&(i as u16).to_le_bytes());
    }
    message
}

fn sentinel_message() -> Vec<u8> {
    header(SENTINEL_NO_FRAME, 0, 0).encode().to_vec()
}

/// A header that decodes but fails validation (zero dimensions, not a sentinel).
fn malformed_message(frame_id: i16) -> Vec<u8> {
    header(frame_id, 0, 0).encode().to_vec()
}

fn paced(messages: Vec<Vec<u8>>, gap: Duration) -> Vec<Step> {
    let mut steps = Vec::new();
    for message in messages {
        steps.push(Step::Message(message));
        steps.push(Step::Wait(gap));
    }
    steps
}

const GAP: Duration = Duration::from_millis(10);
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn frames_flow_end_to_end() {
    let _ = tracing_subscriber::fmt::try_init();

    let script = paced(
        vec![frame_message(1, 4, 4), frame_message(2, 4, 4), frame_message(3, 4, 4)],
        GAP,
    );
    let acquisition = Lightbox::attach(ScriptedChannel::new(script), AcquireConfig::default())
        .await
        .expect("attach should succeed");

    let stream = acquisition.subscribe(UpdateRate::Native);
    let frames = tokio::time::timeout(TEST_TIMEOUT, stream.collect::<Vec<_>>())
        .await
        .expect("stream should end when the script runs out");

    let ids: Vec<i16> = frames.iter().map(|f| f.frame_id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(frames[0].pixel_count(), 16);
    assert_eq!(frames[0].pixels[5], 5, "payload should be the encoded ramp");

    let report = tokio::time::timeout(TEST_TIMEOUT, acquisition.stopped())
        .await
        .expect("loop should stop on its own")
        .expect("task should not panic");

    assert_eq!(report.stop_cause, StopCause::ChannelClosed);
    assert!(report.fatal_error.is_none());
    assert_eq!(report.frames_received, 3);
    assert_eq!(report.frames_published, 3);
    assert_eq!(report.decode_failures, 0);

    // The ring kept all three frames, in write order
    assert_eq!(report.store.occupied_slots(), 3);
    assert_eq!(report.store.wrap_count(), 0);
    assert_eq!(report.store.slot_meta(0).map(|m| m.frame_id), Some(1));
    assert_eq!(report.store.slot_meta(2).map(|m| m.frame_id), Some(3));

    info!("end-to-end run delivered {} frames", report.frames_received);
}

#[tokio::test]
async fn sentinels_are_skipped_not_stored_or_published() {
    let _ = tracing_subscriber::fmt::try_init();

    let script = paced(
        vec![sentinel_message(), frame_message(7, 2, 2), sentinel_message()],
        GAP,
    );
    let acquisition = Lightbox::attach(ScriptedChannel::new(script), AcquireConfig::default())
        .await
        .expect("attach should succeed");

    let stream = acquisition.subscribe(UpdateRate::Native);
    let frames = tokio::time::timeout(TEST_TIMEOUT, stream.collect::<Vec<_>>())
        .await
        .expect("stream should end");

    assert_eq!(frames.len(), 1, "only the real frame should be published");
    assert_eq!(frames[0].frame_id, 7);

    let report = acquisition.stopped().await.expect("task should not panic");
    assert_eq!(report.sentinel_frames, 2);
    assert_eq!(report.frames_received, 1);
    assert_eq!(report.frames_published, 1);
    assert_eq!(report.store.occupied_slots(), 1, "sentinels must not occupy ring slots");
}

#[tokio::test]
async fn frames_arrive_in_order_across_sentinel_gaps() {
    let _ = tracing_subscriber::fmt::try_init();

    let script = paced(
        vec![
            frame_message(1, 2, 2),
            frame_message(2, 2, 2),
            sentinel_message(),
            frame_message(3, 2, 2),
        ],
        GAP,
    );
    let acquisition = Lightbox::attach(ScriptedChannel::new(script), AcquireConfig::default())
        .await
        .expect("attach should succeed");

    let stream = acquisition.subscribe(UpdateRate::Native);
    let frames = tokio::time::timeout(TEST_TIMEOUT, stream.collect::<Vec<_>>())
        .await
        .expect("stream should end");

    let ids: Vec<i16> = frames.iter().map(|f| f.frame_id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[tokio::test]
async fn empty_channel_stops_cleanly_with_zero_counts() {
    let _ = tracing_subscriber::fmt::try_init();

    let acquisition = Lightbox::attach(ScriptedChannel::new(vec![]), AcquireConfig::default())
        .await
        .expect("attach should succeed");

    let mut tap = acquisition.frames();
    let report = tokio::time::timeout(TEST_TIMEOUT, acquisition.stopped())
        .await
        .expect("loop should stop immediately")
        .expect("task should not panic");

    assert_eq!(report.stop_cause, StopCause::ChannelClosed);
    assert_eq!(report.frames_received, 0);
    assert_eq!(report.sentinel_frames, 0);
    assert!(tap.next_frame().await.is_none(), "tap should see end of stream, never a frame");
}

#[tokio::test]
async fn mid_message_close_is_treated_as_closure_not_failure() {
    let _ = tracing_subscriber::fmt::try_init();

    // The error surfaces before the trailing frame; the loop must not read on
    let script = vec![
        Step::Message(frame_message(1, 2, 2)),
        Step::Wait(GAP),
        Step::Error(AcquireError::ChannelClosed),
        Step::Message(frame_message(9, 2, 2)),
    ];
    let acquisition = Lightbox::attach(ScriptedChannel::new(script), AcquireConfig::default())
        .await
        .expect("attach should succeed");

    let report = tokio::time::timeout(TEST_TIMEOUT, acquisition.stopped())
        .await
        .expect("loop should stop")
        .expect("task should not panic");

    assert_eq!(report.stop_cause, StopCause::ChannelClosed);
    assert!(report.fatal_error.is_none(), "a mid-message close is graceful, not fatal");
    assert_eq!(report.frames_received, 1, "no read after the closure was observed");
}

#[tokio::test]
async fn request_stop_interrupts_a_parked_read() {
    let _ = tracing_subscriber::fmt::try_init();

    let script = vec![Step::Message(frame_message(1, 2, 2))];
    let acquisition =
        Lightbox::attach(ScriptedChannel::parked_after(script), AcquireConfig::default())
            .await
            .expect("attach should succeed");

    let mut tap = acquisition.frames();
    let first = tokio::time::timeout(TEST_TIMEOUT, tap.next_frame())
        .await
        .expect("first frame should arrive")
        .expect("stream should not have ended");
    assert_eq!(first.frame_id, 1);
    assert_eq!(acquisition.state(), LoopState::Running);

    // The channel will never produce again; the stop must not wait for it
    acquisition.request_stop();
    let report = tokio::time::timeout(TEST_TIMEOUT, acquisition.stopped())
        .await
        .expect("stop request should interrupt the parked read")
        .expect("task should not panic");

    assert_eq!(report.stop_cause, StopCause::Requested);
    assert_eq!(report.frames_received, 1);
    assert!(tap.next_frame().await.is_none());
}

#[tokio::test]
async fn dropping_the_handle_stops_the_loop() {
    let _ = tracing_subscriber::fmt::try_init();

    let acquisition = Lightbox::attach(
        ScriptedChannel::parked_after(vec![Step::Message(frame_message(1, 2, 2))]),
        AcquireConfig::default(),
    )
    .await
    .expect("attach should succeed");

    let mut tap = acquisition.frames();
    drop(acquisition);

    // The publisher finishes on the way out, so the tap resolves with None
    let ended = tokio::time::timeout(TEST_TIMEOUT, async {
        while tap.next_frame().await.is_some() {}
    })
    .await;
    assert!(ended.is_ok(), "dropping the handle should cancel the acquisition task");
}

#[tokio::test]
async fn malformed_streak_below_threshold_keeps_running() {
    let _ = tracing_subscriber::fmt::try_init();

    let script = paced(
        vec![
            malformed_message(1),
            malformed_message(2),
            malformed_message(3),
            malformed_message(4),
            frame_message(5, 2, 2),
        ],
        GAP,
    );
    let acquisition = Lightbox::attach(ScriptedChannel::new(script), AcquireConfig::default())
        .await
        .expect("attach should succeed");

    let stream = acquisition.subscribe(UpdateRate::Native);
    let frames = tokio::time::timeout(TEST_TIMEOUT, stream.collect::<Vec<_>>())
        .await
        .expect("stream should end");

    assert_eq!(frames.len(), 1, "the good frame after the streak should flow");
    assert_eq!(frames[0].frame_id, 5);

    let report = acquisition.stopped().await.expect("task should not panic");
    assert_eq!(report.stop_cause, StopCause::ChannelClosed, "four failures must not be fatal");
    assert_eq!(report.decode_failures, 4);
    assert_eq!(report.frames_received, 1);
}

#[tokio::test]
async fn malformed_streak_at_threshold_is_fatal() {
    let _ = tracing_subscriber::fmt::try_init();

    let script: Vec<Step> = (1..=10).map(|i| Step::Message(malformed_message(i))).collect();
    let acquisition = Lightbox::attach(ScriptedChannel::new(script), AcquireConfig::default())
        .await
        .expect("attach should succeed");

    let report = tokio::time::timeout(TEST_TIMEOUT, acquisition.stopped())
        .await
        .expect("loop should stop at the threshold")
        .expect("task should not panic");

    assert_eq!(report.stop_cause, StopCause::Fatal);
    assert!(matches!(report.fatal_error, Some(AcquireError::MalformedHeader { .. })));
    assert_eq!(report.decode_failures, 5, "the loop must stop at the fifth consecutive failure");
    assert_eq!(report.frames_received, 0);
}

#[tokio::test]
async fn well_formed_messages_reset_the_failure_streak() {
    let _ = tracing_subscriber::fmt::try_init();

    // Six failures total, but never five in a row: a sentinel and a good
    // frame each break the streak
    let script = paced(
        vec![
            malformed_message(1),
            malformed_message(2),
            malformed_message(3),
            sentinel_message(),
            malformed_message(4),
            malformed_message(5),
            frame_message(6, 2, 2),
            malformed_message(7),
        ],
        GAP,
    );
    let acquisition = Lightbox::attach(ScriptedChannel::new(script), AcquireConfig::default())
        .await
        .expect("attach should succeed");

    let report = tokio::time::timeout(TEST_TIMEOUT, acquisition.stopped())
        .await
        .expect("loop should stop cleanly")
        .expect("task should not panic");

    assert_eq!(report.stop_cause, StopCause::ChannelClosed);
    assert_eq!(report.decode_failures, 6);
    assert_eq!(report.sentinel_frames, 1);
    assert_eq!(report.frames_received, 1);
}

#[tokio::test]
async fn read_errors_stop_the_loop_immediately() {
    let _ = tracing_subscriber::fmt::try_init();

    let script = vec![
        Step::Message(frame_message(1, 2, 2)),
        Step::Wait(GAP),
        Step::Error(AcquireError::read_failed(
            "scripted failure",
            std::io::Error::other("device fault"),
        )),
        Step::Message(frame_message(2, 2, 2)),
    ];
    let acquisition = Lightbox::attach(ScriptedChannel::new(script), AcquireConfig::default())
        .await
        .expect("attach should succeed");

    let report = tokio::time::timeout(TEST_TIMEOUT, acquisition.stopped())
        .await
        .expect("loop should stop on the read error")
        .expect("task should not panic");

    assert_eq!(report.stop_cause, StopCause::Fatal);
    assert!(matches!(report.fatal_error, Some(AcquireError::Read { .. })));
    assert_eq!(report.frames_received, 1, "the frame after the error must not be read");
}

#[tokio::test]
async fn ring_wraps_once_slots_are_exhausted() {
    let _ = tracing_subscriber::fmt::try_init();

    let config = AcquireConfig { ring_frames: 2, ..AcquireConfig::default() };
    let script = paced((1..=5).map(|i| frame_message(i, 4, 4)).collect(), GAP);
    let acquisition = Lightbox::attach(ScriptedChannel::new(script), config)
        .await
        .expect("attach should succeed");

    let report = tokio::time::timeout(TEST_TIMEOUT, acquisition.stopped())
        .await
        .expect("loop should stop")
        .expect("task should not panic");

    assert_eq!(report.frames_received, 5);
    assert_eq!(report.store.wrap_count(), 2, "five frames into two slots wrap twice");
    assert_eq!(report.store.slot_meta(0).map(|m| m.frame_id), Some(5));
    assert_eq!(report.store.slot_meta(1).map(|m| m.frame_id), Some(4));
}

#[tokio::test]
async fn throttled_subscription_coalesces_to_the_latest_frame() {
    let _ = tracing_subscriber::fmt::try_init();

    let script = paced((1..=40).map(|i| frame_message(i, 2, 2)).collect(), Duration::from_millis(2));
    let acquisition = Lightbox::attach(ScriptedChannel::new(script), AcquireConfig::default())
        .await
        .expect("attach should succeed");

    // 5 Hz against a producer running every 2ms: most frames must coalesce
    let stream = acquisition.subscribe(UpdateRate::Max(5));
    let frames = tokio::time::timeout(TEST_TIMEOUT, stream.collect::<Vec<_>>())
        .await
        .expect("stream should end");

    let ids: Vec<i16> = frames.iter().map(|f| f.frame_id).collect();
    assert!(!ids.is_empty(), "at least one throttled frame should arrive");
    assert!(ids.len() < 40, "throttling should drop most of the burst, saw {:?}", ids);
    assert_eq!(*ids.last().expect("non-empty"), 40, "the final frame always flushes");
    assert!(ids.windows(2).all(|w| w[0] < w[1]), "frame ids should stay ordered: {:?}", ids);

    let report = acquisition.stopped().await.expect("task should not panic");
    assert_eq!(report.frames_received, 40, "throttling is consumer-side only");
}

#[tokio::test]
async fn status_transitions_run_in_lifecycle_order() {
    let _ = tracing_subscriber::fmt::try_init();

    fn rank(state: LoopState) -> u8 {
        match state {
            LoopState::Idle => 0,
            LoopState::Running => 1,
            LoopState::Stopping => 2,
            LoopState::Stopped => 3,
        }
    }

    let script = paced(vec![frame_message(1, 2, 2), frame_message(2, 2, 2)], GAP);
    let acquisition = Lightbox::attach(ScriptedChannel::new(script), AcquireConfig::default())
        .await
        .expect("attach should succeed");

    let mut status = acquisition.status();
    let mut observed = vec![status.borrow().state];

    let watched = tokio::time::timeout(TEST_TIMEOUT, async {
        while status.changed().await.is_ok() {
            let snapshot = *status.borrow_and_update();
            observed.push(snapshot.state);
            if snapshot.state == LoopState::Stopped {
                assert_eq!(snapshot.stop_cause, Some(StopCause::ChannelClosed));
                break;
            }
        }
        observed
    })
    .await
    .expect("loop should reach Stopped");

    assert_eq!(*watched.last().expect("at least one state"), LoopState::Stopped);
    assert!(
        watched.windows(2).all(|w| rank(w[0]) <= rank(w[1])),
        "states must never move backwards: {:?}",
        watched
    );

    let report = acquisition.stopped().await.expect("task should not panic");
    assert_eq!(report.frames_received, 2);
}

#[cfg(unix)]
mod unix_socket {
    use super::*;
    use tokio::io::AsyncWriteExt;

    fn scratch_dir(tag: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("lightbox-{}-{}", tag, std::process::id()));
        std::fs::create_dir_all(&dir).expect("scratch dir should be creatable");
        dir
    }

    #[tokio::test]
    async fn acquires_over_a_real_socket_endpoint() {
        let _ = tracing_subscriber::fmt::try_init();

        let dir = scratch_dir("socket");
        let config = AcquireConfig {
            channel: "itest".to_string(),
            endpoint_dir: Some(dir.clone()),
            ..AcquireConfig::default()
        };

        let listener =
            tokio::net::UnixListener::bind(config.socket_path()).expect("bind should succeed");
        let producer = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.expect("accept should succeed");
            for id in 1..=3i16 {
                stream.write_all(&frame_message(id, 4, 4)).await.expect("write should succeed");
                tokio::time::sleep(GAP).await;
            }
            stream.write_all(&sentinel_message()).await.expect("write should succeed");
            // Dropping the stream closes the channel cleanly
        });

        let acquisition = Lightbox::connect(config).await.expect("connect should succeed");
        let stream = acquisition.subscribe(UpdateRate::Native);
        let frames = tokio::time::timeout(TEST_TIMEOUT, stream.collect::<Vec<_>>())
            .await
            .expect("stream should end when the producer hangs up");

        assert!(!frames.is_empty(), "should observe frames from the socket");
        assert_eq!(frames.last().expect("non-empty").frame_id, 3);

        let report = acquisition.stopped().await.expect("task should not panic");
        assert_eq!(report.stop_cause, StopCause::ChannelClosed);
        assert_eq!(report.sentinel_frames, 1);

        producer.await.expect("producer should finish");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn connect_without_a_producer_is_a_retryable_error() {
        let _ = tracing_subscriber::fmt::try_init();

        let dir = scratch_dir("absent");
        let config = AcquireConfig {
            channel: "nobody-home".to_string(),
            endpoint_dir: Some(dir.clone()),
            ..AcquireConfig::default()
        };

        let err = match Lightbox::connect(config).await {
            Ok(_) => panic!("connect should fail with no listener"),
            Err(e) => e,
        };

        assert!(matches!(err, AcquireError::Connection { .. }));
        assert!(err.is_retryable(), "callers wait for the producer and try again");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
