//! Test utilities for building synthetic headers, frames and wire messages
//!
//! Frame producers live in a separate detector host process, so tests build
//! their input bytes here instead of recording fixtures. The helpers use one
//! fixed capture time and a deterministic pixel ramp so assertions can name
//! exact values.

#![cfg(any(test, feature = "benchmark"))]

use chrono::{DateTime, NaiveDate, Utc};

use crate::types::SensorFrame;
use crate::wire::{FrameHeader, SENTINEL_NO_FRAME};

/// The capture time every synthetic header carries: 2024-06-15 12:30:45 UTC.
pub fn fixed_timestamp() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(2024, 6, 15)
        .expect("valid calendar date")
        .and_hms_opt(12, 30, 45)
        .expect("valid wall clock time")
        .and_utc()
}

/// Build a well-formed header with the given identity and dimensions.
///
/// Calendar fields match [`fixed_timestamp`]; reserved fields are zero.
pub fn test_header(frame_id: i16, width: u16, height: u16) -> FrameHeader {
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

/// Build a decoded frame with `pixel_count` ramp pixels laid out as one row.
///
/// A zero pixel count yields a degenerate 0x1 frame, which store tests use to
/// probe rejection paths.
pub fn test_frame(frame_id: i16, pixel_count: u32) -> SensorFrame {
    let pixels: Vec<u16> = (0..pixel_count).map(|i| i as u16).collect();
    SensorFrame::new(frame_id, pixel_count, 1, fixed_timestamp(), pixels)
}

/// Encode a complete wire message: header plus a ramp payload.
///
/// Pixel `i` holds the value `i` truncated to u16, little-endian, matching
/// what [`crate::wire::decode_pixels`] will reproduce.
pub fn frame_message(frame_id: i16, width: u16, height: u16) -> Vec<u8> {
    let header = test_header(frame_id, width, height);
    let mut message = header.encode().to_vec();
    for i in 0..header.payload_pixels() {
        message.extend_from_slice(&(i as u16).to_le_bytes());
    }
    message
}

/// Encode a header-only "no frame available" message.
pub fn sentinel_message() -> Vec<u8> {
    test_header(SENTINEL_NO_FRAME, 0, 0).encode().to_vec()
}
