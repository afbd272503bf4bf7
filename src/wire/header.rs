//! Frame header structure and binary codec.
//!
//! Defines the fixed binary header every frame message starts with and
//! provides decode/encode functions for it.
//!
//! ## Header Structure (44 bytes, little-endian)
//!
//! 1. **Reserved** (3 x u16) - producer-internal fields, carried opaquely
//! 2. **Frame identity** - `frame_id` (i16, -1 = no frame), `width`, `height` (u16)
//! 3. **Reserved** (2 x u16)
//! 4. **Capture time** - calendar fields as u16: year, month, (reserved),
//!    day, hour, minute, second, sub-second
//! 5. **Reserved** (u64 + 2 x u16) - trailing producer-internal fields
//!
//! Reserved fields are retained on decode so that re-encoding reproduces the
//! original byte sequence.
//!
//! ## Performance Characteristics
//!
//! - Explicit little-endian byte order handling with bounds checking
//! - No allocation during header decode; pixel decode allocates once

use crate::{AcquireError, Result};
use chrono::{DateTime, NaiveDate, Utc};

/// Size of the frame header in bytes.
pub const HEADER_SIZE: usize = 44;

/// `frame_id` value signalling "no frame available" from the producer.
///
/// Only ever compared against the signed `frame_id` field; dimension checks
/// never consult it.
pub const SENTINEL_NO_FRAME: i16 = -1;

/// Decoded frame header.
///
/// Field order matches the wire layout. Reserved fields carry whatever the
/// producer wrote; they are opaque to this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    pub reserved_lead: [u16; 3], // offsets 0, 2, 4
    pub frame_id: i16,           // offset 6
    pub width: u16,              // offset 8
    pub height: u16,             // offset 10
    pub reserved_mid: [u16; 2],  // offsets 12, 14
    pub year: u16,               // offset 16
    pub month: u16,              // offset 18
    pub reserved_cal: u16,       // offset 20
    pub day: u16,                // offset 22
    pub hour: u16,               // offset 24
    pub minute: u16,             // offset 26
    pub second: u16,             // offset 28
    pub subsec_ms: u16,          // offset 30, milliseconds within the second
    pub reserved_wide: u64,      // offset 32
    pub reserved_tail: [u16; 2], // offsets 40, 42
}

impl FrameHeader {
    /// Decode a header from the leading [`HEADER_SIZE`] bytes of `data`.
    ///
    /// Extra bytes beyond the header are ignored, so callers can pass a whole
    /// message. Fails with [`AcquireError::MalformedHeader`] when `data` is
    /// shorter than the header.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(AcquireError::malformed_header(
                "header decoding",
                format!("need {} bytes, have {}", HEADER_SIZE, data.len()),
            ));
        }

        Ok(Self {
            reserved_lead: [
                parse_u16_le(data, 0)?,
                parse_u16_le(data, 2)?,
                parse_u16_le(data, 4)?,
            ],
            frame_id: parse_i16_le(data, 6)?,
            width: parse_u16_le(data, 8)?,
            height: parse_u16_le(data, 10)?,
            reserved_mid: [parse_u16_le(data, 12)?, parse_u16_le(data, 14)?],
            year: parse_u16_le(data, 16)?,
            month: parse_u16_le(data, 18)?,
            reserved_cal: parse_u16_le(data, 20)?,
            day: parse_u16_le(data, 22)?,
            hour: parse_u16_le(data, 24)?,
            minute: parse_u16_le(data, 26)?,
            second: parse_u16_le(data, 28)?,
            subsec_ms: parse_u16_le(data, 30)?,
            reserved_wide: parse_u64_le(data, 32)?,
            reserved_tail: [parse_u16_le(data, 40)?, parse_u16_le(data, 42)?],
        })
    }

    /// Encode the header back into its wire form, reserved fields included.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        put_u16_le(&mut out, 0, self.reserved_lead[0]);
        put_u16_le(&mut out, 2, self.reserved_lead[1]);
        put_u16_le(&mut out, 4, self.reserved_lead[2]);
        out[6..8].copy_from_slice(&self.frame_id.to_le_bytes());
        put_u16_le(&mut out, 8, self.width);
        put_u16_le(&mut out, 10, self.height);
        put_u16_le(&mut out, 12, self.reserved_mid[0]);
        put_u16_le(&mut out, 14, self.reserved_mid[1]);
        put_u16_le(&mut out, 16, self.year);
        put_u16_le(&mut out, 18, self.month);
        put_u16_le(&mut out, 20, self.reserved_cal);
        put_u16_le(&mut out, 22, self.day);
        put_u16_le(&mut out, 24, self.hour);
        put_u16_le(&mut out, 26, self.minute);
        put_u16_le(&mut out, 28, self.second);
        put_u16_le(&mut out, 30, self.subsec_ms);
        out[32..40].copy_from_slice(&self.reserved_wide.to_le_bytes());
        put_u16_le(&mut out, 40, self.reserved_tail[0]);
        put_u16_le(&mut out, 42, self.reserved_tail[1]);
        out
    }

    /// Whether this header is the producer's "no frame available" signal.
    pub fn is_sentinel(&self) -> bool {
        self.frame_id == SENTINEL_NO_FRAME
    }

    /// Number of pixel samples the payload declares.
    pub fn payload_pixels(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Number of payload bytes following the header on the wire.
    pub fn payload_bytes(&self) -> usize {
        self.payload_pixels() * 2
    }

    /// Sanity-check the dimensions of a non-sentinel header.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(AcquireError::malformed_header(
                "header validation",
                format!("zero frame dimensions ({}x{})", self.width, self.height),
            ));
        }
        Ok(())
    }

    /// Capture timestamp assembled from the calendar fields.
    ///
    /// The sub-second field is milliseconds and gets widened to microseconds
    /// (x1000). Returns `None` when any calendar field is out of range,
    /// including a sub-second value of 1000 or more.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        if self.subsec_ms >= 1000 {
            return None;
        }
        let date = NaiveDate::from_ymd_opt(
            i32::from(self.year),
            u32::from(self.month),
            u32::from(self.day),
        )?;
        let datetime = date.and_hms_micro_opt(
            u32::from(self.hour),
            u32::from(self.minute),
            u32::from(self.second),
            u32::from(self.subsec_ms) * 1000,
        )?;
        Some(datetime.and_utc())
    }
}

/// Decode a payload of `expected_pixels` little-endian u16 samples.
pub fn decode_pixels(payload: &[u8], expected_pixels: usize) -> Result<Vec<u16>> {
    if payload.len() != expected_pixels * 2 {
        return Err(AcquireError::malformed_header(
            "payload decoding",
            format!(
                "payload is {} bytes, header declares {} pixels ({} bytes)",
                payload.len(),
                expected_pixels,
                expected_pixels * 2
            ),
        ));
    }
    Ok(payload.chunks_exact(2).map(|pair| u16::from_le_bytes([pair[0], pair[1]])).collect())
}

// Safe byte parsing helpers with bounds checking

fn parse_u16_le(data: &[u8], offset: usize) -> Result<u16> {
    if offset + 2 > data.len() {
        return Err(AcquireError::malformed_header(
            "integer parsing",
            format!(
                "insufficient data for u16 at offset {} (need 2 bytes, have {})",
                offset,
                data.len().saturating_sub(offset)
            ),
        ));
    }
    Ok(u16::from_le_bytes([data[offset], data[offset + 1]]))
}

fn parse_i16_le(data: &[u8], offset: usize) -> Result<i16> {
    parse_u16_le(data, offset).map(|raw| raw as i16)
}

fn parse_u64_le(data: &[u8], offset: usize) -> Result<u64> {
    if offset + 8 > data.len() {
        return Err(AcquireError::malformed_header(
            "integer parsing",
            format!(
                "insufficient data for u64 at offset {} (need 8 bytes, have {})",
                offset,
                data.len().saturating_sub(offset)
            ),
        ));
    }
    Ok(u64::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
        data[offset + 4],
        data[offset + 5],
        data[offset + 6],
        data[offset + 7],
    ]))
}

fn put_u16_le(out: &mut [u8], offset: usize, value: u16) {
    out[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}
