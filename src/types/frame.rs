//! Frame types for the acquisition pipeline

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::{AcquireError, Result};
use crate::wire::FrameHeader;

/// Decoded sensor frame.
///
/// This is the fundamental data unit that flows through the system: the
/// acquisition loop assembles one per non-sentinel message and everything
/// downstream (ring store, publisher, consumer) works with it.
#[derive(Debug, Clone)]
pub struct SensorFrame {
    /// Producer-assigned frame identifier, monotonically increasing.
    pub frame_id: i16,

    /// Frame width in pixels.
    pub width: u32,

    /// Frame height in pixels.
    pub height: u32,

    /// Capture time from the header's calendar fields.
    pub timestamp: DateTime<Utc>,

    /// Pixel samples in row-major order (zero-copy via Arc).
    pub pixels: Arc<[u16]>,
}

impl SensorFrame {
    /// Create a frame from already-decoded parts.
    pub fn new(
        frame_id: i16,
        width: u32,
        height: u32,
        timestamp: DateTime<Utc>,
        pixels: Vec<u16>,
    ) -> Self {
        Self { frame_id, width, height, timestamp, pixels: pixels.into() }
    }

    /// Assemble a frame from a decoded header and its pixel payload.
    ///
    /// Fails with [`AcquireError::MalformedHeader`] when the pixel count does
    /// not match the header's dimensions or the calendar fields do not form a
    /// valid timestamp.
    pub fn from_wire(header: &FrameHeader, pixels: Vec<u16>) -> Result<Self> {
        if pixels.len() != header.payload_pixels() {
            return Err(AcquireError::malformed_header(
                "frame assembly",
                format!(
                    "{} pixels for a {}x{} header",
                    pixels.len(),
                    header.width,
                    header.height
                ),
            ));
        }
        let timestamp = header.timestamp().ok_or_else(|| {
            AcquireError::malformed_header(
                "frame assembly",
                format!(
                    "invalid capture time {:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:03}",
                    header.year,
                    header.month,
                    header.day,
                    header.hour,
                    header.minute,
                    header.second,
                    header.subsec_ms
                ),
            )
        })?;
        Ok(Self::new(
            header.frame_id,
            u32::from(header.width),
            u32::from(header.height),
            timestamp,
            pixels,
        ))
    }

    /// Total number of pixel samples.
    pub fn pixel_count(&self) -> usize {
        self.pixels.len()
    }

    /// One row of pixels, or `None` when `y` is out of range.
    pub fn row(&self, y: u32) -> Option<&[u16]> {
        if y >= self.height {
            return None;
        }
        let w = self.width as usize;
        let start = y as usize * w;
        self.pixels.get(start..start + w)
    }

    /// A single pixel sample, or `None` when out of range.
    pub fn pixel(&self, x: u32, y: u32) -> Option<u16> {
        if x >= self.width {
            return None;
        }
        self.row(y).and_then(|row| row.get(x as usize).copied())
    }
}
