//! Fixed-capacity pixel ring with parallel metadata records.

use chrono::{DateTime, Utc};
use tracing::trace;

use crate::error::{AcquireError, Result};
use crate::types::SensorFrame;
use crate::wire::SENTINEL_NO_FRAME;

/// Write status of a metadata slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
    /// Nothing has been stored in this slot yet.
    Empty,
    /// The slot holds a complete frame record.
    Written,
}

/// Per-frame metadata record.
///
/// The identity fields are meaningful only when `status` is
/// [`SlotStatus::Written`]; empty slots carry the sentinel frame id and zero
/// dimensions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotMeta {
    pub status: SlotStatus,
    pub frame_id: i16,
    pub width: u32,
    pub height: u32,
    pub timestamp: DateTime<Utc>,
}

impl SlotMeta {
    fn empty() -> Self {
        Self {
            status: SlotStatus::Empty,
            frame_id: SENTINEL_NO_FRAME,
            width: 0,
            height: 0,
            timestamp: DateTime::UNIX_EPOCH,
        }
    }
}

/// Result of one ring write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Metadata slot index the frame was recorded at.
    pub slot: usize,
    /// Pixel offset the frame's payload starts at.
    pub offset: usize,
    /// Whether this write reset the cursor to the start of the ring.
    pub wrapped: bool,
}

/// Pre-allocated circular frame store.
///
/// Capacity is fixed at construction and the buffers never reallocate. A
/// write that would run past the end of the pixel buffer, or past the last
/// metadata slot, resets both cursors to 0 first and overwrites the oldest
/// content. That loss is the documented policy of this buffer, not a failure,
/// so [`FrameRing::write`] never reports it as an error.
#[derive(Debug)]
pub struct FrameRing {
    pixels: Box<[u16]>,
    meta: Box<[SlotMeta]>,
    /// Next pixel write position.
    cursor: usize,
    /// Next metadata record index.
    slot: usize,
    wraps: u64,
}

impl FrameRing {
    /// Create a ring with room for `capacity_pixels` samples and `slots`
    /// metadata records.
    pub fn new(capacity_pixels: usize, slots: usize) -> Result<Self> {
        if capacity_pixels == 0 {
            return Err(AcquireError::invalid_config("ring pixel capacity must be non-zero"));
        }
        if slots == 0 {
            return Err(AcquireError::invalid_config("ring must have at least one metadata slot"));
        }
        Ok(Self {
            pixels: vec![0u16; capacity_pixels].into_boxed_slice(),
            meta: vec![SlotMeta::empty(); slots].into_boxed_slice(),
            cursor: 0,
            slot: 0,
            wraps: 0,
        })
    }

    /// Store one frame at the current cursor, wrapping first if it would not
    /// fit in the remaining contiguous space.
    pub fn write(&mut self, frame: &SensorFrame) -> Result<WriteOutcome> {
        let n = frame.pixel_count();
        if n == 0 {
            return Err(AcquireError::invalid_config("cannot store a zero-pixel frame"));
        }
        if n > self.pixels.len() {
            return Err(AcquireError::invalid_config(format!(
                "frame of {} pixels exceeds ring capacity of {}",
                n,
                self.pixels.len()
            )));
        }

        let wrapped = self.cursor + n > self.pixels.len() || self.slot >= self.meta.len();
        if wrapped {
            trace!(
                cursor = self.cursor,
                slot = self.slot,
                incoming = n,
                "ring wrap, overwriting oldest frames"
            );
            self.cursor = 0;
            self.slot = 0;
            self.wraps += 1;
        }

        let offset = self.cursor;
        self.pixels[offset..offset + n].copy_from_slice(&frame.pixels);
        self.meta[self.slot] = SlotMeta {
            status: SlotStatus::Written,
            frame_id: frame.frame_id,
            width: frame.width,
            height: frame.height,
            timestamp: frame.timestamp,
        };

        let outcome = WriteOutcome { slot: self.slot, offset, wrapped };
        self.cursor += n;
        self.slot += 1;
        Ok(outcome)
    }

    /// Pixel capacity of the ring.
    pub fn capacity_pixels(&self) -> usize {
        self.pixels.len()
    }

    /// Number of metadata slots.
    pub fn slots(&self) -> usize {
        self.meta.len()
    }

    /// Next pixel write position.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// How many times the cursor has wrapped back to the start.
    pub fn wrap_count(&self) -> u64 {
        self.wraps
    }

    /// Metadata record at `slot`, if the index is in range.
    pub fn slot_meta(&self, slot: usize) -> Option<&SlotMeta> {
        self.meta.get(slot)
    }

    /// Number of slots currently holding a written record.
    pub fn occupied_slots(&self) -> usize {
        self.meta.iter().filter(|m| m.status == SlotStatus::Written).count()
    }

    /// Raw pixel view at an arbitrary offset, for diagnostics.
    pub fn pixels_at(&self, offset: usize, len: usize) -> Option<&[u16]> {
        self.pixels.get(offset..offset + len)
    }

    /// Pixels of the frame a [`WriteOutcome`] refers to.
    ///
    /// Valid until a later write overwrites the region; the metadata record
    /// at `outcome.slot` no longer matching the outcome means exactly that.
    pub fn frame_pixels(&self, outcome: &WriteOutcome) -> Option<&[u16]> {
        let meta = self.slot_meta(outcome.slot)?;
        if meta.status != SlotStatus::Written {
            return None;
        }
        let len = meta.width as usize * meta.height as usize;
        self.pixels_at(outcome.offset, len)
    }
}
