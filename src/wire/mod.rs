//! Wire format for frame messages.
//!
//! The producer writes one message per frame: a fixed 44-byte little-endian
//! header immediately followed by `width * height` unsigned 16-bit pixel
//! samples. Sentinel messages (`frame_id == -1`, "no frame available") are
//! header-only; no payload follows them on the wire.

mod header;

pub use header::{FrameHeader, HEADER_SIZE, SENTINEL_NO_FRAME, decode_pixels};
