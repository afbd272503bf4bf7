//! Circular frame storage.
//!
//! A [`FrameRing`] is the producer-side capacity buffer: every accepted frame
//! lands in a pre-allocated pixel ring with a parallel metadata record, and
//! the write cursor wraps back to the start when a frame would not fit
//! (overwrite-oldest, never blocks, never grows). Consumers do not read the
//! ring while acquisition runs; they receive frames through the publisher and
//! inspect the ring only after the loop has stopped and handed it back.

mod ring;

pub use ring::{FrameRing, SlotMeta, SlotStatus, WriteOutcome};
