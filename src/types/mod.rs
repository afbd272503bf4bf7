//! Core types for decoded frame data.
//!
//! This module provides the foundational data structures for handling frames
//! once they leave the wire codec:
//!
//! - [`SensorFrame`] represents a complete decoded frame with zero-copy pixel
//!   sharing via `Arc`
//! - [`UpdateRate`] controls how fast a consumer stream receives frames
//!
//! ## Usage Example
//!
//! ```rust
//! use lightbox::types::SensorFrame;
//! use chrono::Utc;
//!
//! let frame = SensorFrame::new(1, 2, 2, Utc::now(), vec![0, 1, 2, 3]);
//! assert_eq!(frame.row(1), Some(&[2, 3][..]));
//! assert_eq!(frame.pixel(1, 0), Some(1));
//! ```

mod frame;
mod update_rate;

pub use frame::SensorFrame;
pub use update_rate::UpdateRate;

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Utc;
    use proptest::prelude::*;
    use std::time::Duration;

    proptest! {
        #[test]
        fn prop_frame_access_stays_in_bounds(
            width in 1u32..64,
            height in 1u32..64,
            x in 0u32..128,
            y in 0u32..128
        ) {
            let pixels: Vec<u16> = (0..width * height).map(|i| i as u16).collect();
            let frame = SensorFrame::new(1, width, height, Utc::now(), pixels);

            let in_bounds = x < width && y < height;
            prop_assert_eq!(frame.pixel(x, y).is_some(), in_bounds);
            if in_bounds {
                prop_assert_eq!(frame.pixel(x, y), Some((y * width + x) as u16));
            }

            match frame.row(y) {
                Some(row) => {
                    prop_assert!(y < height);
                    prop_assert_eq!(row.len(), width as usize);
                }
                None => prop_assert!(y >= height),
            }
        }

        #[test]
        fn prop_update_rate_normalization_never_exceeds_source(
            hz in 1u32..1000,
            source_hz in 1.0f64..500.0
        ) {
            match UpdateRate::Max(hz).normalize(source_hz) {
                UpdateRate::Native => prop_assert!(hz as f64 >= source_hz),
                UpdateRate::Max(effective) => {
                    prop_assert_eq!(effective, hz);
                    prop_assert!((hz as f64) < source_hz);
                }
            }
        }
    }

    #[test]
    fn update_rate_native_never_throttles() {
        assert!(!UpdateRate::Native.needs_throttle(30.0));
        assert_eq!(UpdateRate::Native.throttle_interval(30.0), None);
    }

    #[test]
    fn update_rate_max_throttles_below_source() {
        let rate = UpdateRate::Max(10);
        assert!(rate.needs_throttle(30.0));
        assert_eq!(rate.throttle_interval(30.0), Some(Duration::from_millis(100)));

        // Requesting more than the source delivers degrades to Native.
        let rate = UpdateRate::Max(60);
        assert!(!rate.needs_throttle(30.0));
        assert_eq!(rate.throttle_interval(30.0), None);
    }
}
