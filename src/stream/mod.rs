//! Stream combinators for frame delivery.
//!
//! Consumers that cannot keep up with the native frame rate subscribe at a
//! capped rate instead; the [`ThrottleExt::throttle`] combinator implements
//! the latest-wins pacing behind [`crate::types::UpdateRate::Max`].

mod throttle;

pub use throttle::{Throttle, ThrottleExt};
