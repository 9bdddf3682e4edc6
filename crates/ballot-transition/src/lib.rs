//! Eased integer transitions.
//!
//! A displayed number should glide to its new value instead of jumping.
//! [`Transition`] is the pure state: two anchors (value, time) and a sine
//! ease-out between them. [`Animated`] drives a transition on a frame tick
//! and publishes the eased value through a watch channel; the tick task is
//! owned by the `Animated` handle and cancelled when it is dropped.
//!
//! The interpolation rounds upward, so the displayed integer reaches the
//! exact target only when the transition completes, never overshoots, and
//! never sticks one unit short of the target due to truncation.

mod animated;
mod transition;

pub use animated::{Animated, TickConfig};
pub use transition::Transition;
