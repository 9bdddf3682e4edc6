//! Pure transition state: anchors, easing, interpolation.

use std::f64::consts::FRAC_PI_2;
use std::time::{Duration, Instant};

/// One endpoint of a transition.
#[derive(Debug, Clone, Copy)]
struct Anchor {
    value: u64,
    time: Instant,
}

/// An in-flight transition between two anchored values.
///
/// Evaluating with [`value_at`](Self::value_at) never mutates state, so a
/// transition can be sampled at any rate. Retargeting re-anchors the start
/// at the currently eased value, which guarantees the displayed number is
/// continuous across target changes.
#[derive(Debug, Clone, Copy)]
pub struct Transition {
    start: Anchor,
    end: Anchor,
    duration: Duration,
}

impl Transition {
    /// Minimum transition duration; shorter requests are clamped up to this
    /// so progress never divides by zero.
    pub const MIN_DURATION: Duration = Duration::from_millis(1);

    /// Begin a transition from 0 toward `target`.
    pub fn new(target: u64, now: Instant, duration: Duration) -> Self {
        let duration = duration.max(Self::MIN_DURATION);
        Self {
            start: Anchor {
                value: 0,
                time: now,
            },
            end: Anchor {
                value: target,
                time: now + duration,
            },
            duration,
        }
    }

    /// Redirect the transition toward a new target.
    ///
    /// The start anchor becomes the value currently displayed, so the eased
    /// sequence has no discontinuity: each new transition begins wherever
    /// the previous one was, not at 0.
    pub fn retarget(&mut self, target: u64, now: Instant) {
        let current = self.value_at(now);
        self.start = Anchor {
            value: current,
            time: now,
        };
        self.end = Anchor {
            value: target,
            time: now + self.duration,
        };
    }

    /// The target this transition is approaching.
    pub fn target(&self) -> u64 {
        self.end.value
    }

    /// Whether the transition has reached its end anchor at `now`.
    pub fn is_settled(&self, now: Instant) -> bool {
        now >= self.end.time
    }

    /// The eased value at `now`.
    ///
    /// Progress is clamped to [0, 1] and shaped by `sin(r * pi/2)`, which has
    /// zero derivative at r = 1 and so decelerates into the target. The
    /// interpolated value is rounded upward.
    pub fn value_at(&self, now: Instant) -> u64 {
        let elapsed = now.saturating_duration_since(self.start.time);
        let span = self
            .end
            .time
            .saturating_duration_since(self.start.time)
            .max(Self::MIN_DURATION);
        let r = (elapsed.as_secs_f64() / span.as_secs_f64()).clamp(0.0, 1.0);
        let q = (r * FRAC_PI_2).sin();
        let p = self.start.value as f64 * (1.0 - q) + self.end.value as f64 * q;
        p.ceil() as u64
    }
}
