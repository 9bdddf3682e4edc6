//! Frame-tick driver publishing eased values over a watch channel.

use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::Transition;

/// Timing for an [`Animated`] value.
#[derive(Debug, Clone, Copy)]
pub struct TickConfig {
    /// Transition duration for each target change.
    pub duration: Duration,
    /// Frame period of the tick loop.
    pub frame: Duration,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_millis(1000),
            frame: Duration::from_millis(16),
        }
    }
}

/// A continuously eased integer.
///
/// Owns a background task that ticks at the configured frame period and
/// publishes the transition's current value through a watch channel.
/// Retargets take effect mid-frame via [`set_target`](Self::set_target).
/// Dropping the handle aborts the task; the tick loop never outlives the
/// display that created it.
#[derive(Debug)]
pub struct Animated {
    target: watch::Sender<u64>,
    value: watch::Receiver<u64>,
    task: JoinHandle<()>,
}

impl Animated {
    /// Spawn the tick task, easing from 0 toward `target`.
    ///
    /// Must be called within a tokio runtime.
    pub fn spawn(target: u64, cfg: TickConfig) -> Self {
        let (target_tx, mut target_rx) = watch::channel(target);
        let (value_tx, value_rx) = watch::channel(0);

        let task = tokio::spawn(async move {
            let mut transition = Transition::new(target, Instant::now(), cfg.duration);
            let mut frames = tokio::time::interval(cfg.frame.max(Duration::from_millis(1)));
            frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    changed = target_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let next = *target_rx.borrow_and_update();
                        transition.retarget(next, Instant::now());
                    }
                    _ = frames.tick() => {
                        let v = transition.value_at(Instant::now());
                        if value_tx.send(v).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        Self {
            target: target_tx,
            value: value_rx,
            task,
        }
    }

    /// Redirect the animation toward a new target.
    pub fn set_target(&self, target: u64) {
        // send_if_modified: an unchanged target should not re-anchor the
        // transition (retargeting resets the clock).
        self.target.send_if_modified(|current| {
            if *current == target {
                false
            } else {
                *current = target;
                true
            }
        });
    }

    /// The target currently being approached.
    pub fn target(&self) -> u64 {
        *self.target.borrow()
    }

    /// The most recently published eased value.
    pub fn value(&self) -> u64 {
        *self.value.borrow()
    }

    /// Subscribe to the eased value stream.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.value.clone()
    }
}

impl Drop for Animated {
    fn drop(&mut self) {
        self.task.abort();
    }
}
