//! Presentation glue: belief snapshots in, eased display values out.
//!
//! Each choice gets three independent [`Animated`] scalars — vote count,
//! per-mille share of the total, and the personal "+N by you" delta. The
//! presenter task watches a session's [`TopicView`] stream and retargets
//! the animations on every belief change; the UI layer only ever reads the
//! eased outputs, so it can never display a value the server has not
//! confirmed (the transition's ceiling rounding approaches a confirmed
//! target from below, it does not run ahead of it).

use ballot_transition::{Animated, TickConfig};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::session::TopicView;

/// Eased display values for one choice.
#[derive(Debug, Clone)]
pub struct ChoiceDisplay {
    /// The choice's label.
    pub label: String,
    votes: watch::Receiver<u64>,
    share: watch::Receiver<u64>,
    personal: watch::Receiver<u64>,
}

impl ChoiceDisplay {
    /// Eased vote count.
    pub fn votes(&self) -> u64 {
        *self.votes.borrow()
    }

    /// Eased share of the total, in per-mille.
    pub fn share_permille(&self) -> u64 {
        *self.share.borrow()
    }

    /// Eased count of this client's own votes.
    pub fn personal(&self) -> u64 {
        *self.personal.borrow()
    }

    /// Subscribe to the eased vote count stream.
    pub fn subscribe_votes(&self) -> watch::Receiver<u64> {
        self.votes.clone()
    }
}

/// Drives the animated values for one displayed topic.
///
/// Dropped together with the display; dropping cancels the update task,
/// which in turn drops the animators and their tick loops.
pub struct TopicPresenter {
    displays: Vec<ChoiceDisplay>,
    task: JoinHandle<()>,
}

impl TopicPresenter {
    /// Attach to a session's view stream.
    ///
    /// Must be called within a tokio runtime.
    pub fn attach(mut view: watch::Receiver<TopicView>, cfg: TickConfig) -> Self {
        let snapshot = view.borrow_and_update().clone();
        let shares = ballot_tally::permille(&snapshot.topic.votes);

        let mut animators = Vec::with_capacity(snapshot.topic.choices.len());
        let mut displays = Vec::with_capacity(snapshot.topic.choices.len());
        for (i, label) in snapshot.topic.choices.iter().enumerate() {
            let votes = Animated::spawn(snapshot.topic.votes[i], cfg);
            let share = Animated::spawn(shares[i], cfg);
            let personal = Animated::spawn(snapshot.personal[i], cfg);
            displays.push(ChoiceDisplay {
                label: label.clone(),
                votes: votes.subscribe(),
                share: share.subscribe(),
                personal: personal.subscribe(),
            });
            animators.push((votes, share, personal));
        }

        let task = tokio::spawn(async move {
            while view.changed().await.is_ok() {
                let snapshot = view.borrow_and_update().clone();
                let shares = ballot_tally::permille(&snapshot.topic.votes);
                for (i, (votes, share, personal)) in animators.iter().enumerate() {
                    if let Some(&target) = snapshot.topic.votes.get(i) {
                        votes.set_target(target);
                    }
                    if let Some(&target) = shares.get(i) {
                        share.set_target(target);
                    }
                    if let Some(&target) = snapshot.personal.get(i) {
                        personal.set_target(target);
                    }
                }
            }
            // Session gone; animators drop here and their ticks stop.
        });

        Self { displays, task }
    }

    /// Display values per choice, in choice order.
    pub fn choices(&self) -> &[ChoiceDisplay] {
        &self.displays
    }

    /// Display values for one choice.
    pub fn choice(&self, index: usize) -> Option<&ChoiceDisplay> {
        self.displays.get(index)
    }
}

impl Drop for TopicPresenter {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Group a count's digits with commas for display: `1234567` -> `1,234,567`.
pub fn group_digits(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
