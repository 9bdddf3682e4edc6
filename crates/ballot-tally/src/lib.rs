//! Monotone merge policy for vote-count vectors.
//!
//! The transport may deliver updates out of order, echo a client's own vote
//! before or after broadcasts reflecting concurrent votes, and redeliver
//! after a reconnect. Because vote counts are append-only monotone counters,
//! the elementwise maximum of the local belief and an incoming vector is a
//! correct combination without sequence numbers:
//!
//! - idempotent: `merge(a, a) == a`, so redelivery is harmless
//! - commutative: `merge(a, b) == merge(b, a)`, so reordering is harmless
//! - monotone: every element of the result is >= both inputs, so a client's
//!   displayed state never decreases
//!
//! This would be wrong for any decrementable quantity; nothing here may be
//! reused for one.
//!
//! Also provides the derived projections a display needs: the vote total and
//! each choice's share in per-mille. These are explicit recompute-on-change
//! functions; callers re-derive them after every merge.

use thiserror::Error;

/// Errors from combining vote vectors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    /// The incoming vector does not match the belief's choice count.
    ///
    /// A length change means the topic's choice set changed server-side,
    /// which never happens in steady state. Truncating or padding would
    /// corrupt the belief, so this fails loudly instead.
    #[error("vote vector length mismatch: belief has {belief} choices, incoming has {incoming}")]
    LengthMismatch { belief: usize, incoming: usize },
}

/// Combine a belief vector with an incoming vector, elementwise maximum.
pub fn merge(belief: &[u64], incoming: &[u64]) -> Result<Vec<u64>, MergeError> {
    if belief.len() != incoming.len() {
        return Err(MergeError::LengthMismatch {
            belief: belief.len(),
            incoming: incoming.len(),
        });
    }
    Ok(belief
        .iter()
        .zip(incoming)
        .map(|(b, i)| (*b).max(*i))
        .collect())
}

/// In-place variant of [`merge`]. On error the belief is left untouched.
pub fn merge_into(belief: &mut [u64], incoming: &[u64]) -> Result<(), MergeError> {
    if belief.len() != incoming.len() {
        return Err(MergeError::LengthMismatch {
            belief: belief.len(),
            incoming: incoming.len(),
        });
    }
    for (b, i) in belief.iter_mut().zip(incoming) {
        *b = (*b).max(*i);
    }
    Ok(())
}

/// Total votes across all choices, saturating at `u64::MAX`.
pub fn total(votes: &[u64]) -> u64 {
    votes.iter().fold(0u64, |acc, v| acc.saturating_add(*v))
}

/// Each choice's share of the total in per-mille, truncating.
///
/// A zero total projects to all zeros rather than dividing by zero; an empty
/// vector projects to an empty vector.
pub fn permille(votes: &[u64]) -> Vec<u64> {
    let sum = total(votes);
    if sum == 0 {
        return vec![0; votes.len()];
    }
    votes
        .iter()
        .map(|v| ((*v as f64 / sum as f64) * 1000.0) as u64)
        .collect()
}
