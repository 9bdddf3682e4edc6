//! Personal vote ledger, persisted with RocksDB.
//!
//! One entry per topic id: a JSON integer array parallel to the topic's
//! choices, counting the votes *this client* has successfully cast. The
//! ledger is owned by the client process exclusively, never synchronized
//! with server state, and purely additive. Entries are written only after a
//! vote round-trip is confirmed and removed only when their topic is
//! deleted.
//!
//! Reads are forgiving: a missing, malformed, or mis-sized entry falls back
//! to the zero vector so storage corruption can never fail a topic load.

use std::path::Path;

use rocksdb::{Options, DB};
use thiserror::Error;
use tracing::warn;

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in ledger operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Storage error
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Vote for a choice index the topic does not have
    #[error("choice index {index} out of range for {count} choices")]
    ChoiceOutOfRange { index: usize, count: usize },
}

impl From<rocksdb::Error> for Error {
    fn from(e: rocksdb::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

/// Durable store of the client's own confirmed votes.
pub struct Ledger {
    db: DB,
}

impl Ledger {
    /// Open or create the ledger at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path)?;
        Ok(Self { db })
    }

    fn key(topic_id: u64) -> String {
        format!("ledger:{}", topic_id)
    }

    /// The votes this client has cast for a topic, one count per choice.
    ///
    /// Defaults to the zero vector when no entry exists. An entry that does
    /// not decode as an integer array, or whose length does not match
    /// `choice_count`, is treated the same way; the corrupt bytes stay on
    /// disk until the next confirmed vote overwrites them.
    pub fn get(&self, topic_id: u64, choice_count: usize) -> Result<Vec<u64>> {
        let data = match self.db.get(Self::key(topic_id).as_bytes())? {
            Some(data) => data,
            None => return Ok(vec![0; choice_count]),
        };
        match serde_json::from_slice::<Vec<u64>>(&data) {
            Ok(counts) if counts.len() == choice_count => Ok(counts),
            Ok(counts) => {
                warn!(
                    topic_id,
                    stored = counts.len(),
                    expected = choice_count,
                    "ledger entry has wrong choice count, treating as empty"
                );
                Ok(vec![0; choice_count])
            }
            Err(e) => {
                warn!(topic_id, error = %e, "ledger entry is malformed, treating as empty");
                Ok(vec![0; choice_count])
            }
        }
    }

    /// Record one confirmed vote for `choice_index` and persist.
    ///
    /// Returns the updated vector. Callers invoke this only after the server
    /// acknowledged the vote; a storage failure here means the ledger
    /// under-counts, never that it over-counts.
    pub fn record_vote(
        &self,
        topic_id: u64,
        choice_index: usize,
        choice_count: usize,
    ) -> Result<Vec<u64>> {
        if choice_index >= choice_count {
            return Err(Error::ChoiceOutOfRange {
                index: choice_index,
                count: choice_count,
            });
        }
        let mut counts = self.get(topic_id, choice_count)?;
        counts[choice_index] += 1;
        let value = serde_json::to_vec(&counts)?;
        self.db.put(Self::key(topic_id).as_bytes(), value)?;
        Ok(counts)
    }

    /// Remove a topic's entry. Called when the topic itself is deleted.
    pub fn remove(&self, topic_id: u64) -> Result<()> {
        self.db.delete(Self::key(topic_id).as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn absent_entry_defaults_to_zeros() {
        let dir = tempdir().unwrap();
        let ledger = Ledger::open(dir.path()).unwrap();
        assert_eq!(ledger.get(1, 3).unwrap(), vec![0, 0, 0]);
    }

    #[test]
    fn record_vote_increments_and_persists() {
        let dir = tempdir().unwrap();
        let ledger = Ledger::open(dir.path()).unwrap();

        assert_eq!(ledger.record_vote(1, 0, 2).unwrap(), vec![1, 0]);
        assert_eq!(ledger.record_vote(1, 0, 2).unwrap(), vec![2, 0]);
        assert_eq!(ledger.record_vote(1, 1, 2).unwrap(), vec![2, 1]);
        assert_eq!(ledger.get(1, 2).unwrap(), vec![2, 1]);
    }

    #[test]
    fn entries_survive_reopen() {
        let dir = tempdir().unwrap();
        {
            let ledger = Ledger::open(dir.path()).unwrap();
            ledger.record_vote(7, 1, 2).unwrap();
        }
        let ledger = Ledger::open(dir.path()).unwrap();
        assert_eq!(ledger.get(7, 2).unwrap(), vec![0, 1]);
    }

    #[test]
    fn malformed_entry_reads_as_zeros() {
        let dir = tempdir().unwrap();
        let ledger = Ledger::open(dir.path()).unwrap();
        ledger.db.put(b"ledger:2", b"not json at all").unwrap();
        assert_eq!(ledger.get(2, 2).unwrap(), vec![0, 0]);
    }

    #[test]
    fn wrong_length_entry_reads_as_zeros() {
        let dir = tempdir().unwrap();
        let ledger = Ledger::open(dir.path()).unwrap();
        ledger.db.put(b"ledger:3", b"[1,2,3]").unwrap();
        assert_eq!(ledger.get(3, 2).unwrap(), vec![0, 0]);
    }

    #[test]
    fn out_of_range_choice_is_rejected() {
        let dir = tempdir().unwrap();
        let ledger = Ledger::open(dir.path()).unwrap();
        assert!(matches!(
            ledger.record_vote(1, 5, 2),
            Err(Error::ChoiceOutOfRange { index: 5, count: 2 })
        ));
        assert_eq!(ledger.get(1, 2).unwrap(), vec![0, 0]);
    }

    #[test]
    fn remove_clears_the_entry() {
        let dir = tempdir().unwrap();
        let ledger = Ledger::open(dir.path()).unwrap();
        ledger.record_vote(4, 0, 2).unwrap();
        ledger.remove(4).unwrap();
        assert_eq!(ledger.get(4, 2).unwrap(), vec![0, 0]);
    }

    #[test]
    fn topics_are_keyed_independently() {
        let dir = tempdir().unwrap();
        let ledger = Ledger::open(dir.path()).unwrap();
        ledger.record_vote(1, 0, 2).unwrap();
        ledger.record_vote(2, 1, 3).unwrap();
        assert_eq!(ledger.get(1, 2).unwrap(), vec![1, 0]);
        assert_eq!(ledger.get(2, 3).unwrap(), vec![0, 1, 0]);
    }
}
