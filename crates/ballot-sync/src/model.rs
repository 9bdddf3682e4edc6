//! Wire model for topics.
//!
//! Field names are PascalCase on the wire (`Id`, `Content`, `Choices`,
//! `Votes`), matching what the authoritative server emits. Unknown fields
//! such as the server's internal `Deleted` flag are ignored.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A voting topic as the server describes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Topic {
    /// Server-assigned identity, immutable.
    pub id: u64,
    /// Display text.
    pub content: String,
    /// Choice labels, fixed once created.
    pub choices: Vec<String>,
    /// Vote counts, parallel to `choices`. Mutated only through the merge
    /// policy once a session owns this topic.
    pub votes: Vec<u64>,
}

impl Topic {
    /// Check the structural invariants a topic must satisfy before it may
    /// become a session's belief.
    pub fn validate(&self) -> Result<()> {
        if self.choices.len() != self.votes.len() {
            return Err(Error::Protocol(format!(
                "topic {} has {} choices but {} vote counts",
                self.id,
                self.choices.len(),
                self.votes.len()
            )));
        }
        if self.choices.len() < 2 {
            return Err(Error::Protocol(format!(
                "topic {} has {} choices, need at least 2",
                self.id,
                self.choices.len()
            )));
        }
        Ok(())
    }

    /// Total votes across all choices.
    pub fn total_votes(&self) -> u64 {
        ballot_tally::total(&self.votes)
    }
}

/// Creation form for a new topic. The server assigns the id and the zeroed
/// vote vector and returns the full [`Topic`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TopicDraft {
    pub content: String,
    pub choices: Vec<String>,
}

impl TopicDraft {
    /// Build a draft, rejecting forms the server would refuse: empty
    /// content, fewer than two choices, or blank choice labels.
    pub fn new(content: impl Into<String>, choices: Vec<String>) -> Result<Self> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(Error::Protocol("topic content is empty".into()));
        }
        if choices.len() < 2 {
            return Err(Error::Protocol(format!(
                "a topic needs at least 2 choices, got {}",
                choices.len()
            )));
        }
        if choices.iter().any(|c| c.trim().is_empty()) {
            return Err(Error::Protocol("choice labels must not be blank".into()));
        }
        Ok(Self { content, choices })
    }
}
