//! Topic list controller.
//!
//! Owns the topic collection and the single active [`TopicSession`]: list
//! loading, carousel navigation, and create/delete all funnel through here.
//! All per-topic consistency work is delegated to the session; the board
//! only decides which topic is displayed and guarantees the previous
//! session is closed before the next one opens.

use std::sync::Arc;

use ballot_ledger::Ledger;
use tracing::{debug, warn};

use crate::client::ApiClient;
use crate::error::Result;
use crate::model::{Topic, TopicDraft};
use crate::session::TopicSession;

/// Controller for the carousel of topics.
pub struct TopicBoard {
    client: ApiClient,
    ledger: Arc<Ledger>,
    topics: Vec<Topic>,
    current: usize,
    active: Option<TopicSession>,
}

impl TopicBoard {
    /// Create an empty board. Call [`load`](Self::load) to populate it.
    pub fn new(client: ApiClient, ledger: Arc<Ledger>) -> Self {
        Self {
            client,
            ledger,
            topics: Vec::new(),
            current: 0,
            active: None,
        }
    }

    /// Fetch the topic list and display the first entry.
    pub async fn load(&mut self) -> Result<()> {
        let mut topics = self.client.list_topics().await?;
        order_topics(&mut topics);
        debug!(count = topics.len(), "topic list loaded");
        self.topics = topics;
        self.current = 0;
        self.activate().await;
        Ok(())
    }

    /// The known topics, most-voted first.
    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    /// Index of the displayed topic.
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// The displayed topic's list snapshot, if any topic exists.
    pub fn current_topic(&self) -> Option<&Topic> {
        self.topics.get(self.current)
    }

    /// The session synchronizing the displayed topic.
    pub fn session(&self) -> Option<&TopicSession> {
        self.active.as_ref()
    }

    /// Display the topic at `index` (clamped to the list).
    pub async fn show(&mut self, index: usize) {
        if self.topics.is_empty() {
            return;
        }
        self.current = index.min(self.topics.len() - 1);
        self.activate().await;
    }

    /// Advance the carousel, wrapping at the end.
    pub async fn next(&mut self) {
        if self.topics.is_empty() {
            return;
        }
        self.current = (self.current + 1) % self.topics.len();
        self.activate().await;
    }

    /// Step the carousel back, wrapping at the start.
    pub async fn prev(&mut self) {
        if self.topics.is_empty() {
            return;
        }
        self.current = (self.current + self.topics.len() - 1) % self.topics.len();
        self.activate().await;
    }

    /// Create a topic and jump the carousel to it.
    pub async fn create(&mut self, draft: &TopicDraft) -> Result<Topic> {
        let topic = self.client.create_topic(draft).await?;
        self.topics.push(topic.clone());
        self.current = self.topics.len() - 1;
        self.activate().await;
        Ok(topic)
    }

    /// Delete the displayed topic: server-side, its ledger entry, and its
    /// session. The carousel index clamps to the shortened list.
    pub async fn delete_current(&mut self) -> Result<()> {
        let Some(topic) = self.topics.get(self.current) else {
            return Ok(());
        };
        let topic_id = topic.id;
        self.client.delete_topic(topic_id).await?;
        // The ledger entry dies with its topic; a failure here only means a
        // stray entry stays on disk.
        if let Err(e) = self.ledger.remove(topic_id) {
            warn!(topic_id, error = %e, "failed to drop ledger entry");
        }
        self.topics.retain(|t| t.id != topic_id);
        if self.current >= self.topics.len() {
            self.current = self.topics.len().saturating_sub(1);
        }
        self.activate().await;
        Ok(())
    }

    /// Close any previous session, then open one for the displayed topic.
    ///
    /// Closing first means a stale in-flight fetch for the previous topic
    /// can never resolve into the new session's belief: the old session's
    /// task is gone before the new one exists.
    async fn activate(&mut self) {
        if let Some(previous) = self.active.take() {
            previous.close().await;
        }
        if let Some(topic) = self.topics.get(self.current) {
            self.active = Some(TopicSession::spawn(
                topic.clone(),
                self.client.clone(),
                self.ledger.clone(),
            ));
        }
    }
}

/// Order a topic list for display: most votes first, ties broken by newest
/// (highest id) first.
pub(crate) fn order_topics(topics: &mut [Topic]) {
    topics.sort_by_key(|t| (t.total_votes(), t.id));
    topics.reverse();
}
