//! HTTP client for the authoritative vote server.

use tracing::{debug, warn};

use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::model::{Topic, TopicDraft};

/// Thin typed wrapper over the server's HTTP surface.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    config: SyncConfig,
}

impl ApiClient {
    /// Create a client for the configured server.
    pub fn new(config: SyncConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// `GET /topic` — the full topic list.
    ///
    /// Topics that fail validation are dropped with a warning rather than
    /// failing the whole list.
    pub async fn list_topics(&self) -> Result<Vec<Topic>> {
        let res = self.http.get(self.config.topics_url()).send().await?;
        let body = res.error_for_status()?.text().await?;
        let topics: Vec<Topic> = serde_json::from_str(&body)?;
        Ok(topics
            .into_iter()
            .filter(|t| match t.validate() {
                Ok(()) => true,
                Err(e) => {
                    warn!(topic_id = t.id, error = %e, "dropping invalid topic from list");
                    false
                }
            })
            .collect())
    }

    /// `GET /topic/{id}` — point-in-time fetch of one topic.
    pub async fn fetch_topic(&self, topic_id: u64) -> Result<Topic> {
        let res = self.http.get(self.config.topic_url(topic_id)).send().await?;
        if res.status().is_client_error() {
            return Err(Error::TopicNotFound(topic_id));
        }
        let body = res.error_for_status()?.text().await?;
        let topic: Topic = serde_json::from_str(&body)?;
        topic.validate()?;
        debug!(topic_id, votes = ?topic.votes, "fetched topic");
        Ok(topic)
    }

    /// `POST /topic` — create a topic; the server assigns the id and
    /// returns the full topic.
    pub async fn create_topic(&self, draft: &TopicDraft) -> Result<Topic> {
        let res = self
            .http
            .post(self.config.topics_url())
            .json(draft)
            .send()
            .await?;
        let body = res.error_for_status()?.text().await?;
        let topic: Topic = serde_json::from_str(&body)?;
        topic.validate()?;
        debug!(topic_id = topic.id, "created topic");
        Ok(topic)
    }

    /// `DELETE /topic/{id}`.
    pub async fn delete_topic(&self, topic_id: u64) -> Result<()> {
        let res = self
            .http
            .delete(self.config.topic_url(topic_id))
            .send()
            .await?;
        if res.status().is_client_error() {
            return Err(Error::TopicNotFound(topic_id));
        }
        res.error_for_status()?;
        debug!(topic_id, "deleted topic");
        Ok(())
    }

    /// `POST /topic/{id}/vote/{index}` — cast one vote.
    ///
    /// Returns the server's vote vector after applying the vote; the caller
    /// merges it into belief and only then records the vote in the ledger.
    pub async fn cast_vote(&self, topic_id: u64, choice_index: usize) -> Result<Vec<u64>> {
        let res = self
            .http
            .post(self.config.vote_url(topic_id, choice_index))
            .send()
            .await?;
        if res.status().is_client_error() {
            return Err(Error::TopicNotFound(topic_id));
        }
        let body = res.error_for_status()?.text().await?;
        let votes: Vec<u64> = serde_json::from_str(&body)?;
        debug!(topic_id, choice_index, votes = ?votes, "vote acknowledged");
        Ok(votes)
    }
}
