//! Sync engine configuration.
//!
//! No module-level globals: the configuration is an explicit struct handed
//! to the client and to every session at construction.

use std::time::Duration;

pub use ballot_transition::TickConfig;

/// Retry policy for transient transport failures.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Consecutive failed attempts before the session gives up and closes.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each failure.
    pub base_delay: Duration,
    /// Upper bound for the exponential delay, before jitter.
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
        }
    }
}

/// Configuration for the sync engine.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// HTTP base URL of the authoritative server, e.g. `http://localhost:8080`.
    pub base_url: String,

    /// WebSocket base URL. When unset, derived from `base_url` by scheme
    /// substitution (`http` -> `ws`, `https` -> `wss`).
    pub ws_base_url: Option<String>,

    /// Timing for animated display values.
    pub transition: TickConfig,

    /// Retry policy for loads and live-channel reconnects.
    pub reconnect: ReconnectPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl SyncConfig {
    /// Create a config pointing at the given HTTP base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: trim_trailing_slash(base_url.into()),
            ws_base_url: None,
            transition: TickConfig::default(),
            reconnect: ReconnectPolicy::default(),
        }
    }

    /// Create config from environment variables with sensible defaults.
    pub fn from_env() -> Self {
        let base_url = std::env::var("BALLOT_API_URL")
            .unwrap_or_else(|_| "http://localhost:8080".to_string());
        let ws_base_url = std::env::var("BALLOT_WS_URL").ok();
        Self {
            ws_base_url: ws_base_url.map(trim_trailing_slash),
            ..Self::new(base_url)
        }
    }

    /// URL of a topic resource.
    pub fn topic_url(&self, topic_id: u64) -> String {
        format!("{}/topic/{}", self.base_url, topic_id)
    }

    /// URL of the topic collection.
    pub fn topics_url(&self) -> String {
        format!("{}/topic", self.base_url)
    }

    /// URL for casting a vote.
    pub fn vote_url(&self, topic_id: u64, choice_index: usize) -> String {
        format!("{}/topic/{}/vote/{}", self.base_url, topic_id, choice_index)
    }

    /// URL of a topic's live-update channel.
    pub fn ws_url(&self, topic_id: u64) -> String {
        let base = match &self.ws_base_url {
            Some(ws) => ws.clone(),
            None => derive_ws_base(&self.base_url),
        };
        format!("{}/ws/{}", base, topic_id)
    }
}

fn trim_trailing_slash(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}

fn derive_ws_base(base_url: &str) -> String {
    if let Some(rest) = base_url.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base_url.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base_url.to_string()
    }
}
