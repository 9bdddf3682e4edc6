//! Ballot Sync - topic synchronization for the live voting display.
//!
//! Keeps a per-topic vote tally consistent across the authoritative server
//! (HTTP + WebSocket), the client's own durable vote record, and smoothly
//! eased on-screen values. This is an embedded library consumed by a
//! presentation layer, not a standalone process.
//!
//! # Architecture
//!
//! - **Model**: the wire types (`Topic`, `TopicDraft`)
//! - **Client**: typed HTTP surface of the vote server
//! - **Channel**: live-update WebSocket, one per displayed topic
//! - **Session**: per-topic state machine owning the belief vector
//! - **Board**: topic collection, carousel navigation, session lifecycle
//! - **Presenter**: belief projections fed into eased display values
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ballot_ledger::Ledger;
//! use ballot_sync::{ApiClient, SyncConfig, TopicBoard};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SyncConfig::new("http://localhost:8080");
//!     let ledger = Arc::new(Ledger::open("./ballot-data")?);
//!     let mut board = TopicBoard::new(ApiClient::new(config), ledger);
//!     board.load().await?;
//!     if let Some(session) = board.session() {
//!         session.cast_vote(0).await?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod board;
pub mod channel;
pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod presenter;
pub mod session;

pub use board::TopicBoard;
pub use channel::LiveChannel;
pub use client::ApiClient;
pub use config::{ReconnectPolicy, SyncConfig};
pub use error::{Error, Result};
pub use model::{Topic, TopicDraft};
pub use presenter::{group_digits, ChoiceDisplay, TopicPresenter};
pub use session::{SessionPhase, TopicSession, TopicView};
