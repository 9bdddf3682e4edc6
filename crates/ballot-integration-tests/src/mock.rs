//! In-process mock of the authoritative vote server.
//!
//! HTTP surface:
//! - `GET /topic` — list topics
//! - `POST /topic` — create from a `{ Content, Choices }` form
//! - `GET /topic/:id` — fetch one topic
//! - `DELETE /topic/:id` — delete
//! - `POST /topic/:id/vote/:index` — increment, returns the vote vector
//! - `GET /ws/:id` — live channel: pushes the full vote vector on connect
//!   and after every change
//!
//! Invalid topic ids and vote indexes answer 400, as the real server does.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

/// A topic as the server stores it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct MockTopic {
    pub id: u64,
    pub content: String,
    pub choices: Vec<String>,
    pub votes: Vec<u64>,
    pub deleted: bool,
}

/// Creation form.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TopicForm {
    pub content: String,
    pub choices: Vec<String>,
}

/// Events fanned out to the per-topic channel handlers.
#[derive(Debug, Clone)]
enum Push {
    Votes { topic_id: u64, votes: Vec<u64> },
    Kick { topic_id: u64 },
}

#[derive(Default)]
struct ServerState {
    topics: HashMap<u64, MockTopic>,
    next_id: u64,
    /// Artificial latency for `GET /topic/:id`, per topic.
    fetch_delays: HashMap<u64, Duration>,
    /// Fetches for the key resolve with the value's topic instead.
    misroutes: HashMap<u64, u64>,
}

#[derive(Clone)]
struct AppState {
    state: Arc<RwLock<ServerState>>,
    push: broadcast::Sender<Push>,
}

/// Handle to a running mock server.
pub struct MockServer {
    addr: SocketAddr,
    app: AppState,
}

impl MockServer {
    /// Bind to an ephemeral port and serve.
    pub async fn start() -> Self {
        let (push, _) = broadcast::channel(64);
        let app = AppState {
            state: Arc::new(RwLock::new(ServerState::default())),
            push,
        };

        let router = Router::new()
            .route("/topic", get(list_topics).post(create_topic))
            .route("/topic/:id", get(fetch_topic).delete(delete_topic))
            .route("/topic/:id/vote/:index", post(cast_vote))
            .route("/ws/:id", get(ws_handler))
            .with_state(app.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        debug!(%addr, "mock vote server up");

        Self { addr, app }
    }

    /// HTTP base URL for client configuration.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Create a topic directly, returning its id.
    pub async fn seed_topic(&self, content: &str, choices: &[&str]) -> u64 {
        let mut state = self.app.state.write().await;
        let id = state.next_id;
        state.next_id += 1;
        state.topics.insert(
            id,
            MockTopic {
                id,
                content: content.to_string(),
                choices: choices.iter().map(|c| c.to_string()).collect(),
                votes: vec![0; choices.len()],
                deleted: false,
            },
        );
        id
    }

    /// Overwrite a topic's stored votes and broadcast them.
    pub async fn set_votes(&self, topic_id: u64, votes: Vec<u64>) {
        let mut state = self.app.state.write().await;
        if let Some(topic) = state.topics.get_mut(&topic_id) {
            topic.votes = votes.clone();
        }
        drop(state);
        let _ = self.app.push.send(Push::Votes { topic_id, votes });
    }

    /// Push a raw vote vector over the topic's channels without touching
    /// stored state. Lets tests deliver stale or malformed-length frames.
    pub async fn push_votes(&self, topic_id: u64, votes: Vec<u64>) {
        let _ = self.app.push.send(Push::Votes { topic_id, votes });
    }

    /// Abruptly drop every open channel for a topic.
    pub async fn kick(&self, topic_id: u64) {
        let _ = self.app.push.send(Push::Kick { topic_id });
    }

    /// Delay responses to `GET /topic/:id` for one topic.
    pub async fn set_fetch_delay(&self, topic_id: u64, delay: Duration) {
        self.app
            .state
            .write()
            .await
            .fetch_delays
            .insert(topic_id, delay);
    }

    /// Make fetches for `from` resolve with topic `to` instead.
    pub async fn set_misroute(&self, from: u64, to: u64) {
        self.app.state.write().await.misroutes.insert(from, to);
    }

    /// Current stored votes for a topic.
    pub async fn votes(&self, topic_id: u64) -> Option<Vec<u64>> {
        self.app
            .state
            .read()
            .await
            .topics
            .get(&topic_id)
            .map(|t| t.votes.clone())
    }
}

async fn list_topics(State(app): State<AppState>) -> Json<Vec<MockTopic>> {
    let state = app.state.read().await;
    let topics = state
        .topics
        .values()
        .filter(|t| !t.deleted)
        .cloned()
        .collect();
    Json(topics)
}

async fn create_topic(
    State(app): State<AppState>,
    Json(form): Json<TopicForm>,
) -> Json<MockTopic> {
    let mut state = app.state.write().await;
    let id = state.next_id;
    state.next_id += 1;
    let topic = MockTopic {
        id,
        content: form.content,
        votes: vec![0; form.choices.len()],
        choices: form.choices,
        deleted: false,
    };
    state.topics.insert(id, topic.clone());
    Json(topic)
}

async fn fetch_topic(
    State(app): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<MockTopic>, StatusCode> {
    let (delay, topic) = {
        let state = app.state.read().await;
        let effective = state.misroutes.get(&id).copied().unwrap_or(id);
        (
            state.fetch_delays.get(&id).copied(),
            state.topics.get(&effective).cloned(),
        )
    };
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    topic.map(Json).ok_or(StatusCode::BAD_REQUEST)
}

async fn delete_topic(State(app): State<AppState>, Path(id): Path<u64>) -> StatusCode {
    let found = {
        let mut state = app.state.write().await;
        match state.topics.get_mut(&id) {
            Some(topic) => {
                topic.deleted = true;
                true
            }
            None => false,
        }
    };
    if found {
        let _ = app.push.send(Push::Kick { topic_id: id });
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    }
}

async fn cast_vote(
    State(app): State<AppState>,
    Path((id, index)): Path<(u64, usize)>,
) -> Result<Json<Vec<u64>>, StatusCode> {
    let votes = {
        let mut state = app.state.write().await;
        let topic = state.topics.get_mut(&id).ok_or(StatusCode::BAD_REQUEST)?;
        if index >= topic.votes.len() {
            return Err(StatusCode::BAD_REQUEST);
        }
        topic.votes[index] += 1;
        topic.votes.clone()
    };
    let _ = app.push.send(Push::Votes {
        topic_id: id,
        votes: votes.clone(),
    });
    Ok(Json(votes))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(id): Path<u64>,
    State(app): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, id, app))
}

async fn handle_socket(mut socket: WebSocket, topic_id: u64, app: AppState) {
    let mut updates = app.push.subscribe();

    let votes = {
        let state = app.state.read().await;
        match state.topics.get(&topic_id) {
            Some(t) if !t.deleted => t.votes.clone(),
            _ => return,
        }
    };
    if send_votes(&mut socket, &votes).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            msg = socket.recv() => match msg {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                _ => {}
            },
            update = updates.recv() => match update {
                Ok(Push::Votes { topic_id: id, votes }) if id == topic_id => {
                    if send_votes(&mut socket, &votes).await.is_err() {
                        break;
                    }
                }
                // Dropping the socket without a close frame simulates an
                // abrupt connection loss.
                Ok(Push::Kick { topic_id: id }) if id == topic_id => break,
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

async fn send_votes(socket: &mut WebSocket, votes: &[u64]) -> Result<(), axum::Error> {
    let json = serde_json::to_string(votes).expect("vote vector serializes");
    socket.send(Message::Text(json)).await
}

/// Install a test subscriber once; later calls are no-ops.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
