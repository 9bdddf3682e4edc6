//! Live-update channel: the client side of `/ws/{id}`.
//!
//! Each inbound text frame is a JSON integer array — the sender's current
//! belief of the topic's vote vector, to be merged rather than applied
//! blindly. Frames that do not parse are protocol violations: they are
//! logged and skipped so the prior belief is kept intact.

use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::error::Result;

/// An open live-update channel for one topic.
pub struct LiveChannel {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    url: String,
}

impl LiveChannel {
    /// Connect to a topic's update channel.
    pub async fn connect(url: &str) -> Result<Self> {
        let (ws, _response) = connect_async(url).await?;
        debug!(url, "live channel open");
        Ok(Self {
            ws,
            url: url.to_string(),
        })
    }

    /// The next inbound vote vector.
    ///
    /// `Ok(None)` means the server closed the channel; an `Err` is a
    /// transport failure. Both leave reconnecting to the caller.
    pub async fn next_update(&mut self) -> Result<Option<Vec<u64>>> {
        while let Some(frame) = self.ws.next().await {
            match frame? {
                Message::Text(text) => match serde_json::from_str::<Vec<u64>>(&text) {
                    Ok(votes) => return Ok(Some(votes)),
                    Err(e) => {
                        warn!(url = %self.url, error = %e, "unparsable channel frame, skipping");
                    }
                },
                Message::Close(_) => return Ok(None),
                Message::Binary(_) => {
                    warn!(url = %self.url, "unexpected binary frame, skipping");
                }
                // Ping/pong are handled by the protocol layer.
                _ => {}
            }
        }
        Ok(None)
    }

    /// Close the channel, ignoring failures on an already-dead socket.
    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
        debug!(url = %self.url, "live channel closed");
    }
}
