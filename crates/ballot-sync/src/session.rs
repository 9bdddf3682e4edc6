//! Per-topic synchronization session.
//!
//! A session owns one topic's belief: it performs the initial load, keeps a
//! live-update channel open, merges every inbound vote vector, submits
//! outgoing votes, and records confirmed votes in the personal ledger. The
//! session runs as a task; the [`TopicSession`] handle publishes belief
//! snapshots through a watch channel and cancels the task when dropped.
//!
//! State machine: `Uninitialized -> Loading -> Live -> Closed`, with
//! `Degraded` between `Live` and a reconnect whenever the channel fails
//! while the topic is still displayed. A closed session is never reused;
//! re-displaying the same topic spawns a fresh session.

use std::sync::Arc;
use std::time::Duration;

use ballot_ledger::Ledger;
use rand::Rng;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::channel::LiveChannel;
use crate::client::ApiClient;
use crate::config::ReconnectPolicy;
use crate::error::{Error, Result};
use crate::model::Topic;

/// How long `close` waits for a graceful wind-down before force-cancelling.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Lifecycle phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Created, not yet loading.
    Uninitialized,
    /// Initial point-in-time fetch in flight.
    Loading,
    /// Channel open, belief tracking the server.
    Live,
    /// Channel lost while displayed; last belief served, reconnecting.
    Degraded,
    /// Torn down. Terminal.
    Closed,
}

/// Belief snapshot published to observers.
#[derive(Debug, Clone)]
pub struct TopicView {
    pub phase: SessionPhase,
    /// Current belief. `votes` only ever changes through the merge policy.
    pub topic: Topic,
    /// Votes this client has cast, parallel to `topic.choices`.
    pub personal: Vec<u64>,
}

enum Command {
    CastVote {
        choice: usize,
        reply: oneshot::Sender<Result<Vec<u64>>>,
    },
    Close,
}

/// Handle to a running session.
pub struct TopicSession {
    topic_id: u64,
    commands: mpsc::Sender<Command>,
    view: watch::Receiver<TopicView>,
    task: JoinHandle<()>,
}

impl TopicSession {
    /// Spawn a session for a topic.
    ///
    /// `seed` is the list snapshot of the topic; it is displayed until the
    /// authoritative fetch replaces it. Must be called within a tokio
    /// runtime.
    pub fn spawn(seed: Topic, client: ApiClient, ledger: Arc<Ledger>) -> Self {
        let topic_id = seed.id;
        let personal = vec![0; seed.choices.len()];
        let (view_tx, view_rx) = watch::channel(TopicView {
            phase: SessionPhase::Uninitialized,
            topic: seed.clone(),
            personal: personal.clone(),
        });
        let (cmd_tx, cmd_rx) = mpsc::channel(8);

        let task = SessionTask {
            topic_id,
            client,
            ledger,
            view: view_tx,
            belief: seed,
            personal,
            phase: SessionPhase::Uninitialized,
        };
        let task = tokio::spawn(run(task, cmd_rx));

        Self {
            topic_id,
            commands: cmd_tx,
            view: view_rx,
            task,
        }
    }

    /// The topic this session synchronizes.
    pub fn topic_id(&self) -> u64 {
        self.topic_id
    }

    /// Subscribe to belief snapshots.
    pub fn view(&self) -> watch::Receiver<TopicView> {
        self.view.clone()
    }

    /// The most recently published snapshot.
    pub fn snapshot(&self) -> TopicView {
        self.view.borrow().clone()
    }

    /// Cast a vote for a choice.
    ///
    /// Sends the vote to the server; on acknowledgement the returned vector
    /// is merged into belief and the vote is recorded in the ledger — in
    /// that order, and only then. A failed submission leaves both belief
    /// and ledger untouched.
    pub async fn cast_vote(&self, choice: usize) -> Result<Vec<u64>> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::CastVote { choice, reply })
            .await
            .map_err(|_| Error::SessionClosed)?;
        response.await.map_err(|_| Error::SessionClosed)?
    }

    /// Close the session, shutting the live channel.
    pub async fn close(mut self) {
        let _ = self.commands.try_send(Command::Close);
        if tokio::time::timeout(CLOSE_GRACE, &mut self.task)
            .await
            .is_err()
        {
            self.task.abort();
        }
    }
}

impl Drop for TopicSession {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct SessionTask {
    topic_id: u64,
    client: ApiClient,
    ledger: Arc<Ledger>,
    view: watch::Sender<TopicView>,
    belief: Topic,
    personal: Vec<u64>,
    phase: SessionPhase,
}

async fn run(mut task: SessionTask, mut commands: mpsc::Receiver<Command>) {
    if let Some(topic) = task.load(&mut commands).await {
        task.belief = topic;
        task.live(&mut commands).await;
    }
    task.publish(SessionPhase::Closed);
    debug!(topic_id = task.topic_id, "session closed");
}

impl SessionTask {
    fn publish(&mut self, phase: SessionPhase) {
        self.phase = phase;
        self.view.send_replace(TopicView {
            phase,
            topic: self.belief.clone(),
            personal: self.personal.clone(),
        });
    }

    /// Initial load with bounded retry. Returns `None` when closed or out
    /// of attempts.
    async fn load(&mut self, commands: &mut mpsc::Receiver<Command>) -> Option<Topic> {
        self.publish(SessionPhase::Loading);
        let mut backoff = Backoff::new(self.client.config().reconnect.clone());
        loop {
            let failure = {
                let fetch = self.client.fetch_topic(self.topic_id);
                tokio::pin!(fetch);
                loop {
                    tokio::select! {
                        res = &mut fetch => match res {
                            Ok(topic) if topic.id == self.topic_id => return Some(topic),
                            // A fetch resolving for some other topic must
                            // never become this session's belief.
                            Ok(topic) => break format!(
                                "fetch for topic {} resolved with topic {}",
                                self.topic_id, topic.id
                            ),
                            Err(e) => break e.to_string(),
                        },
                        cmd = commands.recv() => match cmd {
                            Some(Command::CastVote { reply, .. }) => {
                                let _ = reply.send(Err(Error::NotLive(self.topic_id)));
                            }
                            Some(Command::Close) | None => return None,
                        }
                    }
                }
            };
            warn!(topic_id = self.topic_id, error = %failure, "initial load failed");
            let Some(delay) = backoff.next_delay() else {
                warn!(topic_id = self.topic_id, "load attempts exhausted, giving up");
                return None;
            };
            if !self.idle(commands, delay).await {
                return None;
            }
        }
    }

    /// Live phase: channel loop with reconnect.
    async fn live(&mut self, commands: &mut mpsc::Receiver<Command>) {
        let choice_count = self.belief.choices.len();
        self.personal = match self.ledger.get(self.topic_id, choice_count) {
            Ok(personal) => personal,
            Err(e) => {
                warn!(topic_id = self.topic_id, error = %e, "ledger unreadable, using zero vector");
                vec![0; choice_count]
            }
        };
        self.publish(SessionPhase::Live);

        let ws_url = self.client.config().ws_url(self.topic_id);
        let mut backoff = Backoff::new(self.client.config().reconnect.clone());
        loop {
            let mut channel = match LiveChannel::connect(&ws_url).await {
                Ok(channel) => channel,
                Err(e) => {
                    warn!(topic_id = self.topic_id, error = %e, "live channel connect failed");
                    self.publish(SessionPhase::Degraded);
                    let Some(delay) = backoff.next_delay() else {
                        warn!(topic_id = self.topic_id, "reconnect attempts exhausted");
                        return;
                    };
                    if !self.idle(commands, delay).await {
                        return;
                    }
                    continue;
                }
            };
            backoff.reset();
            self.publish(SessionPhase::Live);

            loop {
                tokio::select! {
                    update = channel.next_update() => match update {
                        Ok(Some(votes)) => self.apply_update(&votes),
                        Ok(None) => {
                            debug!(topic_id = self.topic_id, "channel closed by server");
                            self.publish(SessionPhase::Degraded);
                            break;
                        }
                        Err(e) => {
                            warn!(topic_id = self.topic_id, error = %e, "live channel failed");
                            self.publish(SessionPhase::Degraded);
                            break;
                        }
                    },
                    cmd = commands.recv() => match cmd {
                        Some(Command::CastVote { choice, reply }) => {
                            let res = self.cast_vote(choice).await;
                            let _ = reply.send(res);
                        }
                        // A session must never leave a channel open after
                        // being closed.
                        Some(Command::Close) | None => {
                            channel.close().await;
                            return;
                        }
                    }
                }
            }

            // Degraded: last belief is still served and votes still go over
            // HTTP while we wait to reconnect.
            let Some(delay) = backoff.next_delay() else {
                warn!(topic_id = self.topic_id, "reconnect attempts exhausted");
                return;
            };
            if !self.idle(commands, delay).await {
                return;
            }
        }
    }

    /// Merge an inbound channel frame into belief. A frame of the wrong
    /// length is rejected and the prior belief kept.
    fn apply_update(&mut self, incoming: &[u64]) {
        match ballot_tally::merge_into(&mut self.belief.votes, incoming) {
            Ok(()) => self.publish(self.phase),
            Err(e) => {
                warn!(topic_id = self.topic_id, error = %e, "rejecting channel frame");
            }
        }
    }

    async fn cast_vote(&mut self, choice: usize) -> Result<Vec<u64>> {
        if !matches!(self.phase, SessionPhase::Live | SessionPhase::Degraded) {
            return Err(Error::NotLive(self.topic_id));
        }
        let count = self.belief.choices.len();
        if choice >= count {
            return Err(Error::InvalidChoice {
                index: choice,
                count,
            });
        }
        let ack = self.client.cast_vote(self.topic_id, choice).await?;
        ballot_tally::merge_into(&mut self.belief.votes, &ack)?;
        self.publish(self.phase);
        // Only after the server confirmed the vote does it enter the ledger.
        self.personal = self.ledger.record_vote(self.topic_id, choice, count)?;
        self.publish(self.phase);
        Ok(self.belief.votes.clone())
    }

    /// Wait out a retry delay while still servicing commands. Returns
    /// `false` when a close arrives.
    async fn idle(&mut self, commands: &mut mpsc::Receiver<Command>, delay: Duration) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return true,
                cmd = commands.recv() => match cmd {
                    Some(Command::CastVote { choice, reply }) => {
                        let res = self.cast_vote(choice).await;
                        let _ = reply.send(res);
                    }
                    Some(Command::Close) | None => return false,
                }
            }
        }
    }
}

/// Bounded exponential backoff with jitter.
pub(crate) struct Backoff {
    policy: ReconnectPolicy,
    attempt: u32,
}

impl Backoff {
    pub(crate) fn new(policy: ReconnectPolicy) -> Self {
        Self { policy, attempt: 0 }
    }

    pub(crate) fn reset(&mut self) {
        self.attempt = 0;
    }

    /// The next delay, or `None` once attempts are exhausted.
    pub(crate) fn next_delay(&mut self) -> Option<Duration> {
        if self.attempt >= self.policy.max_attempts {
            return None;
        }
        let exp = self
            .policy
            .base_delay
            .saturating_mul(1u32 << self.attempt.min(16));
        let capped = exp.min(self.policy.max_delay);
        self.attempt += 1;

        let half = capped.as_millis() as u64 / 2;
        let jitter = if half == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..=half))
        };
        Some(capped + jitter)
    }
}
