//! End-to-end tests against the mock vote server.

use std::sync::Arc;
use std::time::Duration;

use ballot_ledger::Ledger;
use ballot_sync::config::TickConfig;
use ballot_sync::{
    ApiClient, ReconnectPolicy, SessionPhase, SyncConfig, TopicBoard, TopicDraft, TopicPresenter,
    TopicSession, TopicView,
};
use tempfile::tempdir;
use tokio::sync::watch;

use crate::mock::{init_tracing, MockServer};

fn test_config(base_url: String) -> SyncConfig {
    let mut cfg = SyncConfig::new(base_url);
    cfg.reconnect = ReconnectPolicy {
        max_attempts: 5,
        base_delay: Duration::from_millis(20),
        max_delay: Duration::from_millis(100),
    };
    cfg.transition = TickConfig {
        duration: Duration::from_millis(40),
        frame: Duration::from_millis(5),
    };
    cfg
}

fn open_ledger() -> (tempfile::TempDir, Arc<Ledger>) {
    let dir = tempdir().unwrap();
    let ledger = Arc::new(Ledger::open(dir.path()).unwrap());
    (dir, ledger)
}

/// Block until the session's view satisfies a predicate.
async fn wait_until(
    view: &mut watch::Receiver<TopicView>,
    what: &str,
    pred: impl Fn(&TopicView) -> bool,
) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if pred(&view.borrow_and_update()) {
                return;
            }
            if view.changed().await.is_err() {
                panic!("session ended before: {what}");
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for: {what}"));
}

async fn spawn_session(
    mock: &MockServer,
    topic_id: u64,
    ledger: Arc<Ledger>,
) -> (ApiClient, TopicSession) {
    let client = ApiClient::new(test_config(mock.base_url()));
    let seed = client.fetch_topic(topic_id).await.unwrap();
    let session = TopicSession::spawn(seed, client.clone(), ledger);
    (client, session)
}

/// Cast a vote for choice 0: the server acknowledges [1,0], belief becomes
/// [1,0], and only then does the ledger record the vote.
#[tokio::test]
async fn vote_roundtrip_updates_belief_then_ledger() {
    init_tracing();
    let mock = MockServer::start().await;
    let id = mock.seed_topic("Lunch?", &["A", "B"]).await;
    let (_dir, ledger) = open_ledger();
    let (_client, session) = spawn_session(&mock, id, ledger.clone()).await;

    let mut view = session.view();
    wait_until(&mut view, "session live", |v| v.phase == SessionPhase::Live).await;

    let votes = session.cast_vote(0).await.unwrap();
    assert_eq!(votes, vec![1, 0]);
    assert_eq!(session.snapshot().topic.votes, vec![1, 0]);
    assert_eq!(session.snapshot().personal, vec![1, 0]);
    assert_eq!(ledger.get(id, 2).unwrap(), vec![1, 0]);

    session.close().await;
}

/// A stale frame then a fresh one: belief [5,3] merged with [4,3] stays
/// [5,3]; merged with [5,7] becomes [5,7].
#[tokio::test]
async fn stale_frames_never_roll_belief_back() {
    init_tracing();
    let mock = MockServer::start().await;
    let id = mock.seed_topic("Stale?", &["A", "B"]).await;
    mock.set_votes(id, vec![5, 3]).await;

    let (_dir, ledger) = open_ledger();
    let (_client, session) = spawn_session(&mock, id, ledger).await;
    let mut view = session.view();
    wait_until(&mut view, "belief [5,3]", |v| v.topic.votes == [5, 3]).await;

    mock.push_votes(id, vec![4, 3]).await;
    mock.push_votes(id, vec![5, 7]).await;
    wait_until(&mut view, "belief [5,7]", |v| v.topic.votes == [5, 7]).await;

    session.close().await;
}

/// A frame with the wrong vector length is rejected without corrupting
/// belief; later well-formed frames still apply.
#[tokio::test]
async fn mismatched_length_frame_is_rejected() {
    init_tracing();
    let mock = MockServer::start().await;
    let id = mock.seed_topic("Lengths", &["A", "B"]).await;

    let (_dir, ledger) = open_ledger();
    let (_client, session) = spawn_session(&mock, id, ledger).await;
    let mut view = session.view();
    wait_until(&mut view, "session live", |v| v.phase == SessionPhase::Live).await;

    mock.push_votes(id, vec![9, 9, 9]).await;
    mock.push_votes(id, vec![2, 0]).await;
    wait_until(&mut view, "belief [2,0]", |v| v.topic.votes == [2, 0]).await;
    assert_eq!(session.snapshot().topic.votes.len(), 2);

    session.close().await;
}

/// Navigating away while a fetch is in flight: the stale fetch for the
/// previous topic never touches the newly displayed topic's belief.
#[tokio::test]
async fn navigation_discards_stale_in_flight_fetch() {
    init_tracing();
    let mock = MockServer::start().await;
    let slow = mock.seed_topic("Slow topic", &["A", "B"]).await;
    let fast = mock.seed_topic("Fast topic", &["C", "D"]).await;
    mock.set_fetch_delay(slow, Duration::from_millis(300)).await;

    let (_dir, ledger) = open_ledger();
    let client = ApiClient::new(test_config(mock.base_url()));
    let mut board = TopicBoard::new(client, ledger);
    board.load().await.unwrap();

    // Ties order newest-first, so the board starts on `fast`; move to the
    // slow topic, then navigate away before its fetch resolves.
    board.show(board.topics().len() - 1).await;
    assert_eq!(board.session().unwrap().topic_id(), slow);
    board.show(0).await;

    let session = board.session().unwrap();
    assert_eq!(session.topic_id(), fast);
    let mut view = session.view();
    wait_until(&mut view, "session live", |v| v.phase == SessionPhase::Live).await;

    mock.set_votes(fast, vec![3, 0]).await;
    tokio::time::sleep(Duration::from_millis(400)).await;

    let snap = board.session().unwrap().snapshot();
    assert_eq!(snap.topic.id, fast);
    assert_eq!(snap.topic.content, "Fast topic");
    assert_eq!(snap.topic.votes, vec![3, 0]);
}

/// A fetch that resolves with a different topic id than requested is a
/// protocol violation: the session refuses it and closes once its retries
/// run out, belief still the seed.
#[tokio::test]
async fn misrouted_fetch_never_becomes_belief() {
    init_tracing();
    let mock = MockServer::start().await;
    let wanted = mock.seed_topic("Wanted", &["A", "B"]).await;
    let other = mock.seed_topic("Other", &["X", "Y"]).await;
    mock.set_votes(other, vec![9, 9]).await;

    let (_dir, ledger) = open_ledger();
    let client = ApiClient::new(test_config(mock.base_url()));
    let seed = client.fetch_topic(wanted).await.unwrap();
    mock.set_misroute(wanted, other).await;

    let session = TopicSession::spawn(seed, client, ledger);
    let mut view = session.view();
    wait_until(&mut view, "session closed", |v| {
        v.phase == SessionPhase::Closed
    })
    .await;

    let snap = session.snapshot();
    assert_eq!(snap.topic.id, wanted);
    assert_eq!(snap.topic.votes, vec![0, 0]);
}

/// An abruptly dropped channel degrades the session, keeps the last belief,
/// and reconnects; the next server push catches the belief up.
#[tokio::test]
async fn kicked_channel_reconnects_and_catches_up() {
    init_tracing();
    let mock = MockServer::start().await;
    let id = mock.seed_topic("Flaky", &["A", "B"]).await;

    let (_dir, ledger) = open_ledger();
    let (_client, session) = spawn_session(&mock, id, ledger).await;
    let mut view = session.view();
    wait_until(&mut view, "session live", |v| v.phase == SessionPhase::Live).await;

    mock.set_votes(id, vec![2, 1]).await;
    wait_until(&mut view, "belief [2,1]", |v| v.topic.votes == [2, 1]).await;

    mock.kick(id).await;
    // Belief survives the outage and the session comes back on its own; the
    // reconnect handshake re-delivers the stored vector.
    mock.set_votes(id, vec![3, 1]).await;
    wait_until(&mut view, "belief [3,1] after reconnect", |v| {
        v.phase == SessionPhase::Live && v.topic.votes == [3, 1]
    })
    .await;

    session.close().await;
}

/// Creating a topic jumps the carousel to it; deleting the displayed topic
/// clamps the index, closes its session, and drops its ledger entry.
#[tokio::test]
async fn board_create_then_delete_lifecycle() {
    init_tracing();
    let mock = MockServer::start().await;
    mock.seed_topic("Existing", &["A", "B"]).await;

    let (_dir, ledger) = open_ledger();
    let client = ApiClient::new(test_config(mock.base_url()));
    let mut board = TopicBoard::new(client, ledger.clone());
    board.load().await.unwrap();
    assert_eq!(board.topics().len(), 1);

    let draft = TopicDraft::new("Fresh", vec!["Yes".into(), "No".into()]).unwrap();
    let created = board.create(&draft).await.unwrap();
    assert_eq!(board.current_topic().unwrap().id, created.id);

    let session = board.session().unwrap();
    assert_eq!(session.topic_id(), created.id);
    let mut view = session.view();
    wait_until(&mut view, "session live", |v| v.phase == SessionPhase::Live).await;
    session.cast_vote(1).await.unwrap();
    assert_eq!(ledger.get(created.id, 2).unwrap(), vec![0, 1]);

    board.delete_current().await.unwrap();
    assert_eq!(board.topics().len(), 1);
    assert_eq!(ledger.get(created.id, 2).unwrap(), vec![0, 0]);
    let remaining = board.session().unwrap();
    assert_eq!(remaining.topic_id(), board.current_topic().unwrap().id);
    assert_ne!(remaining.topic_id(), created.id);
}

/// Carousel navigation wraps both ways and always re-targets the session.
#[tokio::test]
async fn carousel_wraps_and_switches_sessions() {
    init_tracing();
    let mock = MockServer::start().await;
    let a = mock.seed_topic("A", &["1", "2"]).await;
    let b = mock.seed_topic("B", &["1", "2"]).await;
    let c = mock.seed_topic("C", &["1", "2"]).await;

    let (_dir, ledger) = open_ledger();
    let client = ApiClient::new(test_config(mock.base_url()));
    let mut board = TopicBoard::new(client, ledger);
    board.load().await.unwrap();

    // Zero-vote ties order newest first: c, b, a.
    let ids: Vec<u64> = board.topics().iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![c, b, a]);

    board.next().await;
    assert_eq!(board.session().unwrap().topic_id(), b);
    board.next().await;
    board.next().await;
    assert_eq!(board.session().unwrap().topic_id(), c);
    board.prev().await;
    assert_eq!(board.session().unwrap().topic_id(), a);
}

/// The full pipeline: server ack -> merged belief -> eased display values.
/// The presenter settles on exactly the confirmed numbers.
#[tokio::test]
async fn presenter_settles_on_confirmed_values() {
    init_tracing();
    let mock = MockServer::start().await;
    let id = mock.seed_topic("Displayed", &["A", "B"]).await;

    let (_dir, ledger) = open_ledger();
    let (_client, session) = spawn_session(&mock, id, ledger).await;
    let mut view = session.view();
    wait_until(&mut view, "session live", |v| v.phase == SessionPhase::Live).await;

    let presenter = TopicPresenter::attach(
        session.view(),
        TickConfig {
            duration: Duration::from_millis(40),
            frame: Duration::from_millis(5),
        },
    );

    session.cast_vote(0).await.unwrap();
    session.cast_vote(0).await.unwrap();
    session.cast_vote(1).await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    let a = presenter.choice(0).unwrap();
    let b = presenter.choice(1).unwrap();
    assert_eq!(a.votes(), 2);
    assert_eq!(b.votes(), 1);
    assert_eq!(a.share_permille(), 666);
    assert_eq!(b.share_permille(), 333);
    assert_eq!(a.personal(), 2);
    assert_eq!(b.personal(), 1);

    session.close().await;
}
