//! Session relay tests
//!
//! Drive a `SessionRelay` directly with an in-process connector, checking
//! forwarding order, reset generations and teardown.

mod mock_providers;

use std::time::Duration;

use futures::channel::mpsc as client_mpsc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use mock_providers::live_mock::{MockLiveConnector, OpenRequests};
use mock_providers::{settle, within};
use voice_relay::core::live::{LiveEvent, LiveSessionConfig, MediaChunk};
use voice_relay::core::relay::{
    ClientConnection, ClientSignal, ConnectionId, InboundClientMessage, OutboundClientMessage,
    SessionRelay,
};

/// One relay wired to a mock client and a mock connector.
struct Harness {
    inbound: client_mpsc::UnboundedSender<ClientSignal>,
    outbound: mpsc::Receiver<OutboundClientMessage>,
    opens: OpenRequests,
    relay_task: JoinHandle<()>,
}

impl Harness {
    fn start() -> Self {
        let (connector, opens) = MockLiveConnector::new();
        let (connection, outbound) = ClientConnection::channel(ConnectionId::new(), 64);
        let (inbound, inbound_rx) = client_mpsc::unbounded();

        let relay = SessionRelay::new(connection, connector, LiveSessionConfig::default());
        let relay_task = tokio::spawn(relay.run(inbound_rx));

        Self {
            inbound,
            outbound,
            opens,
            relay_task,
        }
    }

    fn send_audio(&self, data: &str) {
        self.signal(ClientSignal::Message(InboundClientMessage::AudioChunk(
            MediaChunk::new(data, "audio/pcm"),
        )));
    }

    fn send_reset(&self) {
        self.signal(ClientSignal::Message(InboundClientMessage::ResetRequest));
    }

    fn signal(&self, signal: ClientSignal) {
        self.inbound
            .unbounded_send(signal)
            .expect("relay stopped listening");
    }

    async fn next_outbound(&mut self) -> OutboundClientMessage {
        within("message to client", self.outbound.recv())
            .await
            .expect("relay dropped the connection")
    }

    async fn no_outbound_within(&mut self, wait: Duration) -> bool {
        !matches!(
            tokio::time::timeout(wait, self.outbound.recv()).await,
            Ok(Some(_))
        )
    }

    async fn close(self) {
        self.signal(ClientSignal::Closed);
        within("relay shutdown", self.relay_task)
            .await
            .expect("relay task panicked");
    }
}

#[tokio::test]
async fn test_audio_forwarded_in_order() {
    let mut harness = Harness::start();
    let mut session = harness.opens.next().await.succeed();
    settle().await;

    for data in ["AAAA", "BBBB", "CCCC"] {
        harness.send_audio(data);
    }

    assert_eq!(session.next_chunk().await.data, "AAAA");
    assert_eq!(session.next_chunk().await.data, "BBBB");
    assert_eq!(session.next_chunk().await.data, "CCCC");
    assert!(session.no_chunk_within(Duration::from_millis(100)).await);

    harness.close().await;
}

#[tokio::test]
async fn test_session_opened_with_configuration() {
    let mut harness = Harness::start();
    let open = harness.opens.next().await;

    assert_eq!(open.index, 0);
    assert_eq!(open.config, LiveSessionConfig::default());

    open.succeed();
    harness.close().await;
}

#[tokio::test]
async fn test_remote_events_reach_client() {
    let mut harness = Harness::start();
    let session = harness.opens.next().await.succeed();
    settle().await;

    session.emit(LiveEvent::Audio("AAEC".into())).await;
    session.emit(LiveEvent::Interrupted).await;
    session.emit(LiveEvent::Audio("AwQF".into())).await;

    assert_eq!(
        harness.next_outbound().await,
        OutboundClientMessage::AudioChunk("AAEC".into())
    );
    assert_eq!(harness.next_outbound().await, OutboundClientMessage::Interrupted);
    assert_eq!(
        harness.next_outbound().await,
        OutboundClientMessage::AudioChunk("AwQF".into())
    );

    harness.close().await;
}

#[tokio::test]
async fn test_audio_before_open_is_dropped() {
    let mut harness = Harness::start();
    let open = harness.opens.next().await;

    harness.send_audio("EARLY");
    settle().await;

    let mut session = open.succeed();
    settle().await;
    harness.send_audio("LATE");

    assert_eq!(session.next_chunk().await.data, "LATE");
    assert!(session.no_chunk_within(Duration::from_millis(100)).await);
    // Nothing is reported to the client for the dropped chunk
    assert!(harness.no_outbound_within(Duration::from_millis(100)).await);

    harness.close().await;
}

#[tokio::test]
async fn test_reset_discards_previous_generation() {
    let mut harness = Harness::start();
    let mut first = harness.opens.next().await.succeed();
    settle().await;

    harness.send_audio("AAAA");
    assert_eq!(first.next_chunk().await.data, "AAAA");

    harness.send_reset();
    let second_open = harness.opens.next().await;
    assert_eq!(second_open.index, 1);
    first.wait_closed().await;

    // An event that was already in flight from the old session
    first.emit_in_flight(LiveEvent::Audio("OLD".into())).await;

    let mut second = second_open.succeed();
    settle().await;
    second.emit(LiveEvent::Audio("NEW".into())).await;

    assert_eq!(
        harness.next_outbound().await,
        OutboundClientMessage::AudioChunk("NEW".into())
    );

    harness.send_audio("BBBB");
    assert_eq!(second.next_chunk().await.data, "BBBB");
    assert!(first.no_chunk_within(Duration::from_millis(100)).await);

    harness.close().await;
    second.wait_closed().await;
}

#[tokio::test]
async fn test_reset_during_open_abandons_it() {
    let mut harness = Harness::start();
    let mut first_open = harness.opens.next().await;

    harness.send_reset();
    first_open.wait_abandoned().await;

    let mut session = harness.opens.next().await.succeed();
    settle().await;
    harness.send_audio("AAAA");
    assert_eq!(session.next_chunk().await.data, "AAAA");

    harness.close().await;
}

#[tokio::test]
async fn test_close_before_open_abandons_it() {
    let mut harness = Harness::start();
    let mut open = harness.opens.next().await;

    harness.signal(ClientSignal::Closed);
    open.wait_abandoned().await;

    within("relay shutdown", harness.relay_task)
        .await
        .expect("relay task panicked");
}

#[tokio::test]
async fn test_client_close_closes_session() {
    let mut harness = Harness::start();
    let session = harness.opens.next().await.succeed();
    settle().await;

    harness.close().await;
    assert!(session.is_closed());
}

#[tokio::test]
async fn test_client_error_closes_session() {
    let mut harness = Harness::start();
    let session = harness.opens.next().await.succeed();
    settle().await;

    harness.signal(ClientSignal::Error("connection reset".into()));
    within("relay shutdown", harness.relay_task)
        .await
        .expect("relay task panicked");
    assert!(session.is_closed());
}

#[tokio::test]
async fn test_remote_error_forwarded_and_session_kept() {
    let mut harness = Harness::start();
    let mut session = harness.opens.next().await.succeed();
    settle().await;

    session.emit(LiveEvent::Error("quota exceeded".into())).await;
    assert_eq!(
        harness.next_outbound().await,
        OutboundClientMessage::Error("quota exceeded".into())
    );

    harness.send_audio("AAAA");
    assert_eq!(session.next_chunk().await.data, "AAAA");
    assert!(!session.is_closed());

    harness.close().await;
}

#[tokio::test]
async fn test_open_failure_reported_and_reset_retries() {
    let mut harness = Harness::start();
    harness.opens.next().await.fail("no credentials");

    match harness.next_outbound().await {
        OutboundClientMessage::Error(message) => assert!(message.contains("no credentials")),
        other => panic!("expected error, got {other:?}"),
    }

    harness.send_reset();
    let mut session = harness.opens.next().await.succeed();
    settle().await;
    harness.send_audio("AAAA");
    assert_eq!(session.next_chunk().await.data, "AAAA");

    harness.close().await;
}

#[tokio::test]
async fn test_remote_close_keeps_relay_alive() {
    let mut harness = Harness::start();
    let first = harness.opens.next().await.succeed();
    settle().await;

    first.remote_close().await;
    settle().await;

    // Closed is not forwarded and audio is dropped until a reset
    harness.send_audio("LOST");
    assert!(harness.no_outbound_within(Duration::from_millis(100)).await);
    assert!(harness.opens.none_within(Duration::from_millis(100)).await);

    harness.send_reset();
    let mut second = harness.opens.next().await.succeed();
    settle().await;
    harness.send_audio("AAAA");
    assert_eq!(second.next_chunk().await.data, "AAAA");

    harness.close().await;
}

#[tokio::test]
async fn test_repeated_resets_open_one_session_each() {
    let mut harness = Harness::start();
    let first = harness.opens.next().await.succeed();
    settle().await;

    harness.send_reset();
    let mut abandoned = harness.opens.next().await;
    assert_eq!(abandoned.index, 1);

    harness.send_reset();
    let latest = harness.opens.next().await;
    assert_eq!(latest.index, 2);
    abandoned.wait_abandoned().await;
    first.wait_closed().await;

    let mut session = latest.succeed();
    settle().await;
    harness.send_audio("AAAA");
    assert_eq!(session.next_chunk().await.data, "AAAA");
    assert!(harness.opens.none_within(Duration::from_millis(100)).await);

    harness.close().await;
}

/// Rounds for tests that race two inputs against each other.
const RACE_ROUNDS: usize = 50;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reset_racing_finished_open_closes_old_session() {
    for round in 0..RACE_ROUNDS {
        let mut harness = Harness::start();
        let first_open = harness.opens.next().await;

        // The open completes while the reset is on its way; depending on
        // scheduling the relay sees the open result first or the reset first
        let first = first_open.succeed();
        for _ in 0..round % 4 {
            tokio::task::yield_now().await;
        }
        harness.send_reset();

        let second_open = harness.opens.next().await;
        assert_eq!(second_open.index, 1, "round {round}");
        first.wait_closed().await;

        first.emit_in_flight(LiveEvent::Audio("OLD".into())).await;
        let second = second_open.succeed();
        second.emit(LiveEvent::Audio("NEW".into())).await;

        assert_eq!(
            harness.next_outbound().await,
            OutboundClientMessage::AudioChunk("NEW".into()),
            "round {round}"
        );

        harness.close().await;
        second.wait_closed().await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_close_racing_finished_open_closes_session() {
    for round in 0..RACE_ROUNDS {
        let mut harness = Harness::start();
        let open = harness.opens.next().await;

        let session = open.succeed();
        for _ in 0..round % 4 {
            tokio::task::yield_now().await;
        }
        harness.signal(ClientSignal::Closed);

        within("relay shutdown", harness.relay_task)
            .await
            .expect("relay task panicked");
        session.wait_closed().await;

        // Nothing reaches the client once the relay is gone
        session.emit_in_flight(LiveEvent::Audio("LATE".into())).await;
        assert_eq!(
            within("client channel close", harness.outbound.recv()).await,
            None,
            "round {round}"
        );
    }
}
