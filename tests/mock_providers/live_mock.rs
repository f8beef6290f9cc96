//! In-process live connector
//!
//! Every `open` call is handed to the test as a [`PendingOpen`] and blocks
//! until the test resolves it, so tests control exactly when a session
//! becomes available.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use voice_relay::core::live::{
    BoxedLiveSession, LiveConnector, LiveError, LiveEvent, LiveEventCallback, LiveResult,
    LiveSession, LiveSessionConfig, MediaChunk, SessionState, SharedSessionState,
};

use super::within;

pub struct MockLiveConnector {
    opens_tx: mpsc::UnboundedSender<PendingOpen>,
    calls: AtomicUsize,
}

impl MockLiveConnector {
    pub fn new() -> (Arc<Self>, OpenRequests) {
        let (opens_tx, opens_rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            opens_tx,
            calls: AtomicUsize::new(0),
        });
        (connector, OpenRequests(opens_rx))
    }
}

#[async_trait]
impl LiveConnector for MockLiveConnector {
    async fn open(
        &self,
        config: &LiveSessionConfig,
        on_event: LiveEventCallback,
    ) -> LiveResult<BoxedLiveSession> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        let (respond, response) = oneshot::channel();

        self.opens_tx
            .send(PendingOpen {
                index,
                config: config.clone(),
                on_event,
                respond,
            })
            .map_err(|_| LiveError::ConnectionFailed("test dropped open requests".into()))?;

        match response.await {
            Ok(Ok(session)) => Ok(Box::new(session)),
            Ok(Err(message)) => Err(LiveError::ConnectionFailed(message)),
            Err(_) => Err(LiveError::ConnectionFailed("open abandoned".into())),
        }
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// Stream of open calls made against a [`MockLiveConnector`].
pub struct OpenRequests(mpsc::UnboundedReceiver<PendingOpen>);

impl OpenRequests {
    pub async fn next(&mut self) -> PendingOpen {
        within("open request", self.0.recv())
            .await
            .expect("connector dropped")
    }

    /// True if no open call arrives within `wait`.
    pub async fn none_within(&mut self, wait: Duration) -> bool {
        tokio::time::timeout(wait, self.0.recv()).await.is_err()
    }
}

/// An `open` call waiting for the test to resolve it.
pub struct PendingOpen {
    pub index: usize,
    pub config: LiveSessionConfig,
    on_event: LiveEventCallback,
    respond: oneshot::Sender<Result<MockLiveSession, String>>,
}

impl PendingOpen {
    /// Complete the open with a fresh session.
    pub fn succeed(self) -> SessionControl {
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let state = SharedSessionState::new(SessionState::Open);
        let closed = Arc::new(AtomicBool::new(false));

        let session = MockLiveSession {
            session_id: format!("mock-{}", self.index),
            state: state.clone(),
            sent_tx,
            closed: closed.clone(),
        };
        // The opener may already have been abandoned; the session is then
        // dropped, which counts as closed
        let _ = self.respond.send(Ok(session));

        SessionControl {
            index: self.index,
            on_event: self.on_event,
            state,
            closed,
            sent_rx,
        }
    }

    /// Complete the open with an error.
    pub fn fail(self, message: &str) {
        let _ = self.respond.send(Err(message.to_string()));
    }

    /// Wait until the caller gave up on this open.
    pub async fn wait_abandoned(&mut self) {
        within("open to be abandoned", self.respond.closed()).await;
    }
}

/// Test-side view of one mock session.
pub struct SessionControl {
    pub index: usize,
    on_event: LiveEventCallback,
    state: SharedSessionState,
    closed: Arc<AtomicBool>,
    sent_rx: mpsc::UnboundedReceiver<MediaChunk>,
}

impl SessionControl {
    /// Deliver an event the way a live session would: nothing after close.
    pub async fn emit(&self, event: LiveEvent) {
        if !self.is_closed() {
            (self.on_event)(event).await;
        }
    }

    /// Deliver an event regardless of close, like one already in flight.
    pub async fn emit_in_flight(&self, event: LiveEvent) {
        (self.on_event)(event).await;
    }

    /// Simulate the remote side ending the session.
    pub async fn remote_close(&self) {
        self.state.advance(SessionState::Closed);
        (self.on_event)(LiveEvent::Closed(Some("remote hangup".into()))).await;
    }

    pub async fn next_chunk(&mut self) -> MediaChunk {
        within("forwarded audio chunk", self.sent_rx.recv())
            .await
            .expect("session dropped")
    }

    /// True if nothing is forwarded within `wait`.
    pub async fn no_chunk_within(&mut self, wait: Duration) -> bool {
        !matches!(
            tokio::time::timeout(wait, self.sent_rx.recv()).await,
            Ok(Some(_))
        )
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub async fn wait_closed(&self) {
        within("session close", async {
            while !self.is_closed() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
    }
}

pub struct MockLiveSession {
    session_id: String,
    state: SharedSessionState,
    sent_tx: mpsc::UnboundedSender<MediaChunk>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl LiveSession for MockLiveSession {
    fn state(&self) -> SessionState {
        self.state.get()
    }

    async fn send_media(&self, chunk: MediaChunk) -> LiveResult<()> {
        let state = self.state.get();
        if state != SessionState::Open {
            return Err(LiveError::NotOpen(state));
        }
        self.sent_tx
            .send(chunk)
            .map_err(|_| LiveError::WebSocketError("test dropped the session".into()))
    }

    async fn close(&mut self) -> LiveResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.state.advance(SessionState::Closing);
        self.state.advance(SessionState::Closed);
        Ok(())
    }

    fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl Drop for MockLiveSession {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
