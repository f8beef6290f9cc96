//! Per-connection session relay.
//!
//! A [`SessionRelay`] binds one [`ClientConnection`] to at most one live
//! session. All of its state is mutated from the task running
//! [`SessionRelay::run`]; open completions and remote events reach that task
//! through a single channel, each tagged with the generation that produced it.
//!
//! ```text
//! Starting ──open ok──▶ Active ──reset──▶ Resetting ──open ok──▶ Active
//!     │                   │                   │
//!     └──open failed──▶ Idle ◀──remote closed─┘ (reset retries from Idle)
//!
//! any state ──client close/error──▶ Closed
//! ```

use std::fmt;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendError;
use tokio::task::JoinHandle;

use super::connection::{ClientConnection, ClientSignal};
use super::messages::{InboundClientMessage, OutboundClientMessage};
use crate::core::live::{
    BoxedLiveSession, LiveConnector, LiveError, LiveEvent, LiveEventCallback, LiveResult,
    LiveSessionConfig, MediaChunk,
};

/// Capacity of the channel carrying remote events into the relay task.
const RELAY_EVENT_CAPACITY: usize = 256;

/// Lifecycle of a relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// Opening the first session
    Starting,
    /// A session is adopted and forwarding
    Active,
    /// A reset replaced the session; the next one is opening
    Resetting,
    /// No session and no open in flight; waiting for a reset
    Idle,
    /// Torn down
    Closed,
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Starting => "starting",
            Self::Active => "active",
            Self::Resetting => "resetting",
            Self::Idle => "idle",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Work delivered to the relay task.
enum RelayEvent {
    Opened {
        generation: u64,
        result: LiveResult<BoxedLiveSession>,
    },
    Remote {
        generation: u64,
        event: LiveEvent,
    },
}

/// Relay between one client connection and its live sessions.
pub struct SessionRelay {
    connection: ClientConnection,
    connector: Arc<dyn LiveConnector>,
    config: LiveSessionConfig,
    generation: u64,
    state: RelayState,
    current: Option<BoxedLiveSession>,
    pending_open: Option<JoinHandle<()>>,
    events_tx: mpsc::Sender<RelayEvent>,
    events_rx: mpsc::Receiver<RelayEvent>,
}

impl SessionRelay {
    pub fn new(
        connection: ClientConnection,
        connector: Arc<dyn LiveConnector>,
        config: LiveSessionConfig,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(RELAY_EVENT_CAPACITY);
        Self {
            connection,
            connector,
            config,
            generation: 0,
            state: RelayState::Starting,
            current: None,
            pending_open: None,
            events_tx,
            events_rx,
        }
    }

    /// Drive the relay until the client goes away, then tear everything down.
    pub async fn run<S>(mut self, inbound: S)
    where
        S: Stream<Item = ClientSignal> + Send,
    {
        let mut inbound = std::pin::pin!(inbound);
        let connection_id = self.connection.id();

        self.start();

        loop {
            tokio::select! {
                signal = inbound.next() => match signal {
                    Some(ClientSignal::Message(message)) => self.handle_client_message(message).await,
                    Some(ClientSignal::Closed) | None => {
                        tracing::info!(connection_id = %connection_id, "Client disconnected");
                        break;
                    }
                    Some(ClientSignal::Error(e)) => {
                        tracing::warn!(connection_id = %connection_id, "Client connection error: {}", e);
                        break;
                    }
                },
                Some(event) = self.events_rx.recv() => self.handle_event(event).await,
            }
        }

        self.shutdown().await;
    }

    /// Begin opening the generation-0 session.
    fn start(&mut self) {
        if self.pending_open.is_some() || self.current.is_some() {
            return;
        }
        self.state = RelayState::Starting;
        self.begin_open();
    }

    fn begin_open(&mut self) {
        let generation = self.generation;
        let connector = self.connector.clone();
        let config = self.config.clone();
        let events_tx = self.events_tx.clone();

        let callback_tx = self.events_tx.clone();
        let on_event: LiveEventCallback = Arc::new(move |event: LiveEvent| {
            let tx = callback_tx.clone();
            Box::pin(async move {
                // Fails only once the relay stopped listening
                let _ = tx.send(RelayEvent::Remote { generation, event }).await;
            })
        });

        tracing::debug!(
            connection_id = %self.connection.id(),
            generation,
            provider = connector.provider_name(),
            "Opening live session"
        );

        let task = tokio::spawn(async move {
            let result = connector.open(&config, on_event).await;
            if let Err(SendError(RelayEvent::Opened {
                result: Ok(mut session),
                ..
            })) = events_tx
                .send(RelayEvent::Opened { generation, result })
                .await
            {
                let _ = session.close().await;
            }
        });

        self.pending_open = Some(task);
    }

    async fn handle_client_message(&mut self, message: InboundClientMessage) {
        match message {
            InboundClientMessage::AudioChunk(chunk) => self.forward_audio(chunk).await,
            InboundClientMessage::ResetRequest => self.reset(),
        }
    }

    async fn forward_audio(&mut self, chunk: MediaChunk) {
        let Some(session) = self.current.as_ref() else {
            tracing::warn!(
                connection_id = %self.connection.id(),
                generation = self.generation,
                state = %self.state,
                "Live session not ready, dropping audio chunk"
            );
            return;
        };

        match session.send_media(chunk).await {
            Ok(()) => {}
            Err(LiveError::NotOpen(state)) => {
                tracing::warn!(
                    connection_id = %self.connection.id(),
                    generation = self.generation,
                    session_state = %state,
                    "Live session not open, dropping audio chunk"
                );
            }
            Err(e) => {
                tracing::warn!(
                    connection_id = %self.connection.id(),
                    generation = self.generation,
                    "Failed to forward audio chunk: {}",
                    e
                );
            }
        }
    }

    /// Replace the current session with a fresh one.
    ///
    /// The old session is closed on a separate task and never awaited here.
    fn reset(&mut self) {
        if self.state == RelayState::Closed {
            return;
        }

        self.generation += 1;
        tracing::info!(
            connection_id = %self.connection.id(),
            generation = self.generation,
            "Resetting live session"
        );

        if let Some(task) = self.pending_open.take() {
            task.abort();
        }

        if let Some(mut old) = self.current.take() {
            tokio::spawn(async move {
                if let Err(e) = old.close().await {
                    tracing::warn!(session_id = %old.session_id(), "Failed to close live session: {}", e);
                }
            });
        }

        self.state = RelayState::Resetting;
        self.begin_open();
    }

    async fn handle_event(&mut self, event: RelayEvent) {
        match event {
            RelayEvent::Opened { generation, result } => self.on_opened(generation, result).await,
            RelayEvent::Remote { generation, event } => self.on_remote(generation, event).await,
        }
    }

    async fn on_opened(&mut self, generation: u64, result: LiveResult<BoxedLiveSession>) {
        if generation != self.generation || self.state == RelayState::Closed {
            if let Ok(mut stale) = result {
                tracing::debug!(
                    connection_id = %self.connection.id(),
                    generation,
                    "Closing live session from superseded generation"
                );
                let _ = stale.close().await;
            }
            return;
        }

        self.pending_open = None;

        match result {
            Ok(session) if session.state().is_terminal() => {
                tracing::warn!(
                    connection_id = %self.connection.id(),
                    generation,
                    "Live session ended before it was adopted"
                );
                self.state = RelayState::Idle;
            }
            Ok(session) => {
                tracing::info!(
                    connection_id = %self.connection.id(),
                    generation,
                    session_id = %session.session_id(),
                    "Live session opened"
                );
                self.current = Some(session);
                self.state = RelayState::Active;
            }
            Err(e) => {
                tracing::error!(
                    connection_id = %self.connection.id(),
                    generation,
                    "Failed to open live session: {}",
                    e
                );
                self.state = RelayState::Idle;
                self.connection
                    .send(OutboundClientMessage::Error(e.to_string()))
                    .await;
            }
        }
    }

    async fn on_remote(&mut self, generation: u64, event: LiveEvent) {
        if generation != self.generation || self.state == RelayState::Closed {
            tracing::trace!(
                connection_id = %self.connection.id(),
                generation,
                current = self.generation,
                "Discarding event from superseded generation"
            );
            return;
        }

        if let LiveEvent::Closed(reason) = &event {
            tracing::info!(
                connection_id = %self.connection.id(),
                generation,
                reason = ?reason,
                "Live session closed by remote"
            );
            self.current = None;
            if self.pending_open.is_none() {
                self.state = RelayState::Idle;
            }
            return;
        }

        if let LiveEvent::Error(message) = &event {
            tracing::error!(
                connection_id = %self.connection.id(),
                generation,
                "Live session error: {}",
                message
            );
        }

        if let Some(message) = OutboundClientMessage::from_live_event(event) {
            self.connection.send(message).await;
        }
    }

    /// Close everything the relay owns. Idempotent.
    async fn shutdown(&mut self) {
        if self.state == RelayState::Closed {
            return;
        }
        self.state = RelayState::Closed;
        self.connection.mark_closing();

        if let Some(task) = self.pending_open.take() {
            task.abort();
        }

        if let Some(mut session) = self.current.take()
            && let Err(e) = session.close().await
        {
            tracing::warn!(
                connection_id = %self.connection.id(),
                "Failed to close live session: {}",
                e
            );
        }

        // Anything still queued may carry a session that finished opening
        self.events_rx.close();
        while let Ok(event) = self.events_rx.try_recv() {
            if let RelayEvent::Opened {
                result: Ok(mut session),
                ..
            } = event
            {
                let _ = session.close().await;
            }
        }

        self.connection.mark_closed();
        tracing::debug!(
            connection_id = %self.connection.id(),
            generation = self.generation,
            "Session relay closed"
        );
    }
}
