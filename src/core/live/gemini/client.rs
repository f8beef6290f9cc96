//! Gemini Live API client implementation.
//!
//! This module provides the Gemini connector and session handle that implement
//! the `LiveConnector` / `LiveSession` traits over the Live API WebSocket.
//!
//! # API Reference
//!
//! - Endpoint: `wss://generativelanguage.googleapis.com/ws/...BidiGenerateContent?key=<key>`
//! - Protocol: WebSocket with JSON messages (text or binary frames)
//! - Audio: base64 inline data, PCM 16-bit at 24kHz on output
//!
//! # Example
//!
//! ```rust,ignore
//! use voice_relay::core::live::{GeminiLiveConnector, LiveConnector, LiveSessionConfig};
//! use std::sync::Arc;
//!
//! let connector = GeminiLiveConnector::new(Some("api-key".to_string()));
//! let session = connector
//!     .open(&LiveSessionConfig::default(), Arc::new(|event| Box::pin(async move {
//!         println!("{event:?}");
//!     })))
//!     .await?;
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use super::config::GEMINI_LIVE_URL;
use super::messages::{ClientMessage, ServerMessage};
use crate::core::live::base::{
    BoxedLiveSession, LiveConnector, LiveError, LiveEvent, LiveEventCallback, LiveResult,
    LiveSession, LiveSessionConfig, MediaChunk, SessionState, SharedSessionState,
};

/// Channel capacity for outgoing WebSocket messages.
const WS_CHANNEL_CAPACITY: usize = 256;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Work items for the writer task.
enum Outgoing {
    Message(ClientMessage),
    Pong(Bytes),
    Close,
}

// =============================================================================
// Connector
// =============================================================================

/// Opens Gemini Live sessions.
///
/// Built once at startup and shared by all relays. A missing API key does not
/// prevent construction; every `open` reports it instead.
pub struct GeminiLiveConnector {
    api_key: Option<String>,
    endpoint: String,
}

impl GeminiLiveConnector {
    /// Create a connector for the public Gemini endpoint.
    pub fn new(api_key: Option<String>) -> Self {
        Self::with_endpoint(api_key, GEMINI_LIVE_URL)
    }

    /// Create a connector for a custom endpoint (proxies, tests).
    pub fn with_endpoint(api_key: Option<String>, endpoint: impl Into<String>) -> Self {
        Self {
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            endpoint: endpoint.into(),
        }
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Build the WebSocket URL with the key query parameter.
    fn build_ws_url(&self, api_key: &str) -> LiveResult<Url> {
        let mut url = Url::parse(&self.endpoint).map_err(|e| {
            LiveError::InvalidConfiguration(format!("Invalid Gemini endpoint: {e}"))
        })?;
        url.query_pairs_mut().append_pair("key", api_key);
        Ok(url)
    }

    /// Wait for `setupComplete`, answering pings on the way.
    async fn await_setup_complete(sink: &mut WsSink, stream: &mut WsSource) -> LiveResult<()> {
        while let Some(frame) = stream.next().await {
            let payload = match frame {
                Ok(Message::Text(text)) => Bytes::copy_from_slice(text.as_bytes()),
                Ok(Message::Binary(data)) => data,
                Ok(Message::Ping(data)) => {
                    sink.send(Message::Pong(data))
                        .await
                        .map_err(|e| LiveError::WebSocketError(e.to_string()))?;
                    continue;
                }
                Ok(Message::Close(frame)) => {
                    let reason = frame
                        .map(|f| format!("{} ({})", f.reason, u16::from(f.code)))
                        .unwrap_or_else(|| "connection closed".to_string());
                    return Err(LiveError::SetupFailed(reason));
                }
                Ok(_) => continue,
                Err(e) => return Err(LiveError::ConnectionFailed(e.to_string())),
            };

            match ServerMessage::from_slice(&payload) {
                Ok(message) if message.is_setup_complete() => return Ok(()),
                Ok(_) => {
                    tracing::debug!("Ignoring Gemini message received before setupComplete");
                }
                Err(e) => {
                    tracing::warn!("Failed to parse Gemini setup response: {}", e);
                }
            }
        }

        Err(LiveError::SetupFailed(
            "connection ended before setup completed".to_string(),
        ))
    }
}

impl Drop for GeminiLiveConnector {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.api_key {
            key.zeroize();
        }
    }
}

#[async_trait]
impl LiveConnector for GeminiLiveConnector {
    async fn open(
        &self,
        config: &LiveSessionConfig,
        on_event: LiveEventCallback,
    ) -> LiveResult<BoxedLiveSession> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            LiveError::MissingCredential("GEMINI_API_KEY is not configured".to_string())
        })?;

        let url = self.build_ws_url(api_key)?;

        let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| LiveError::ConnectionFailed(e.to_string()))?;

        tracing::debug!(model = %config.model, "Connected to Gemini Live API, sending setup");

        let (mut sink, mut stream) = ws_stream.split();

        let setup = serde_json::to_string(&ClientMessage::setup(config))
            .map_err(|e| LiveError::SerializationError(e.to_string()))?;
        sink.send(Message::Text(setup.into()))
            .await
            .map_err(|e| LiveError::WebSocketError(e.to_string()))?;

        Self::await_setup_complete(&mut sink, &mut stream).await?;

        let session = GeminiLiveSession::spawn(sink, stream, on_event);
        tracing::info!(
            session_id = %session.session_id,
            model = %config.model,
            "Gemini Live session opened"
        );

        Ok(Box::new(session))
    }

    fn provider_name(&self) -> &'static str {
        "gemini"
    }
}

// =============================================================================
// Session
// =============================================================================

/// One open Gemini Live session.
///
/// A reader task decodes server messages and invokes the event callback, a
/// writer task owns the sink. They are separate so a slow event consumer
/// never blocks outgoing media.
pub struct GeminiLiveSession {
    session_id: String,
    state: SharedSessionState,
    /// Set once close was requested; the reader stops delivering events
    suppressed: Arc<AtomicBool>,
    outgoing: mpsc::Sender<Outgoing>,
    reader_task: JoinHandle<()>,
    writer_task: JoinHandle<()>,
}

impl GeminiLiveSession {
    fn spawn(sink: WsSink, stream: WsSource, on_event: LiveEventCallback) -> Self {
        let session_id = uuid::Uuid::new_v4().to_string();
        let state = SharedSessionState::new(SessionState::Open);
        let suppressed = Arc::new(AtomicBool::new(false));
        let (outgoing, outgoing_rx) = mpsc::channel::<Outgoing>(WS_CHANNEL_CAPACITY);

        let writer_task = tokio::spawn(Self::write_loop(sink, outgoing_rx, state.clone()));
        let reader_task = tokio::spawn(Self::read_loop(
            stream,
            outgoing.clone(),
            on_event,
            state.clone(),
            suppressed.clone(),
        ));

        Self {
            session_id,
            state,
            suppressed,
            outgoing,
            reader_task,
            writer_task,
        }
    }

    async fn write_loop(
        mut sink: WsSink,
        mut outgoing_rx: mpsc::Receiver<Outgoing>,
        state: SharedSessionState,
    ) {
        while let Some(item) = outgoing_rx.recv().await {
            let result = match item {
                Outgoing::Message(message) => match serde_json::to_string(&message) {
                    Ok(json) => sink.send(Message::Text(json.into())).await,
                    Err(e) => {
                        tracing::error!("Failed to serialize Gemini message: {}", e);
                        continue;
                    }
                },
                Outgoing::Pong(data) => sink.send(Message::Pong(data)).await,
                Outgoing::Close => break,
            };

            if let Err(e) = result {
                tracing::error!("Failed to send Gemini WebSocket message: {}", e);
                state.advance(SessionState::Failed);
                return;
            }
        }

        let close = Message::Close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: "".into(),
        }));
        if let Err(e) = sink.send(close).await {
            tracing::debug!("Gemini close frame not sent: {}", e);
        }
        let _ = sink.close().await;
        state.advance(SessionState::Closed);
        tracing::debug!("Gemini writer task ended");
    }

    async fn read_loop(
        mut stream: WsSource,
        outgoing: mpsc::Sender<Outgoing>,
        on_event: LiveEventCallback,
        state: SharedSessionState,
        suppressed: Arc<AtomicBool>,
    ) {
        let dispatch = |event: LiveEvent| {
            let on_event = on_event.clone();
            let suppressed = suppressed.clone();
            async move {
                if suppressed.load(Ordering::SeqCst) {
                    tracing::trace!("Dropping event from closing Gemini session");
                    return;
                }
                on_event(event).await;
            }
        };

        loop {
            let payload = match stream.next().await {
                Some(Ok(Message::Text(text))) => Bytes::copy_from_slice(text.as_bytes()),
                Some(Ok(Message::Binary(data))) => data,
                Some(Ok(Message::Ping(data))) => {
                    let _ = outgoing.try_send(Outgoing::Pong(data));
                    continue;
                }
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|f| f.reason.to_string())
                        .filter(|reason| !reason.is_empty());
                    tracing::info!(reason = ?reason, "Gemini Live session closed by server");
                    state.advance(SessionState::Closed);
                    dispatch(LiveEvent::Closed(reason)).await;
                    break;
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    tracing::error!("Gemini WebSocket error: {}", e);
                    state.advance(SessionState::Failed);
                    dispatch(LiveEvent::Error(e.to_string())).await;
                    dispatch(LiveEvent::Closed(Some(e.to_string()))).await;
                    break;
                }
                None => {
                    state.advance(SessionState::Closed);
                    dispatch(LiveEvent::Closed(None)).await;
                    break;
                }
            };

            let message = match ServerMessage::from_slice(&payload) {
                Ok(message) => message,
                Err(e) => {
                    tracing::warn!("Failed to parse Gemini server message: {}", e);
                    continue;
                }
            };

            if let Some(go_away) = &message.go_away {
                tracing::warn!(time_left = ?go_away.time_left, "Gemini server sent goAway");
            }
            if let Some(content) = &message.server_content
                && content.turn_complete
            {
                tracing::debug!("Gemini turn complete");
            }

            for event in message.into_events() {
                dispatch(event).await;
            }
        }

        tracing::debug!("Gemini reader task ended");
    }
}

#[async_trait]
impl LiveSession for GeminiLiveSession {
    fn state(&self) -> SessionState {
        self.state.get()
    }

    async fn send_media(&self, chunk: MediaChunk) -> LiveResult<()> {
        let state = self.state.get();
        if state != SessionState::Open {
            return Err(LiveError::NotOpen(state));
        }

        self.outgoing
            .send(Outgoing::Message(ClientMessage::media(chunk)))
            .await
            .map_err(|_| LiveError::WebSocketError("Gemini writer task stopped".to_string()))
    }

    async fn close(&mut self) -> LiveResult<()> {
        if self.suppressed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.state.advance(SessionState::Closing);
        self.reader_task.abort();

        if self.outgoing.try_send(Outgoing::Close).is_err() {
            // Writer is gone or backed up; drop the socket instead
            self.writer_task.abort();
            self.state.set(SessionState::Closed);
        }

        tracing::info!(session_id = %self.session_id, "Gemini Live session close requested");
        Ok(())
    }

    fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl Drop for GeminiLiveSession {
    fn drop(&mut self) {
        if !self.suppressed.swap(true, Ordering::SeqCst) {
            self.reader_task.abort();
            if self.outgoing.try_send(Outgoing::Close).is_err() {
                self.writer_task.abort();
            }
        }
    }
}
