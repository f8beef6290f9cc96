//! WebSocket mock of the Gemini Live API
//!
//! Accepts any number of connections. Each connection expects a `setup`
//! message first, then echoes every `realtimeInput` media chunk back as model
//! audio. A chunk whose data is `INTERRUPT` is answered with an interruption
//! instead.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

use super::within;

/// How the mock answers the setup message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupBehavior {
    /// Reply with `setupComplete` and serve the session
    Complete,
    /// Close the socket instead of completing setup
    CloseBeforeSetup,
    /// Complete setup, then close the socket right away
    CompleteThenClose,
}

/// Observable server-side events.
#[derive(Debug, Clone, PartialEq)]
pub enum MockGeminiEvent {
    Connected { index: usize, uri: String },
    Received { index: usize, message: Value },
    Closed { index: usize },
}

pub struct MockGeminiServer {
    pub url: String,
    events: Mutex<mpsc::UnboundedReceiver<MockGeminiEvent>>,
    connections: Arc<AtomicUsize>,
}

impl MockGeminiServer {
    pub async fn start(behavior: SetupBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let connections = Arc::new(AtomicUsize::new(0));

        let counter = connections.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let index = counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(handle_connection(stream, index, behavior, events_tx.clone()));
            }
        });

        Self {
            url: format!("ws://{addr}/ws/live"),
            events: Mutex::new(events_rx),
            connections,
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub async fn next_event(&self) -> MockGeminiEvent {
        let mut events = self.events.lock().await;
        within("Gemini mock event", events.recv())
            .await
            .expect("mock server stopped")
    }

    /// Skip events until one matches `predicate`.
    pub async fn wait_for<F>(&self, what: &str, mut predicate: F) -> MockGeminiEvent
    where
        F: FnMut(&MockGeminiEvent) -> bool,
    {
        within(what, async {
            loop {
                let event = self.next_event().await;
                if predicate(&event) {
                    return event;
                }
            }
        })
        .await
    }

    /// True if no event arrives within `wait`.
    pub async fn quiet_for(&self, wait: Duration) -> bool {
        let mut events = self.events.lock().await;
        tokio::time::timeout(wait, events.recv()).await.is_err()
    }
}

async fn handle_connection(
    stream: TcpStream,
    index: usize,
    behavior: SetupBehavior,
    events: mpsc::UnboundedSender<MockGeminiEvent>,
) {
    let mut uri = String::new();
    let accepted = accept_hdr_async(stream, |request: &Request, response: Response| {
        uri = request.uri().to_string();
        Ok::<_, ErrorResponse>(response)
    })
    .await;
    let Ok(ws_stream) = accepted else {
        return;
    };
    let _ = events.send(MockGeminiEvent::Connected { index, uri });

    let (mut write, mut read) = ws_stream.split();

    while let Some(Ok(frame)) = read.next().await {
        let text = match frame {
            Message::Text(text) => text.to_string(),
            Message::Binary(data) => String::from_utf8_lossy(&data).to_string(),
            Message::Close(_) => break,
            _ => continue,
        };
        let Ok(message) = serde_json::from_str::<Value>(&text) else {
            continue;
        };
        let _ = events.send(MockGeminiEvent::Received {
            index,
            message: message.clone(),
        });

        if message.get("setup").is_some() {
            match behavior {
                SetupBehavior::CloseBeforeSetup => {
                    let _ = write.send(Message::Close(None)).await;
                    break;
                }
                SetupBehavior::Complete | SetupBehavior::CompleteThenClose => {
                    // Gemini delivers JSON in binary frames
                    let reply = json!({"setupComplete": {}}).to_string();
                    let _ = write.send(Message::Binary(reply.into_bytes().into())).await;
                    if behavior == SetupBehavior::CompleteThenClose {
                        let _ = write.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
            continue;
        }

        let chunks = message["realtimeInput"]["mediaChunks"]
            .as_array()
            .cloned()
            .unwrap_or_default();
        for chunk in chunks {
            let data = chunk["data"].as_str().unwrap_or_default();
            let reply = if data == "INTERRUPT" {
                json!({"serverContent": {"interrupted": true}})
            } else {
                json!({
                    "serverContent": {
                        "modelTurn": {
                            "parts": [{
                                "inlineData": {"mimeType": "audio/pcm;rate=24000", "data": data}
                            }]
                        }
                    }
                })
            };
            let _ = write.send(Message::Text(reply.to_string().into())).await;
        }
    }

    let _ = events.send(MockGeminiEvent::Closed { index });
}
