//! Mock live-session providers for integration tests
//!
//! - `live_mock`: in-process `LiveConnector` whose opens are completed by the test
//! - `gemini_mock`: WebSocket server speaking the Gemini Live protocol

// Each test binary uses a different subset of these helpers
#![allow(dead_code)]

pub mod gemini_mock;
pub mod live_mock;

use std::future::Future;
use std::time::Duration;

/// Default wait for anything a test expects to happen.
pub const WAIT: Duration = Duration::from_secs(3);

/// Await `future`, panicking with `what` if it takes longer than [`WAIT`].
pub async fn within<F: Future>(what: &str, future: F) -> F::Output {
    tokio::time::timeout(WAIT, future)
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
}

/// Give spawned tasks a chance to run.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
