pub mod live;
pub mod relay;

// Re-export commonly used types for convenience
pub use live::{
    BoxedLiveSession, GeminiLiveConnector, LiveConnector, LiveError, LiveEvent, LiveEventCallback,
    LiveResult, LiveSession, LiveSessionConfig, MediaChunk, SessionState,
};

pub use relay::{
    ClientConnection, ClientSignal, ConnectionId, InboundClientMessage, OutboundClientMessage,
    RelayState, SessionRelay,
};
