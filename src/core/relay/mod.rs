//! Client-facing side of the voice relay: the browser message protocol, the
//! connection wrapper and the per-connection session relay.

pub mod connection;
pub mod messages;
pub mod session;

pub use connection::{ClientConnection, ClientSignal, ConnectionId, ConnectionState};
pub use messages::{InboundClientMessage, OutboundClientMessage, ParseError};
pub use session::{RelayState, SessionRelay};
