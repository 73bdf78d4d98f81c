//! MeetVoice Connector Library
//!
//! This crate provides a resilient WebSocket channel to the MeetVoice
//! services, including bounded linear retry, typed lifecycle events,
//! the chat wire protocol and per-environment endpoint configuration.

pub mod config;
pub mod connection;
pub mod error;

// Re-exports for convenience
pub use config::{Config, Endpoints, Environment};
pub use connection::dialer::{Dialer, TungsteniteDialer, WsStream};
pub use connection::events::{ConnectorEvent, EventKind, HandlerId};
pub use connection::protocol::{ChatRequest, ChatServerMessage};
pub use connection::retry::RetryPolicy;
pub use connection::state::{ConnectionState, StateTransition};
pub use connection::websocket::{connect, Connector, ConnectorBuilder, SessionHandle};
pub use error::{ConnectorError, Result};
