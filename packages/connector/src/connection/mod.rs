//! Connection module
//!
//! This module handles the WebSocket channel to the MeetVoice services:
//! retry policy, connection state, event dispatch and the chat protocol.

pub mod dialer;
pub mod events;
pub mod protocol;
pub mod retry;
pub mod state;
pub mod websocket;
