//! Connection State Management
//!
//! Provides the connector state machine and a shared manager tracking
//! the current phase, attempt count and recent transitions.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;

const MAX_TRANSITIONS: usize = 100;

/// Represents the possible states of a connector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connect has been requested yet
    Idle,
    /// An attempt is in flight
    Connecting,
    /// Waiting before the next attempt
    BackingOff,
    /// A channel is open
    Connected,
    /// An established channel dropped
    Disconnected,
    /// All attempts of the last connect failed
    Failed,
    /// Closed explicitly by the caller
    Closed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Idle => write!(f, "Idle"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::BackingOff => write!(f, "BackingOff"),
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Failed => write!(f, "Failed"),
            ConnectionState::Closed => write!(f, "Closed"),
        }
    }
}

/// State transition information
#[derive(Debug, Clone)]
pub struct StateTransition {
    pub from: ConnectionState,
    pub to: ConnectionState,
    pub timestamp: DateTime<Utc>,
    pub reason: Option<String>,
}

struct StateInner {
    current: ConnectionState,
    last_connected: Option<DateTime<Utc>>,
    attempts: u32,
    transitions: Vec<StateTransition>,
}

/// Thread-safe connection state manager
#[derive(Clone)]
pub struct ConnectionStateManager {
    inner: Arc<RwLock<StateInner>>,
}

impl ConnectionStateManager {
    /// Create a new state manager starting in Idle state
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(StateInner {
                current: ConnectionState::Idle,
                last_connected: None,
                attempts: 0,
                transitions: Vec::new(),
            })),
        }
    }

    pub fn current_state(&self) -> ConnectionState {
        self.inner.read().current
    }

    pub fn last_connected(&self) -> Option<DateTime<Utc>> {
        self.inner.read().last_connected
    }

    /// Attempts made by the current (or last) connect cycle
    pub fn attempts(&self) -> u32 {
        self.inner.read().attempts
    }

    /// Transition to a new state, returning false if the move is not allowed
    pub fn transition_to(&self, new_state: ConnectionState, reason: Option<String>) -> bool {
        let mut inner = self.inner.write();

        if !is_valid_transition(inner.current, new_state) {
            tracing::debug!(
                from = %inner.current,
                to = %new_state,
                "Rejected connector state transition"
            );
            return false;
        }

        let old_state = inner.current;
        let now = Utc::now();
        inner.current = new_state;

        match new_state {
            ConnectionState::Connected => {
                inner.last_connected = Some(now);
            }
            ConnectionState::Connecting => {
                inner.attempts += 1;
            }
            _ => {}
        }

        inner.transitions.push(StateTransition {
            from: old_state,
            to: new_state,
            timestamp: now,
            reason,
        });

        if inner.transitions.len() > MAX_TRANSITIONS {
            inner.transitions.remove(0);
        }

        tracing::info!(
            from = %old_state,
            to = %new_state,
            attempts = inner.attempts,
            "Connector state transition"
        );

        true
    }

    /// Start a fresh connect cycle, resetting the attempt counter
    pub fn begin_cycle(&self) {
        self.inner.write().attempts = 0;
    }

    pub fn set_connecting(&self, attempt: u32) {
        self.transition_to(
            ConnectionState::Connecting,
            Some(format!("Attempt {}", attempt)),
        );
    }

    pub fn set_backing_off(&self, reason: String) {
        self.transition_to(ConnectionState::BackingOff, Some(reason));
    }

    pub fn set_connected(&self) {
        self.transition_to(ConnectionState::Connected, Some("Connection established".to_string()));
    }

    pub fn set_disconnected(&self, reason: Option<String>) {
        self.transition_to(ConnectionState::Disconnected, reason);
    }

    pub fn set_failed(&self, reason: String) {
        self.transition_to(ConnectionState::Failed, Some(reason));
    }

    pub fn set_closed(&self) {
        self.transition_to(ConnectionState::Closed, Some("Disconnect requested".to_string()));
    }

    /// Get recent state transitions, newest first
    pub fn recent_transitions(&self, count: usize) -> Vec<StateTransition> {
        let inner = self.inner.read();
        inner.transitions.iter().rev().take(count).cloned().collect()
    }

    pub fn is_connected(&self) -> bool {
        self.current_state() == ConnectionState::Connected
    }

    /// Check if a connect cycle is in progress
    pub fn is_connecting(&self) -> bool {
        matches!(
            self.current_state(),
            ConnectionState::Connecting | ConnectionState::BackingOff
        )
    }
}

impl Default for ConnectionStateManager {
    fn default() -> Self {
        Self::new()
    }
}

fn is_valid_transition(from: ConnectionState, to: ConnectionState) -> bool {
    use ConnectionState::*;

    // Connecting -> Connecting is a new attempt; other self-transitions are no-ops
    if from == to {
        return true;
    }

    matches!(
        (from, to),
        (Idle, Connecting) |
        (Idle, Closed) |
        // From Connecting
        (Connecting, Connected) |
        (Connecting, BackingOff) |
        (Connecting, Failed) |
        (Connecting, Closed) |
        // From BackingOff
        (BackingOff, Connecting) |
        (BackingOff, Closed) |
        // From Connected
        (Connected, Disconnected) |
        (Connected, Connecting) |
        (Connected, Closed) |
        // Terminal-for-now states may start a new cycle
        (Disconnected, Connecting) |
        (Disconnected, Closed) |
        (Failed, Connecting) |
        (Failed, Closed) |
        (Closed, Connecting)
    )
}
