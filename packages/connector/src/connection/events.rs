//! Connector Events
//!
//! Typed lifecycle events and the handler registry that dispatches them.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::ConnectorError;

/// Event kinds a handler can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connect,
    Message,
    Disconnect,
    Error,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::Connect => write!(f, "connect"),
            EventKind::Message => write!(f, "message"),
            EventKind::Disconnect => write!(f, "disconnect"),
            EventKind::Error => write!(f, "error"),
        }
    }
}

/// Events surfaced to registered handlers
#[derive(Debug, Clone)]
pub enum ConnectorEvent {
    /// A channel was established
    Connected,
    /// A decoded payload arrived
    Message(serde_json::Value),
    /// The channel closed
    Disconnected { reason: Option<String> },
    /// A failure during an established session
    Error(Arc<ConnectorError>),
}

impl ConnectorEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ConnectorEvent::Connected => EventKind::Connect,
            ConnectorEvent::Message(_) => EventKind::Message,
            ConnectorEvent::Disconnected { .. } => EventKind::Disconnect,
            ConnectorEvent::Error(_) => EventKind::Error,
        }
    }
}

/// Identifies a registration for later removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

pub type Handler = Arc<dyn Fn(&ConnectorEvent) + Send + Sync>;

/// Ordered handler lists keyed by event kind
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<EventKind, Vec<(HandlerId, Handler)>>>,
    next_id: AtomicU64,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler; duplicates are kept and invoked once per registration
    pub fn register<F>(&self, kind: EventKind, handler: F) -> HandlerId
    where
        F: Fn(&ConnectorEvent) + Send + Sync + 'static,
    {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .write()
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove a handler, returning whether it was registered
    pub fn remove(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.write();
        for list in handlers.values_mut() {
            if let Some(pos) = list.iter().position(|(h, _)| *h == id) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.handlers.read().get(&kind).map_or(0, Vec::len)
    }

    /// Invoke every handler for the event's kind in registration order
    pub fn dispatch(&self, event: &ConnectorEvent) {
        // Snapshot so handlers may register or remove without deadlocking
        let snapshot: Vec<Handler> = match self.handlers.read().get(&event.kind()) {
            Some(list) => list.iter().map(|(_, h)| h.clone()).collect(),
            None => return,
        };

        tracing::trace!(event = %event.kind(), handlers = snapshot.len(), "Dispatching event");

        for handler in snapshot {
            handler(event);
        }
    }
}
