//! WebSocket Connector
//!
//! Provides a duplex channel to one address with bounded linear retry,
//! typed lifecycle events and an explicit close.

use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, timeout, Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

use crate::connection::dialer::{Dialer, TungsteniteDialer, WsStream};
use crate::connection::events::{ConnectorEvent, EventKind, HandlerId, HandlerRegistry};
use crate::connection::retry::RetryPolicy;
use crate::connection::state::{ConnectionState, ConnectionStateManager, StateTransition};
use crate::error::{ConnectorError, Result};

const OUTGOING_BUFFER: usize = 100;
const CLOSE_GRACE: Duration = Duration::from_secs(2);
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_KEEPALIVE: Duration = Duration::from_secs(30);

/// Details of an established channel
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub session_id: Uuid,
    pub address: String,
    pub attempts: u32,
    pub connected_at: DateTime<Utc>,
}

struct Outgoing {
    message: Message,
    ack: oneshot::Sender<()>,
}

struct ActiveSession {
    id: Uuid,
    outgoing: mpsc::Sender<Outgoing>,
    close_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

struct Shared {
    state: ConnectionStateManager,
    handlers: HandlerRegistry,
    session: Mutex<Option<ActiveSession>>,
    // Bumped by disconnect; an in-flight connect cycle aborts when it changes
    epoch: watch::Sender<u64>,
}

/// Resilient WebSocket connector
pub struct Connector {
    url: Url,
    policy: RetryPolicy,
    keepalive: Option<Duration>,
    dialer: Arc<dyn Dialer>,
    shared: Arc<Shared>,
    connect_lock: AsyncMutex<()>,
}

impl Connector {
    /// Start building a connector for `address`
    pub fn builder(address: &str) -> ConnectorBuilder {
        ConnectorBuilder::new(address)
    }

    pub fn address(&self) -> &str {
        self.url.as_str()
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state.current_state()
    }

    pub fn is_connected(&self) -> bool {
        self.shared.state.is_connected()
    }

    /// Recent state transitions, newest first
    pub fn recent_transitions(&self, count: usize) -> Vec<StateTransition> {
        self.shared.state.recent_transitions(count)
    }

    /// Register a handler for an event kind
    pub fn on<F>(&self, kind: EventKind, handler: F) -> HandlerId
    where
        F: Fn(&ConnectorEvent) + Send + Sync + 'static,
    {
        self.shared.handlers.register(kind, handler)
    }

    /// Remove a previously registered handler
    pub fn off(&self, id: HandlerId) -> bool {
        self.shared.handlers.remove(id)
    }

    /// Open a channel, retrying with linear backoff until the attempt budget is spent.
    ///
    /// A live channel is closed and replaced. Calling [`Connector::disconnect`]
    /// while this is pending aborts the cycle with [`ConnectorError::Aborted`].
    pub async fn connect(&self) -> Result<SessionHandle> {
        // Snapshot before queueing so a disconnect while waiting for the lock counts
        let mut cancel = self.shared.epoch.subscribe();
        let epoch = *cancel.borrow_and_update();

        let _guard = self.connect_lock.lock().await;
        if *cancel.borrow() != epoch {
            return Err(self.aborted());
        }

        let previous = self.shared.session.lock().take();
        if let Some(previous) = previous {
            info!(session_id = %previous.id, "Replacing existing connection");
            shutdown_session(previous).await;
        }

        self.shared.state.begin_cycle();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            self.shared.state.set_connecting(attempt);

            info!(
                url = %self.url,
                attempt,
                max_attempts = self.policy.max_attempts,
                "Connecting"
            );

            let outcome = tokio::select! {
                biased;
                _ = cancelled(&mut cancel) => return Err(self.aborted()),
                result = timeout(self.policy.attempt_timeout, self.dialer.dial(&self.url)) => {
                    match result {
                        Ok(dialed) => dialed,
                        Err(_) => Err(ConnectorError::Timeout(self.policy.attempt_timeout)),
                    }
                }
            };

            let err = match outcome {
                Ok(stream) => return self.start_session(stream, attempt, epoch),
                Err(e) => e,
            };

            if !err.is_retryable() {
                error!(url = %self.url, error = %err, "Connection attempt failed permanently");
                self.shared.state.set_failed(err.to_string());
                return Err(err);
            }

            let Some(delay) = self.policy.delay_after(attempt) else {
                error!(
                    url = %self.url,
                    attempts = attempt,
                    error = %err,
                    "Connection attempts exhausted"
                );
                self.shared.state.set_failed(err.to_string());
                return Err(ConnectorError::ConnectionExhausted {
                    address: self.url.to_string(),
                    attempts: attempt,
                    last: Box::new(err),
                });
            };

            warn!(
                url = %self.url,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Connection attempt failed, backing off"
            );
            self.shared.state.set_backing_off(err.to_string());

            tokio::select! {
                biased;
                _ = cancelled(&mut cancel) => return Err(self.aborted()),
                _ = sleep(delay) => {}
            }
        }
    }

    /// Serialize `payload` as JSON and write it to the open channel
    pub async fn send<T: Serialize + ?Sized>(&self, payload: &T) -> Result<()> {
        let outgoing = {
            let slot = self.shared.session.lock();
            match slot.as_ref() {
                Some(session) if self.shared.state.is_connected() => session.outgoing.clone(),
                _ => return Err(ConnectorError::NotConnected),
            }
        };

        let text = serde_json::to_string(payload)?;
        let (ack_tx, ack_rx) = oneshot::channel();

        outgoing
            .send(Outgoing {
                message: Message::Text(text),
                ack: ack_tx,
            })
            .await
            .map_err(|_| ConnectorError::NotConnected)?;

        // Dropped ack means the session ended before the write; the failure
        // itself is reported through the error/disconnect events
        ack_rx.await.map_err(|_| ConnectorError::NotConnected)
    }

    /// Close the channel if open and cancel any pending connect cycle. Idempotent.
    pub async fn disconnect(&self) {
        let session = {
            let mut slot = self.shared.session.lock();
            self.shared.epoch.send_modify(|epoch| *epoch += 1);
            if self.shared.state.current_state() != ConnectionState::Closed {
                self.shared.state.set_closed();
            }
            slot.take()
        };

        if let Some(session) = session {
            let session_id = session.id;
            shutdown_session(session).await;
            info!(session_id = %session_id, "Disconnected");
        }
    }

    fn aborted(&self) -> ConnectorError {
        info!(url = %self.url, "Connect aborted by disconnect");
        if self.shared.state.current_state() != ConnectionState::Closed {
            self.shared.state.set_closed();
        }
        ConnectorError::Aborted
    }

    fn start_session(&self, stream: WsStream, attempts: u32, epoch: u64) -> Result<SessionHandle> {
        let session_id = Uuid::new_v4();
        let (outgoing_tx, outgoing_rx) = mpsc::channel(OUTGOING_BUFFER);
        let (close_tx, close_rx) = oneshot::channel();
        let (ready_tx, ready_rx) = oneshot::channel();

        {
            let mut slot = self.shared.session.lock();
            if *self.shared.epoch.borrow() != epoch {
                // disconnect landed during the handshake
                drop(slot);
                return Err(self.aborted());
            }

            let task = tokio::spawn(run_session(
                self.shared.clone(),
                session_id,
                stream,
                SessionChannels {
                    outgoing_rx,
                    close_rx,
                    ready_rx,
                },
                self.keepalive,
            ));

            *slot = Some(ActiveSession {
                id: session_id,
                outgoing: outgoing_tx,
                close_tx: Some(close_tx),
                task,
            });
            self.shared.state.set_connected();
        }

        let connected_at = self.shared.state.last_connected().unwrap_or_else(Utc::now);
        info!(
            url = %self.url,
            session_id = %session_id,
            attempts,
            "WebSocket connection established"
        );

        self.shared.handlers.dispatch(&ConnectorEvent::Connected);
        let _ = ready_tx.send(());

        Ok(SessionHandle {
            session_id,
            address: self.url.to_string(),
            attempts,
            connected_at,
        })
    }
}

impl Drop for Connector {
    fn drop(&mut self) {
        self.shared.epoch.send_modify(|epoch| *epoch += 1);
        if let Some(mut session) = self.shared.session.lock().take() {
            if let Some(close_tx) = session.close_tx.take() {
                let _ = close_tx.send(());
            }
        }
    }
}

/// Open a connector to `address`, making up to `max_attempts` attempts
pub async fn connect(address: &str, max_attempts: u32) -> Result<Connector> {
    let connector = Connector::builder(address).max_attempts(max_attempts).build()?;
    connector.connect().await?;
    Ok(connector)
}

async fn cancelled(rx: &mut watch::Receiver<u64>) {
    if rx.changed().await.is_err() {
        std::future::pending::<()>().await;
    }
}

async fn shutdown_session(mut session: ActiveSession) {
    if let Some(close_tx) = session.close_tx.take() {
        let _ = close_tx.send(());
    }

    if timeout(SHUTDOWN_TIMEOUT, &mut session.task).await.is_err() {
        warn!(session_id = %session.id, "Session did not close in time, aborting");
        session.task.abort();
    }
}

struct SessionChannels {
    outgoing_rx: mpsc::Receiver<Outgoing>,
    close_rx: oneshot::Receiver<()>,
    ready_rx: oneshot::Receiver<()>,
}

async fn run_session(
    shared: Arc<Shared>,
    session_id: Uuid,
    stream: WsStream,
    channels: SessionChannels,
    keepalive: Option<Duration>,
) {
    let SessionChannels {
        mut outgoing_rx,
        mut close_rx,
        ready_rx,
    } = channels;

    if ready_rx.await.is_err() {
        return;
    }

    let (mut write, mut read) = stream.split();
    let mut keepalive = keepalive.map(|period| {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });
    let mut outgoing_open = true;

    let reason: String = loop {
        tokio::select! {
            _ = &mut close_rx => {
                debug!(session_id = %session_id, "Sending close frame");
                if let Err(e) = write.send(Message::Close(None)).await {
                    debug!(error = %e, "Close frame not delivered");
                } else {
                    // Wait briefly for the peer to acknowledge the close
                    let _ = timeout(CLOSE_GRACE, async {
                        while let Some(Ok(msg)) = read.next().await {
                            match msg {
                                Message::Text(text) => handle_payload(&shared, text.as_bytes()),
                                Message::Binary(data) => handle_payload(&shared, &data),
                                Message::Close(_) => break,
                                _ => {}
                            }
                        }
                    })
                    .await;
                }
                break "Closed by client".to_string();
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_payload(&shared, text.as_bytes());
                    }
                    Some(Ok(Message::Binary(data))) => {
                        handle_payload(&shared, &data);
                    }
                    Some(Ok(Message::Ping(data))) => {
                        debug!("Received ping, sending pong");
                        if let Err(e) = write.send(Message::Pong(data)).await {
                            break report_transport_error(&shared, e);
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        debug!("Received pong");
                    }
                    Some(Ok(Message::Close(frame))) => {
                        info!(?frame, "Received close frame");
                        // Push out the close reply queued by tungstenite
                        if let Err(e) = write.flush().await {
                            debug!(error = %e, "Close reply not flushed");
                        }
                        break frame
                            .map(|f| f.reason.to_string())
                            .filter(|r| !r.is_empty())
                            .unwrap_or_else(|| "Server closed connection".to_string());
                    }
                    Some(Ok(Message::Frame(_))) => {}
                    Some(Err(e)) => {
                        break report_transport_error(&shared, e);
                    }
                    None => {
                        info!("WebSocket stream ended");
                        break "Stream ended".to_string();
                    }
                }
            }

            outgoing = outgoing_rx.recv(), if outgoing_open => {
                match outgoing {
                    Some(Outgoing { message, ack }) => {
                        if let Err(e) = write.send(message).await {
                            break report_transport_error(&shared, e);
                        }
                        let _ = ack.send(());
                    }
                    None => outgoing_open = false,
                }
            }

            _ = next_tick(&mut keepalive) => {
                debug!("Sending keep-alive ping");
                if let Err(e) = write.send(Message::Ping(Vec::new())).await {
                    break report_transport_error(&shared, e);
                }
            }
        }
    };

    let owned = {
        let mut slot = shared.session.lock();
        if slot.as_ref().map(|s| s.id) == Some(session_id) {
            slot.take();
            true
        } else {
            false
        }
    };

    // Sessions closed by disconnect or replacement leave the state alone
    if owned {
        shared.state.set_disconnected(Some(reason.clone()));
    }

    info!(session_id = %session_id, reason = %reason, "WebSocket session ended");
    shared.handlers.dispatch(&ConnectorEvent::Disconnected {
        reason: Some(reason),
    });
}

fn handle_payload(shared: &Shared, data: &[u8]) {
    match serde_json::from_slice::<serde_json::Value>(data) {
        Ok(value) => shared.handlers.dispatch(&ConnectorEvent::Message(value)),
        Err(e) => {
            warn!(error = %e, "Failed to decode incoming payload");
            let err = ConnectorError::Protocol(format!("undecodable payload: {}", e));
            shared.handlers.dispatch(&ConnectorEvent::Error(Arc::new(err)));
        }
    }
}

fn report_transport_error(
    shared: &Shared,
    e: tokio_tungstenite::tungstenite::Error,
) -> String {
    error!(error = %e, "WebSocket error");
    let reason = format!("WebSocket error: {}", e);
    shared
        .handlers
        .dispatch(&ConnectorEvent::Error(Arc::new(ConnectorError::Transport(e))));
    reason
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Builder for [`Connector`]
pub struct ConnectorBuilder {
    address: String,
    policy: RetryPolicy,
    keepalive: Option<Duration>,
    dialer: Option<Arc<dyn Dialer>>,
}

impl ConnectorBuilder {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            policy: RetryPolicy::default(),
            keepalive: Some(DEFAULT_KEEPALIVE),
            dialer: None,
        }
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.policy.max_attempts = max_attempts;
        self
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.policy.base_delay = delay;
        self
    }

    pub fn attempt_timeout(mut self, limit: Duration) -> Self {
        self.policy.attempt_timeout = limit;
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Interval between keep-alive pings; `None` disables them
    pub fn keepalive(mut self, interval: Option<Duration>) -> Self {
        self.keepalive = interval.filter(|d| !d.is_zero());
        self
    }

    /// Replace the network dialer
    pub fn dialer<D: Dialer + 'static>(mut self, dialer: D) -> Self {
        self.dialer = Some(Arc::new(dialer));
        self
    }

    pub fn build(self) -> Result<Connector> {
        let url = parse_address(&self.address)?;
        self.policy.validate()?;

        let (epoch, _) = watch::channel(0);

        Ok(Connector {
            url,
            policy: self.policy,
            keepalive: self.keepalive,
            dialer: self.dialer.unwrap_or_else(|| Arc::new(TungsteniteDialer)),
            shared: Arc::new(Shared {
                state: ConnectionStateManager::new(),
                handlers: HandlerRegistry::new(),
                session: Mutex::new(None),
                epoch,
            }),
            connect_lock: AsyncMutex::new(()),
        })
    }
}

/// Validate a `ws://` or `wss://` endpoint locator
pub fn parse_address(address: &str) -> Result<Url> {
    let invalid = |reason: String| ConnectorError::InvalidAddress {
        address: address.to_string(),
        reason,
    };

    let url = Url::parse(address).map_err(|e| invalid(e.to_string()))?;

    if !matches!(url.scheme(), "ws" | "wss") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }

    Ok(url)
}
