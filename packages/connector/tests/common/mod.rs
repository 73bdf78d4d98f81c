//! Shared utilities for connector integration tests.

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{accept_async, WebSocketStream};
use url::Url;

use async_trait::async_trait;
use meetvoice_connector::{ConnectorError, Dialer, WsStream};
use parking_lot::Mutex;

pub type ServerStream = WebSocketStream<TcpStream>;

/// Start a WebSocket server on an ephemeral port, running `handler` per connection.
pub async fn start_ws_server<F, Fut>(handler: F) -> SocketAddr
where
    F: Fn(ServerStream) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handler = Arc::new(handler);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    let handler = handler.clone();
                    tokio::spawn(async move {
                        if let Ok(ws) = accept_async(socket).await {
                            handler(ws).await;
                        }
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Echo text and binary frames back; keeps reading so close replies are flushed.
pub async fn echo(mut ws: ServerStream) {
    while let Some(Ok(msg)) = ws.next().await {
        if (msg.is_text() || msg.is_binary()) && ws.send(msg).await.is_err() {
            break;
        }
    }
}

/// Send the given frames, then wait for the client to go away.
pub fn scripted(frames: Vec<Message>) -> impl Fn(ServerStream) -> std::pin::Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync {
    move |mut ws: ServerStream| {
        let frames = frames.clone();
        Box::pin(async move {
            for frame in frames {
                if ws.send(frame).await.is_err() {
                    return;
                }
            }
            while let Some(Ok(_)) = ws.next().await {}
        })
    }
}

/// Close the connection from the server side right away.
pub async fn close_immediately(mut ws: ServerStream) {
    let _ = ws.close(None).await;
    while let Some(Ok(_)) = ws.next().await {}
}

pub fn ws_url(addr: SocketAddr) -> String {
    format!("ws://{}/ws/chat/test-user", addr)
}

/// A port with nothing listening on it
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Poll `cond` until it holds or `limit` elapses
pub async fn wait_until<F: Fn() -> bool>(cond: F, limit: Duration) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

/// Dialer that always fails, recording when each attempt started
#[derive(Clone, Default)]
pub struct FailingDialer {
    pub attempts: Arc<AtomicU32>,
    pub started: Arc<Mutex<Vec<Instant>>>,
}

impl FailingDialer {
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Dialer for FailingDialer {
    async fn dial(&self, _url: &Url) -> meetvoice_connector::Result<WsStream> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.started.lock().push(Instant::now());
        Err(ConnectorError::Transport(tungstenite::Error::ConnectionClosed))
    }
}

/// Dialer whose attempts never complete
#[derive(Clone, Default)]
pub struct HangingDialer {
    pub attempts: Arc<AtomicU32>,
}

#[async_trait]
impl Dialer for HangingDialer {
    async fn dial(&self, _url: &Url) -> meetvoice_connector::Result<WsStream> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

/// Dialer failing with a non-retryable error
pub struct MisconfiguredDialer {
    pub attempts: Arc<AtomicU32>,
}

#[async_trait]
impl Dialer for MisconfiguredDialer {
    async fn dial(&self, _url: &Url) -> meetvoice_connector::Result<WsStream> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(ConnectorError::InvalidConfig("client certificate missing".to_string()))
    }
}
