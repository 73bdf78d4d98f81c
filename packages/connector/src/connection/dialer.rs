//! Dialer Trait
//!
//! Opens a single WebSocket connection. The connector owns retry and
//! timeout handling; a dialer performs exactly one attempt per call.

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::Result;

/// Stream type produced by a successful dial
pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// One-shot connection opener
#[async_trait]
pub trait Dialer: Send + Sync {
    /// Open a connection to `url`
    async fn dial(&self, url: &Url) -> Result<WsStream>;
}

/// Dialer backed by `tokio_tungstenite::connect_async`
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteDialer;

#[async_trait]
impl Dialer for TungsteniteDialer {
    async fn dial(&self, url: &Url) -> Result<WsStream> {
        let (stream, response) = connect_async(url.as_str()).await?;
        tracing::debug!(url = %url, status = %response.status(), "WebSocket handshake completed");
        Ok(stream)
    }
}
