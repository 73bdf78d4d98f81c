//! API Client
//!
//! HTTP client for the MeetVoice REST endpoints.

use anyhow::{bail, Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Error body returned by the services
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: String,
}

/// Outcome of probing a service root
pub struct Probe {
    pub status: Option<StatusCode>,
    pub elapsed: Duration,
    pub error: Option<String>,
}

impl Probe {
    pub fn is_ok(&self) -> bool {
        self.status.map_or(false, |s| s.is_success())
    }
}

pub struct ApiClient {
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client })
    }

    /// GET request decoding a JSON body
    pub async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.execute(self.client.get(url), url).await?;
        decode(response, url).await
    }

    /// GET request returning the raw body (audio files)
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.execute(self.client.get(url), url).await?;
        read_bytes(response, url).await
    }

    /// POST a JSON body and decode the JSON answer
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T> {
        let response = self.execute(self.client.post(url).json(body), url).await?;
        decode(response, url).await
    }

    /// POST without a body and decode the JSON answer
    pub async fn trigger<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.execute(self.client.post(url), url).await?;
        decode(response, url).await
    }

    /// POST a JSON body and return the raw answer (audio files)
    pub async fn post_bytes<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<Vec<u8>> {
        let response = self.execute(self.client.post(url).json(body), url).await?;
        read_bytes(response, url).await
    }

    /// GET `url` and time the response
    pub async fn probe(&self, url: &str) -> Probe {
        let started = Instant::now();
        match self.client.get(url).send().await {
            Ok(response) => Probe {
                status: Some(response.status()),
                elapsed: started.elapsed(),
                error: None,
            },
            Err(e) => Probe {
                status: None,
                elapsed: started.elapsed(),
                error: Some(e.to_string()),
            },
        }
    }

    async fn execute(&self, request: RequestBuilder, url: &str) -> Result<Response> {
        let response = request
            .send()
            .await
            .with_context(|| describe_unreachable(url))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let detail = response
            .json::<ErrorBody>()
            .await
            .map(|body| body.detail)
            .ok();

        match (status, detail) {
            (StatusCode::NOT_FOUND, Some(detail)) => {
                bail!("Resource not found on the server: {} ({})", url, detail)
            }
            (StatusCode::NOT_FOUND, None) => bail!("Resource not found on the server: {}", url),
            (_, Some(detail)) => bail!("HTTP {} from {}: {}", status, url, detail),
            (_, None) => bail!("HTTP {} from {}", status, url),
        }
    }
}

async fn decode<T: DeserializeOwned>(response: Response, url: &str) -> Result<T> {
    response
        .json()
        .await
        .with_context(|| format!("Invalid JSON from {}", url))
}

async fn read_bytes(response: Response, url: &str) -> Result<Vec<u8>> {
    let bytes = response
        .bytes()
        .await
        .with_context(|| format!("Failed to read response from {}", url))?;
    Ok(bytes.to_vec())
}

fn describe_unreachable(url: &str) -> String {
    format!("Server not reachable at {}. Check that the service is running.", url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    /// Answer one request with `status` and `body`, handing back the raw request
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            request
        });

        (format!("http://{}", addr), handle)
    }

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let headers = String::from_utf8_lossy(&buf[..end]).to_lowercase();
                let length = headers
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|value| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    #[tokio::test]
    async fn test_post_sends_json_and_decodes_answer() {
        let (base, server) = serve_once("200 OK", r#"{"response":"Bonjour !","provider":"gemini"}"#).await;
        let api = ApiClient::new(Duration::from_secs(5)).unwrap();

        let answer: Value = api
            .post(&format!("{}/ia", base), &json!({"prompt": "Salut", "include_audio": false}))
            .await
            .unwrap();
        assert_eq!(answer["response"], "Bonjour !");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /ia "));
        assert!(request.contains(r#""include_audio":false"#));
    }

    #[tokio::test]
    async fn test_trigger_posts_without_body() {
        let (base, server) = serve_once("200 OK", r#"{"success":true}"#).await;
        let api = ApiClient::new(Duration::from_secs(5)).unwrap();

        let answer: Value = api
            .trigger(&format!("{}/inscription/generate-all", base))
            .await
            .unwrap();
        assert_eq!(answer["success"], true);

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /inscription/generate-all "));
    }

    #[tokio::test]
    async fn test_error_detail_is_reported() {
        let (base, _server) = serve_once("500 Internal Server Error", r#"{"detail":"Erreur TTS: timeout"}"#).await;
        let api = ApiClient::new(Duration::from_secs(5)).unwrap();

        let err = api
            .post_bytes(&format!("{}/tts", base), &json!({"text": "Bonjour"}))
            .await
            .unwrap_err()
            .to_string();
        assert!(err.contains("500"));
        assert!(err.contains("Erreur TTS: timeout"));
    }

    #[tokio::test]
    async fn test_not_found_is_readable() {
        let (base, _server) = serve_once("404 Not Found", r#"{"detail":"Question non trouvée"}"#).await;
        let api = ApiClient::new(Duration::from_secs(5)).unwrap();

        let err = api
            .get_bytes(&format!("{}/inscription/question/99", base))
            .await
            .unwrap_err()
            .to_string();
        assert!(err.starts_with("Resource not found"));
        assert!(err.contains("Question non trouvée"));
    }
}
