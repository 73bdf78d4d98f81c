//! Service endpoints resolved once per environment.

use anyhow::{bail, Context, Result};
use url::Url;

use super::{Environment, ServiceUrls};

/// Endpoint table for one environment
#[derive(Debug, Clone)]
pub struct Endpoints {
    environment: Environment,
    tts: Url,
    ia: Url,
    voice: Url,
}

impl Endpoints {
    pub fn resolve(environment: Environment, urls: &ServiceUrls) -> Result<Self> {
        Ok(Self {
            environment,
            tts: parse_base("tts", &urls.tts)?,
            ia: parse_base("ia", &urls.ia)?,
            voice: parse_base("voice", &urls.voice)?,
        })
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// `GET` audio for a sign-up question
    pub fn inscription_question(&self, number: u32) -> String {
        join(&self.tts, &format!("inscription/question/{}", number))
    }

    pub fn inscription_info(&self) -> String {
        join(&self.tts, "inscription/info")
    }

    pub fn inscription_generate_all(&self) -> String {
        join(&self.tts, "inscription/generate-all")
    }

    pub fn tts_generate(&self) -> String {
        join(&self.tts, "tts")
    }

    pub fn ia_chat(&self) -> String {
        join(&self.ia, "ia")
    }

    /// Streaming chat socket for `user_id`
    pub fn ia_websocket(&self, user_id: &str) -> String {
        join(&websocket_base(&self.ia), &format!("ws/chat/{}", user_id))
    }

    /// Voice call socket for `user_id`
    pub fn voice_call(&self, user_id: &str) -> String {
        join(&websocket_base(&self.voice), &format!("ws/voice-call/{}", user_id))
    }

    /// Service roots probed by the connectivity check
    pub fn service_roots(&self) -> Vec<(&'static str, String)> {
        vec![
            ("TTS/Inscription", join(&self.tts, "")),
            ("IA", join(&self.ia, "")),
            ("Voice", join(&self.voice, "")),
        ]
    }
}

fn parse_base(name: &str, raw: &str) -> Result<Url> {
    let url = Url::parse(raw).with_context(|| format!("Invalid {} base URL: {}", name, raw))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("{} base URL must be http or https, got {}", name, raw);
    }
    Ok(url)
}

fn websocket_base(base: &Url) -> Url {
    let scheme = if base.scheme() == "https" { "wss" } else { "ws" };
    let mut url = base.clone();
    // http(s) -> ws(s) keeps the URL special, so set_scheme cannot fail here
    let _ = url.set_scheme(scheme);
    url
}

fn join(base: &Url, path: &str) -> String {
    let root = base.as_str().trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        format!("{}/", root)
    } else {
        format!("{}/{}", root, path)
    }
}
