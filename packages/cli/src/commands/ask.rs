use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use colored::Colorize;
use indicatif::ProgressBar;
use meetvoice_connector::connection::protocol::{DEFAULT_SYSTEM_PROMPT, DEFAULT_VOICE};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::api::ApiClient;
use crate::config::AppContext;

/// One-shot prompt for `POST /ia`
#[derive(Debug, Serialize)]
pub struct IaRequest {
    pub prompt: String,
    pub system_prompt: String,
    pub voice: String,
    pub rate: String,
    pub pitch: String,
    pub include_audio: bool,
}

impl IaRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            rate: "+0%".to_string(),
            pitch: "+0Hz".to_string(),
            include_audio: true,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct IaResponse {
    pub response: String,
    pub provider: String,
    pub processing_time: f64,
    #[serde(default)]
    pub fallback_used: bool,
    /// Base64 MP3 of the answer
    #[serde(default)]
    pub response_audio: Option<String>,
}

/// Ask the IA service without streaming
pub async fn run(
    ctx: &AppContext,
    prompt: String,
    system_prompt: Option<String>,
    audio_out: Option<PathBuf>,
) -> Result<()> {
    if prompt.trim().is_empty() {
        bail!("Prompt cannot be empty");
    }

    let mut request = IaRequest::new(prompt);
    if let Some(system_prompt) = system_prompt {
        request.system_prompt = system_prompt;
    }
    request.include_audio = audio_out.is_some();

    // Speech synthesis on the server side is slow
    let api = ApiClient::new(Duration::from_secs(60))?;
    let url = ctx.endpoints.ia_chat();

    let spinner = ProgressBar::new_spinner();
    spinner.set_message("Sophie réfléchit...");
    spinner.enable_steady_tick(Duration::from_millis(100));
    let answer: Result<IaResponse> = api.post(&url, &request).await;
    spinner.finish_and_clear();
    let answer = answer?;

    println!("{}", answer.response);
    println!();
    println!(
        "{}",
        format!(
            "{} in {:.2}s{}",
            answer.provider,
            answer.processing_time,
            if answer.fallback_used { " (fallback)" } else { "" }
        )
        .dimmed()
    );

    if let Some(path) = audio_out {
        let encoded = answer
            .response_audio
            .context("The service returned no audio")?;
        let audio = STANDARD
            .decode(encoded.as_bytes())
            .context("Invalid audio payload")?;
        std::fs::write(&path, &audio)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!(
            "{} Saved audio to {}",
            "✓".green().bold(),
            path.display().to_string().dimmed()
        );
    }

    Ok(())
}
