use anyhow::{Context, Result};
use colored::Colorize;
use meetvoice_connector::connection::protocol::DEFAULT_VOICE;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

use crate::api::ApiClient;
use crate::config::AppContext;

#[derive(Debug, Serialize)]
struct TtsRequest<'a> {
    text: &'a str,
    voice: &'a str,
    rate: &'a str,
    pitch: &'a str,
}

/// Synthesize `text` and write the MP3 to `output`
pub async fn run(ctx: &AppContext, text: &str, voice: Option<&str>, output: &Path) -> Result<()> {
    let api = ApiClient::new(Duration::from_secs(30))?;
    let url = ctx.endpoints.tts_generate();

    let request = TtsRequest {
        text,
        voice: voice.unwrap_or(DEFAULT_VOICE),
        rate: "+0%",
        pitch: "+0Hz",
    };
    let audio = api.post_bytes(&url, &request).await?;

    std::fs::write(output, &audio)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "{} Wrote {} bytes to {}",
        "✓".green().bold(),
        audio.len(),
        output.display().to_string().dimmed()
    );

    Ok(())
}
