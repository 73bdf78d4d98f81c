use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::api::ApiClient;
use crate::config::AppContext;

#[derive(Subcommand)]
pub enum QuestionsCommands {
    /// Download the audio of one sign-up question
    Get {
        /// Question number (1-based)
        number: u32,

        /// Output file (default: q<number>.mp3)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Pre-generate the audio of every question on the server
    Generate,
}

#[derive(Debug, Deserialize)]
struct GeneratedQuestion {
    question: u32,
    text: String,
    #[serde(default)]
    cached: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateAllResponse {
    message: String,
    #[serde(default)]
    files: Vec<GeneratedQuestion>,
}

pub async fn handle(ctx: &AppContext, command: QuestionsCommands) -> Result<()> {
    match command {
        QuestionsCommands::Get { number, output } => get(ctx, number, output).await,
        QuestionsCommands::Generate => generate(ctx).await,
    }
}

async fn get(ctx: &AppContext, number: u32, output: Option<PathBuf>) -> Result<()> {
    let api = ApiClient::new(Duration::from_secs(30))?;
    let audio = api.get_bytes(&ctx.endpoints.inscription_question(number)).await?;

    let output = output.unwrap_or_else(|| default_output(number));
    std::fs::write(&output, &audio)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "{} Question {} saved to {}",
        "✓".green().bold(),
        number,
        output.display().to_string().dimmed()
    );
    Ok(())
}

async fn generate(ctx: &AppContext) -> Result<()> {
    // Generation runs sequentially on the server
    let api = ApiClient::new(Duration::from_secs(300))?;
    let result: GenerateAllResponse = api
        .trigger(&ctx.endpoints.inscription_generate_all())
        .await?;

    println!("{} {}", "✓".green().bold(), result.message);
    for file in &result.files {
        println!(
            "  {:>3}  {}  {}",
            file.question,
            if file.cached { "cached".green() } else { "new".yellow() },
            file.text.dimmed()
        );
    }
    Ok(())
}

fn default_output(number: u32) -> PathBuf {
    PathBuf::from(format!("q{}.mp3", number))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_name() {
        assert_eq!(default_output(7), PathBuf::from("q7.mp3"));
    }

    #[test]
    fn test_generate_all_response() {
        let result: GenerateAllResponse = serde_json::from_str(
            r#"{"success":true,"message":"Toutes les 2 questions générées","voice":"Denise",
                "files":[{"question":1,"text":"Quel est votre prénom ?","cached":true},
                         {"question":2,"text":"Quel âge avez-vous ?","cached":false}]}"#,
        )
        .unwrap();
        assert_eq!(result.files.len(), 2);
        assert!(result.files[0].cached);
        assert_eq!(result.files[1].question, 2);
    }
}
