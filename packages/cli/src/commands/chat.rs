use anyhow::{bail, Context, Result};
use chrono::Utc;
use colored::Colorize;
use dialoguer::Input;
use indicatif::ProgressBar;
use meetvoice_connector::{ChatRequest, ChatServerMessage, ConnectorEvent, EventKind};
use std::io::Write;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::AppContext;

enum ChatUpdate {
    Message(ChatServerMessage),
    Closed(Option<String>),
}

/// Send one prompt over the chat socket and stream the answer
pub async fn run(
    ctx: &AppContext,
    prompt: Option<String>,
    user_id: Option<String>,
    no_audio: bool,
    max_attempts: Option<u32>,
) -> Result<()> {
    let prompt = match prompt {
        Some(prompt) => prompt,
        None => Input::<String>::new().with_prompt("Prompt").interact_text()?,
    };
    if prompt.trim().is_empty() {
        bail!("Prompt cannot be empty");
    }

    let user_id = user_id.unwrap_or_else(|| format!("cli_user_{}", Utc::now().timestamp_millis()));
    let url = ctx.endpoints.ia_websocket(&user_id);

    let mut builder = ctx.config.connector.builder(&url);
    if let Some(attempts) = max_attempts {
        builder = builder.max_attempts(attempts);
    }
    let connector = builder.build()?;

    let (tx, mut rx) = mpsc::unbounded_channel();

    {
        let tx = tx.clone();
        connector.on(EventKind::Message, move |event| {
            if let ConnectorEvent::Message(value) = event {
                match ChatServerMessage::from_value(value.clone()) {
                    Ok(message) => {
                        let _ = tx.send(ChatUpdate::Message(message));
                    }
                    Err(e) => debug!(error = %e, "Ignoring unrecognized message"),
                }
            }
        });
    }
    connector.on(EventKind::Error, |event| {
        if let ConnectorEvent::Error(err) = event {
            warn!(error = %err, "Chat session error");
        }
    });
    connector.on(EventKind::Disconnect, move |event| {
        if let ConnectorEvent::Disconnected { reason } = event {
            let _ = tx.send(ChatUpdate::Closed(reason.clone()));
        }
    });

    let spinner = ProgressBar::new_spinner();
    spinner.set_message(format!("Connecting to {}", url));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let session = connector.connect().await;
    spinner.finish_and_clear();
    let session = session.with_context(|| format!("Could not reach the chat service at {}", url))?;

    println!(
        "{} Connected to {} {}",
        "✓".green().bold(),
        ctx.environment.to_string().bold(),
        format!("(attempts: {})", session.attempts).dimmed()
    );

    let request = ChatRequest::new(prompt, user_id).with_audio(!no_audio);
    connector.send(&request).await.context("Failed to send prompt")?;

    let mut audio_chunks = 0u32;
    let outcome = loop {
        let Some(update) = rx.recv().await else {
            break Err(anyhow::anyhow!("Chat session ended unexpectedly"));
        };

        match update {
            ChatUpdate::Message(ChatServerMessage::ProcessingStart { message }) => {
                println!("{}", message.dimmed());
            }
            ChatUpdate::Message(ChatServerMessage::TextChunk { content, .. }) => {
                print!("{}", content);
                std::io::stdout().flush()?;
            }
            ChatUpdate::Message(ChatServerMessage::AudioGenerationStart { message }) => {
                println!();
                println!("{}", message.dimmed());
            }
            ChatUpdate::Message(ChatServerMessage::AudioChunk {
                chunk_index,
                total_chunks,
                ..
            }) => {
                audio_chunks += 1;
                debug!(chunk_index, total_chunks, "Received audio chunk");
            }
            ChatUpdate::Message(ChatServerMessage::ConversationComplete {
                conversation_id,
                processing_time,
                ..
            }) => {
                println!();
                println!(
                    "{} Done in {:.2}s{}{}",
                    "✓".green().bold(),
                    processing_time,
                    conversation_id
                        .map(|id| format!(", conversation #{}", id))
                        .unwrap_or_default(),
                    if audio_chunks > 0 {
                        format!(", {} audio chunk(s)", audio_chunks)
                    } else {
                        String::new()
                    }
                );
                break Ok(());
            }
            ChatUpdate::Message(ChatServerMessage::Error { message }) => {
                break Err(anyhow::anyhow!("Chat service error: {}", message));
            }
            ChatUpdate::Closed(reason) => {
                break Err(anyhow::anyhow!(
                    "Connection closed before the answer completed: {}",
                    reason.unwrap_or_else(|| "no reason given".to_string())
                ));
            }
        }
    };

    connector.disconnect().await;
    outcome
}
