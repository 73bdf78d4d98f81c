use anyhow::Result;
use colored::Colorize;

use crate::config::AppContext;

/// Print the endpoint table for the active environment
pub fn run(ctx: &AppContext, user_id: &str) -> Result<()> {
    let endpoints = &ctx.endpoints;

    println!(
        "{} ({})",
        "Endpoints".bold(),
        endpoints.environment().to_string().dimmed()
    );
    println!("{}", "─".repeat(70));

    let rows = [
        ("Inscription info", endpoints.inscription_info()),
        ("Inscription question", endpoints.inscription_question(1)),
        ("Generate all questions", endpoints.inscription_generate_all()),
        ("TTS", endpoints.tts_generate()),
        ("IA chat", endpoints.ia_chat()),
        ("IA websocket", endpoints.ia_websocket(user_id)),
        ("Voice call", endpoints.voice_call(user_id)),
    ];

    for (name, url) in rows {
        println!("  {:<24} {}", name, url);
    }

    println!();
    println!(
        "  Config: {}",
        ctx.config_path().display().to_string().dimmed()
    );

    Ok(())
}
