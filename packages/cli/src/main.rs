use anyhow::Result;
use clap::{Parser, Subcommand};
use meetvoice_connector::config::LoggingConfig;
use meetvoice_connector::Environment;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod api;
mod commands;
mod config;

use commands::questions::QuestionsCommands;
use config::AppContext;

#[derive(Parser)]
#[command(name = "meetvoice", about = "MeetVoice CLI - Talk to the MeetVoice services")]
#[command(version, propagate_version = true)]
struct Cli {
    /// Path to configuration file (default: ~/.meetvoice/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Service environment (development, production)
    #[arg(short, long, global = true, env = "MEETVOICE_ENV")]
    env: Option<Environment>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a prompt to the chat service and stream the answer
    Chat {
        /// Prompt text (asked interactively when omitted)
        prompt: Option<String>,

        /// User id used in the chat endpoint
        #[arg(short, long)]
        user_id: Option<String>,

        /// Skip speech synthesis
        #[arg(long)]
        no_audio: bool,

        /// Override the configured number of connection attempts
        #[arg(short, long)]
        max_attempts: Option<u32>,
    },

    /// Ask the IA service once, without streaming
    Ask {
        /// Prompt text
        prompt: String,

        /// Replace the default system prompt
        #[arg(short, long)]
        system_prompt: Option<String>,

        /// Request speech and save the MP3 answer here
        #[arg(short, long)]
        audio_out: Option<PathBuf>,
    },

    /// Synthesize text to an MP3 file
    Tts {
        /// Text to speak
        text: String,

        /// Voice name (default: fr-FR DeniseNeural)
        #[arg(long)]
        voice: Option<String>,

        /// Output file
        #[arg(short, long, default_value = "tts.mp3")]
        output: PathBuf,
    },

    /// Sign-up questionnaire audio
    #[command(subcommand)]
    Questions(QuestionsCommands),

    /// Check that the TTS, IA and voice services respond
    Check {
        /// Per-request timeout in seconds
        #[arg(short, long, default_value = "5")]
        timeout: u64,
    },

    /// Show the sign-up questionnaire info from the TTS service
    Info,

    /// Print the resolved endpoint table
    Endpoints {
        /// User id used to render the WebSocket endpoints
        #[arg(short, long, default_value = "{user_id}")]
        user_id: String,
    },

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // init must work even when the current file does not parse
    if let Commands::Init { force } = cli.command {
        init_logging(&LoggingConfig::default(), cli.verbose)?;
        let path = match cli.config {
            Some(path) => path,
            None => config::default_path()?,
        };
        return commands::init::run(&path, force);
    }

    let ctx = AppContext::load(cli.config, cli.env)?;
    init_logging(&ctx.config.logging, cli.verbose)?;

    match cli.command {
        Commands::Chat {
            prompt,
            user_id,
            no_audio,
            max_attempts,
        } => commands::chat::run(&ctx, prompt, user_id, no_audio, max_attempts).await,
        Commands::Ask {
            prompt,
            system_prompt,
            audio_out,
        } => commands::ask::run(&ctx, prompt, system_prompt, audio_out).await,
        Commands::Tts {
            text,
            voice,
            output,
        } => commands::tts::run(&ctx, &text, voice.as_deref(), &output).await,
        Commands::Questions(command) => commands::questions::handle(&ctx, command).await,
        Commands::Check { timeout } => commands::check::run(&ctx, timeout).await,
        Commands::Info => commands::info::run(&ctx).await,
        Commands::Endpoints { user_id } => commands::endpoints::run(&ctx, &user_id),
        Commands::Init { force } => commands::init::run(ctx.config_path(), force),
    }
}

fn init_logging(logging: &LoggingConfig, verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_writer(std::io::stderr);

    match logging.format.as_str() {
        "json" => builder.json().try_init(),
        "compact" => builder.compact().try_init(),
        _ => builder.try_init(),
    }
    .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}
