//! Chat Protocol
//!
//! Message types exchanged with the MeetVoice chat service over
//! `/ws/chat/{user_id}`.

use serde::{Deserialize, Serialize};

use crate::error::{ConnectorError, Result};

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "Tu es Sophie, coach de séduction experte et bienveillante.";
pub const DEFAULT_VOICE: &str =
    "Microsoft Server Speech Text to Speech Voice (fr-FR, DeniseNeural)";

/// Prompt sent by the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub prompt: String,
    pub system_prompt: String,
    pub user_id: String,
    pub voice: String,
    pub include_audio: bool,
    pub stream: bool,
}

impl ChatRequest {
    pub fn new(prompt: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            user_id: user_id.into(),
            voice: DEFAULT_VOICE.to_string(),
            include_audio: true,
            stream: true,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }

    pub fn with_audio(mut self, include_audio: bool) -> Self {
        self.include_audio = include_audio;
        self
    }
}

/// Messages streamed back by the chat service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatServerMessage {
    /// The model started working on the prompt
    ProcessingStart { message: String },

    /// Incremental text
    TextChunk {
        content: String,
        full_text: String,
        is_complete: bool,
    },

    /// Speech synthesis started
    AudioGenerationStart { message: String },

    /// One synthesized sentence, as a data URL
    AudioChunk {
        audio: String,
        sentence: String,
        chunk_index: u32,
        total_chunks: u32,
    },

    /// The exchange finished and was recorded
    ConversationComplete {
        conversation_id: Option<i64>,
        processing_time: f64,
        message: String,
    },

    /// The service rejected or failed the request
    Error { message: String },
}

impl ChatServerMessage {
    /// Decode a message event payload
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| ConnectorError::Protocol(format!("unrecognized chat message: {}", e)))
    }

    /// Whether no further messages follow for the current prompt
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ChatServerMessage::ConversationComplete { .. } | ChatServerMessage::Error { .. }
        )
    }
}
