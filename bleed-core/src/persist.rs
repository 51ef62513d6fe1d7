//! Chat transcript export and import.
//!
//! The save format is the one the browser download produced:
//! `{ "chat": ["You: ...", "Bot: ..."] }`.

use crate::render::Speaker;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tokio::fs;

/// File name offered for downloads.
pub const DEFAULT_SAVE_NAME: &str = "chatlog.json";

/// Errors from importing a save file.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid save file: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Invalid save file: no chat log")]
    MissingChat,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    pub chat: Vec<String>,
}

#[derive(Deserialize)]
struct PartialTranscript {
    chat: Option<Vec<String>>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, speaker: Speaker, text: &str) {
        self.chat.push(format!("{}: {text}", speaker.label()));
    }

    pub fn lines(&self) -> &[String] {
        &self.chat
    }

    pub fn len(&self) -> usize {
        self.chat.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chat.is_empty()
    }

    pub fn clear(&mut self) {
        self.chat.clear();
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, ImportError> {
        let partial: PartialTranscript = serde_json::from_str(json)?;
        let chat = partial.chat.ok_or(ImportError::MissingChat)?;
        Ok(Self { chat })
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), ImportError> {
        let content = self.to_json()?;
        fs::write(path, content).await?;
        Ok(())
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ImportError> {
        let content = fs::read_to_string(path).await?;
        Self::from_json(&content)
    }
}
