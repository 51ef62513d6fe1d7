//! Character keys and persona configuration.

use crate::reply::Thresholds;
use crate::source::Source;
use crate::story::LoadError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Prompt used when a character has no configuration.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are Chroma Bot, a helpful AI assistant.";

/// Rejected character key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid character key '{0}'")]
pub struct InvalidKey(pub String);

/// A validated character key such as `maya`.
///
/// Keys end up in file paths, so only lowercase ASCII letters, digits,
/// `-` and `_` are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CharacterKey(String);

impl CharacterKey {
    pub fn new(key: impl Into<String>) -> Result<Self, InvalidKey> {
        let key = key.into();
        let valid = !key.is_empty()
            && key.len() <= 64
            && key
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
        if valid {
            Ok(Self(key))
        } else {
            Err(InvalidKey(key))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Upper-cased key, as shown in welcome banners.
    pub fn shout(&self) -> String {
        self.0.to_uppercase()
    }
}

impl Default for CharacterKey {
    fn default() -> Self {
        Self("maya".to_string())
    }
}

impl FromStr for CharacterKey {
    type Err = InvalidKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.trim())
    }
}

impl TryFrom<String> for CharacterKey {
    type Error = InvalidKey;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CharacterKey> for String {
    fn from(key: CharacterKey) -> Self {
        key.0
    }
}

impl fmt::Display for CharacterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Persona and degradation thresholds for one character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterConfig {
    pub name: String,
    pub role: String,
    pub style: String,
    #[serde(default)]
    pub lore: Vec<String>,
    pub failure: String,
    #[serde(default)]
    pub thresholds: Thresholds,
}

impl CharacterConfig {
    pub fn from_json(json: &str) -> Result<Self, LoadError> {
        let config: Self = serde_json::from_str(json)?;
        if !config.thresholds.is_ordered() {
            return Err(LoadError::ThresholdOrder {
                wrong_answers: config.thresholds.wrong_answers,
                critical: config.thresholds.critical,
            });
        }
        Ok(config)
    }

    pub async fn load(source: &Source) -> Result<Self, LoadError> {
        let json = source.read_to_string().await?;
        Self::from_json(&json)
    }

    /// The system prompt handed to the completion service.
    pub fn system_prompt(&self) -> String {
        format!(
            "{} is a {}. Style: {}. Lore: {}. If the user makes unsafe decisions, trigger failure mode: {}",
            self.name,
            self.role,
            self.style,
            self.lore.join(" "),
            self.failure
        )
    }
}

/// System prompt for an optional configuration.
pub fn system_prompt_for(config: Option<&CharacterConfig>) -> String {
    config
        .map(CharacterConfig::system_prompt)
        .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string())
}
