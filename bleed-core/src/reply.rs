//! The chatbot reply engine.
//!
//! Replies come from the knowledge base when a keyword matches. Otherwise
//! the wrong-answer counter goes up, the mood is re-derived from the
//! character's thresholds, and the message is handed to a remote
//! completion service. Remote failures never escape: they become one of
//! the fixed fallback strings.

use crate::character::{system_prompt_for, CharacterConfig, CharacterKey};
use crate::knowledge::KnowledgeBase;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub const FALLBACK_UNREACHABLE: &str = "⚠️ Error reaching AI.";
pub const FALLBACK_ERROR_PAYLOAD: &str = "⚠️ AI error. Try again later.";
pub const FALLBACK_EMPTY: &str = "⚠️ No response from AI.";

/// Conversational degradation state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    #[default]
    Normal,
    Tired,
    Broken,
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mood::Normal => f.write_str("normal"),
            Mood::Tired => f.write_str("tired"),
            Mood::Broken => f.write_str("broken"),
        }
    }
}

/// Wrong-answer thresholds for mood escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    #[serde(rename = "wrongAnswers")]
    pub wrong_answers: u32,
    pub critical: u32,
    /// Upper bound for the counter; unbounded when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ceiling: Option<u32>,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            wrong_answers: 3,
            critical: 5,
            ceiling: None,
        }
    }
}

impl Thresholds {
    pub fn new(wrong_answers: u32, critical: u32) -> Self {
        Self {
            wrong_answers,
            critical,
            ceiling: None,
        }
    }

    pub fn with_ceiling(mut self, ceiling: u32) -> Self {
        self.ceiling = Some(ceiling);
        self
    }

    /// Tired must come no later than broken.
    pub fn is_ordered(&self) -> bool {
        self.wrong_answers <= self.critical
    }

    pub fn mood_for(&self, wrong_count: u32) -> Mood {
        if wrong_count >= self.critical {
            Mood::Broken
        } else if wrong_count >= self.wrong_answers {
            Mood::Tired
        } else {
            Mood::Normal
        }
    }
}

/// Wrong-answer counter and the mood derived from it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyState {
    wrong_count: u32,
    mood: Mood,
}

impl ReplyState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a miss. Without thresholds the mood stays where it is.
    pub fn record_miss(&mut self, thresholds: Option<&Thresholds>) -> Mood {
        let ceiling = thresholds.and_then(|t| t.ceiling).unwrap_or(u32::MAX);
        self.wrong_count = self.wrong_count.saturating_add(1).min(ceiling);

        if let Some(thresholds) = thresholds {
            let derived = thresholds.mood_for(self.wrong_count);
            if derived > self.mood {
                tracing::debug!(from = %self.mood, to = %derived, wrong_count = self.wrong_count, "mood escalated");
                self.mood = derived;
            }
        }
        self.mood
    }

    pub fn wrong_count(&self) -> u32 {
        self.wrong_count
    }

    pub fn mood(&self) -> Mood {
        self.mood
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

// ============================================================================
// Completion services
// ============================================================================

/// Errors from the remote completion service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("service unreachable: {0}")]
    Unreachable(String),

    #[error("service returned an error: {0}")]
    ErrorPayload(String),

    #[error("service returned no reply")]
    Empty,

    #[error("no completion service configured")]
    Unavailable,
}

impl ServiceError {
    /// The fixed user-facing string for this failure.
    pub fn fallback_text(&self) -> &'static str {
        match self {
            ServiceError::ErrorPayload(_) => FALLBACK_ERROR_PAYLOAD,
            ServiceError::Empty => FALLBACK_EMPTY,
            ServiceError::Unreachable(_) | ServiceError::Unavailable => FALLBACK_UNREACHABLE,
        }
    }
}

impl From<completion::Error> for ServiceError {
    fn from(err: completion::Error) -> Self {
        match err {
            completion::Error::Network(message) => ServiceError::Unreachable(message),
            completion::Error::NoApiKey => ServiceError::Unavailable,
            other => ServiceError::ErrorPayload(other.to_string()),
        }
    }
}

/// Everything a completion backend may need for one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRequest {
    pub character: CharacterKey,
    pub system_prompt: String,
    pub message: String,
    pub session_id: Option<String>,
}

/// A black-box text completion backend.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, request: &PromptRequest) -> Result<String, ServiceError>;
}

#[async_trait]
impl CompletionService for completion::Client {
    async fn complete(&self, request: &PromptRequest) -> Result<String, ServiceError> {
        let api_request = completion::Request::new(vec![completion::Message::user(&request.message)])
            .with_system(&request.system_prompt);
        let response = completion::Client::complete(self, api_request).await?;
        let text = response.text().trim();
        if text.is_empty() {
            return Err(ServiceError::Empty);
        }
        Ok(text.to_string())
    }
}

/// A service that always fails; used when no backend is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct Offline;

#[async_trait]
impl CompletionService for Offline {
    async fn complete(&self, _request: &PromptRequest) -> Result<String, ServiceError> {
        Err(ServiceError::Unavailable)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequestBody<'a> {
    message: &'a str,
    character: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseBody {
    reply: Option<String>,
    error: Option<String>,
}

/// Client for a remote `POST /api/chat` endpoint.
#[derive(Debug, Clone)]
pub struct HttpChatService {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpChatService {
    /// `base` is the server root, e.g. `http://localhost:3001`.
    pub fn new(base: &str) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            endpoint: format!("{}/api/chat", base.trim_end_matches('/')),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl CompletionService for HttpChatService {
    async fn complete(&self, request: &PromptRequest) -> Result<String, ServiceError> {
        let body = ChatRequestBody {
            message: &request.message,
            character: request.character.as_str(),
            session_id: request.session_id.as_deref(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::Unreachable(e.to_string()))?;

        let status = response.status();
        let parsed: ChatResponseBody = response
            .json()
            .await
            .map_err(|e| ServiceError::ErrorPayload(format!("status {status}: {e}")))?;

        if let Some(error) = parsed.error {
            return Err(ServiceError::ErrorPayload(error));
        }
        if !status.is_success() {
            return Err(ServiceError::ErrorPayload(format!("status {status}")));
        }
        match parsed.reply {
            Some(reply) if !reply.trim().is_empty() => Ok(reply),
            _ => Err(ServiceError::Empty),
        }
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Where a reply came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplySource {
    Knowledge,
    Remote,
    Fallback,
}

/// A chatbot reply plus the state after producing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub source: ReplySource,
    pub mood: Mood,
    pub wrong_count: u32,
}

/// Keyword matching, mood tracking and remote fallback for one character.
pub struct ReplyEngine {
    character: CharacterKey,
    config: Option<CharacterConfig>,
    knowledge: Option<KnowledgeBase>,
    state: ReplyState,
    service: Arc<dyn CompletionService>,
    session_id: Option<String>,
}

impl ReplyEngine {
    /// `knowledge: None` means the knowledge base could not be loaded; every
    /// message then goes straight to the service without counting a miss.
    pub fn new(
        character: CharacterKey,
        config: Option<CharacterConfig>,
        knowledge: Option<KnowledgeBase>,
        service: Arc<dyn CompletionService>,
    ) -> Self {
        Self {
            character,
            config,
            knowledge,
            state: ReplyState::new(),
            service,
            session_id: None,
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Answer one user message.
    pub async fn reply(&mut self, user_text: &str) -> Reply {
        if let Some(knowledge) = &self.knowledge {
            if let Some(answer) = knowledge.lookup(user_text) {
                tracing::debug!(character = %self.character, "knowledge base hit");
                return self.reply_with(answer.to_string(), ReplySource::Knowledge);
            }
            let thresholds = self.config.as_ref().map(|c| &c.thresholds);
            self.state.record_miss(thresholds);
        }

        let request = PromptRequest {
            character: self.character.clone(),
            system_prompt: system_prompt_for(self.config.as_ref()),
            message: user_text.to_string(),
            session_id: self.session_id.clone(),
        };

        match self.service.complete(&request).await {
            Ok(text) => self.reply_with(text, ReplySource::Remote),
            Err(e) => {
                tracing::warn!(character = %self.character, error = %e, "completion failed");
                self.reply_with(e.fallback_text().to_string(), ReplySource::Fallback)
            }
        }
    }

    /// Swap persona and knowledge; the counters carry over.
    pub fn set_character(
        &mut self,
        character: CharacterKey,
        config: Option<CharacterConfig>,
        knowledge: Option<KnowledgeBase>,
    ) {
        self.character = character;
        self.config = config;
        self.knowledge = knowledge;
    }

    pub fn reset(&mut self) {
        self.state.reset();
    }

    pub fn state(&self) -> &ReplyState {
        &self.state
    }

    pub fn mood(&self) -> Mood {
        self.state.mood()
    }

    pub fn character(&self) -> &CharacterKey {
        &self.character
    }

    pub fn config(&self) -> Option<&CharacterConfig> {
        self.config.as_ref()
    }

    pub fn knowledge(&self) -> Option<&KnowledgeBase> {
        self.knowledge.as_ref()
    }

    fn reply_with(&self, text: String, source: ReplySource) -> Reply {
        Reply {
            text,
            source,
            mood: self.state.mood(),
            wrong_count: self.state.wrong_count(),
        }
    }
}
