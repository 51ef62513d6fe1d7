//! HTTP chat endpoint (`bleed serve`).
//!
//! `POST /api/chat` answers in character, optionally keeping a reply engine
//! per `sessionId`. `POST /api/chatbot` is the canned topic responder.

use crate::config::ServerConfig;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bleed_core::character::{system_prompt_for, CharacterConfig};
use bleed_core::knowledge::KnowledgeBase;
use bleed_core::reply::{PromptRequest, ReplySource};
use bleed_core::story::Outcome;
use bleed_core::topics::Mode;
use bleed_core::{CharacterKey, CompletionService, Mood, ReplyEngine, Source};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub const MISSING_FIELDS: &str = "Message and character are required.";
pub const GLITCH_REPLY: &str = "⚠️ System glitch. My connection to the AI brain is down.";

type SharedEngine = Arc<tokio::sync::Mutex<ReplyEngine>>;

struct Slot {
    engine: SharedEngine,
    last_used: u64,
}

/// Reply engines by `sessionId`, bounded by `ServerConfig::max_sessions`.
#[derive(Default)]
struct Sessions {
    slots: HashMap<String, Slot>,
    clock: u64,
}

impl Sessions {
    fn touch(&mut self, session_id: &str) -> Option<SharedEngine> {
        self.clock += 1;
        let slot = self.slots.get_mut(session_id)?;
        slot.last_used = self.clock;
        Some(slot.engine.clone())
    }

    /// Insert unless another request got there first, evicting the least
    /// recently used sessions to stay within `max`.
    fn insert(&mut self, session_id: &str, engine: SharedEngine, max: usize) -> SharedEngine {
        if let Some(existing) = self.touch(session_id) {
            return existing;
        }
        while self.slots.len() >= max.max(1) {
            let Some(oldest) = self
                .slots
                .iter()
                .min_by_key(|(_, slot)| slot.last_used)
                .map(|(id, _)| id.clone())
            else {
                break;
            };
            self.slots.remove(&oldest);
            tracing::debug!(session = %oldest, "evicted least recently used chat session");
        }
        self.slots.insert(
            session_id.to_string(),
            Slot {
                engine: engine.clone(),
                last_used: self.clock,
            },
        );
        engine
    }
}

pub struct AppState {
    pub config: ServerConfig,
    pub service: Arc<dyn CompletionService>,
    sessions: Mutex<Sessions>,
}

impl AppState {
    pub fn new(config: ServerConfig, service: Arc<dyn CompletionService>) -> Self {
        Self {
            config,
            service,
            sessions: Mutex::new(Sessions::default()),
        }
    }

    #[cfg(test)]
    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner()).slots.len()
    }

    #[cfg(test)]
    pub fn has_session(&self, session_id: &str) -> bool {
        self.sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .slots
            .contains_key(session_id)
    }

    async fn character_config(&self, key: &CharacterKey) -> Option<CharacterConfig> {
        let source = Source::Path(self.config.characters_dir.join(format!("{key}.json")));
        match CharacterConfig::load(&source).await {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!(character = %key, error = %e, "could not load character config");
                None
            }
        }
    }

    async fn knowledge(&self, key: &CharacterKey) -> Option<KnowledgeBase> {
        let source = Source::Path(self.config.knowledge_dir.join(format!("{key}.json")));
        match KnowledgeBase::load(&source).await {
            Ok(kb) => Some(kb),
            Err(e) => {
                tracing::debug!(character = %key, error = %e, "no knowledge base");
                None
            }
        }
    }

    /// The engine for `session_id`, created on first use and re-pointed at
    /// `key` when the character changes.
    async fn engine(&self, session_id: &str, key: &CharacterKey) -> SharedEngine {
        let existing = self
            .sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .touch(session_id);

        if let Some(engine) = existing {
            let mut guard = engine.lock().await;
            if guard.character() != key {
                let config = self.character_config(key).await;
                let knowledge = self.knowledge(key).await;
                guard.set_character(key.clone(), config, knowledge);
            }
            drop(guard);
            return engine;
        }

        let config = self.character_config(key).await;
        let knowledge = self.knowledge(key).await;
        let engine = ReplyEngine::new(key.clone(), config, knowledge, self.service.clone())
            .with_session_id(session_id);
        let engine = Arc::new(tokio::sync::Mutex::new(engine));

        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        let engine = sessions.insert(session_id, engine, self.config.max_sessions);
        tracing::info!(session = %session_id, character = %key, active = sessions.slots.len(), "chat session created");
        engine
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatBody {
    pub message: Option<String>,
    pub character: Option<String>,
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ChatResponse {
    pub reply: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Mood>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
}

#[derive(Debug, Deserialize)]
pub struct ChatbotBody {
    #[serde(default)]
    pub message: String,
    pub mode: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatbotResponse {
    pub reply: String,
}

/// Handler errors, rendered as the JSON bodies clients expect.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Glitch,
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(error) => {
                (StatusCode::BAD_REQUEST, Json(serde_json::json!({ "error": error }))).into_response()
            }
            ApiError::Glitch => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "reply": GLITCH_REPLY })),
            )
                .into_response(),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat))
        .route("/api/chatbot", post(chatbot))
        .with_state(Arc::new(state))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(config: ServerConfig, service: Arc<dyn CompletionService>) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server running");
    axum::serve(listener, build_router(AppState::new(config, service))).await?;
    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

async fn chat(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ChatBody>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(body) = body?;
    let message = body.message.as_deref().map(str::trim).unwrap_or_default();
    let character = body.character.as_deref().map(str::trim).unwrap_or_default();
    if message.is_empty() || character.is_empty() {
        return Err(ApiError::BadRequest(MISSING_FIELDS.to_string()));
    }
    let key = CharacterKey::new(character).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let session_id = body.session_id.as_deref().map(str::trim).filter(|s| !s.is_empty());
    match session_id {
        Some(session_id) => {
            let engine = state.engine(session_id, &key).await;
            let reply = engine.lock().await.reply(message).await;
            if reply.source == ReplySource::Fallback {
                return Err(ApiError::Glitch);
            }
            Ok(Json(ChatResponse {
                reply: reply.text,
                stage: Some(reply.mood),
                outcome: (reply.mood == Mood::Broken).then_some(Outcome::Failure),
            }))
        }
        None => {
            let config = state.character_config(&key).await;
            let request = PromptRequest {
                character: key,
                system_prompt: system_prompt_for(config.as_ref()),
                message: message.to_string(),
                session_id: None,
            };
            match state.service.complete(&request).await {
                Ok(reply) => Ok(Json(ChatResponse {
                    reply,
                    stage: None,
                    outcome: None,
                })),
                Err(e) => {
                    tracing::error!(character = %request.character, error = %e, "chat completion failed");
                    Err(ApiError::Glitch)
                }
            }
        }
    }
}

async fn chatbot(body: Result<Json<ChatbotBody>, JsonRejection>) -> Result<Json<ChatbotResponse>, ApiError> {
    let Json(body) = body?;
    let mode: Mode = body
        .mode
        .as_deref()
        .unwrap_or_default()
        .parse()
        .map_err(|e: bleed_core::topics::UnknownMode| ApiError::BadRequest(e.to_string()))?;

    Ok(Json(ChatbotResponse {
        reply: mode.respond(&body.message).to_string(),
    }))
}
