//! Session - the primary public API for playing a story.
//!
//! A `Session` owns everything that used to be page-global state: the
//! player's identity, the navigator over the active character's story,
//! the reply engine, the crack overlay and the chat transcript. Every
//! operation returns render instructions; nothing here draws.

use crate::assets::{AssetSource, CharacterAssets};
use crate::character::CharacterKey;
use crate::cracks::{self, CrackOverlay};
use crate::events::Command;
use crate::navigator::{NavError, Navigator};
use crate::persist::{ImportError, Transcript};
use crate::reply::{CompletionService, Mood, ReplyEngine};
use crate::render::{transition_instructions, RenderInstruction, Speaker};
use crate::roster::Roster;
use crate::story::{ChoiceTag, LoadError};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

pub const MISSING_CREDENTIALS: &str = "Please enter both credentials!";

/// Display name used when a frame login carries no gamertag, and in
/// greetings before anyone logs in.
const ANONYMOUS: &str = "Player";

/// Errors from Session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Navigation error: {0}")]
    Nav(#[from] NavError),

    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    #[error("Login failed: {0}")]
    Login(String),
}

impl SessionError {
    /// Short message suitable for showing in the chat or scene.
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Load(_) | SessionError::Nav(NavError::Load(_)) => {
                "Could not load the story. Try again.".to_string()
            }
            SessionError::Nav(NavError::UnknownNode(id)) => format!("Node {id} not found"),
            SessionError::Nav(NavError::NoSuchChoice { .. }) => "That choice is not available.".to_string(),
            SessionError::Nav(NavError::NotLoaded) => "No story is loaded.".to_string(),
            SessionError::Import(_) => "Invalid save file".to_string(),
            SessionError::Login(message) => message.clone(),
        }
    }
}

/// Configuration for creating a new session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Character whose story is loaded first.
    pub character: CharacterKey,

    /// Player display name, if known up front.
    pub display_name: Option<String>,

    /// Cosmetic roster used for intros, tips and frame validation.
    pub roster: Arc<Roster>,
}

impl SessionConfig {
    pub fn new(character: CharacterKey) -> Self {
        Self {
            character,
            display_name: None,
            roster: Arc::new(Roster::builtin().clone()),
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_roster(mut self, roster: Roster) -> Self {
        self.roster = Arc::new(roster);
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new(CharacterKey::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginMethod {
    Direct,
    Frame,
}

/// Who is playing, and as which character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub display_name: String,
    pub character: CharacterKey,
    pub logged_in: bool,
    pub method: LoginMethod,
}

impl Identity {
    fn anonymous(character: CharacterKey) -> Self {
        Self {
            display_name: String::new(),
            character,
            logged_in: false,
            method: LoginMethod::Direct,
        }
    }
}

/// A single player's session.
pub struct Session {
    id: Uuid,
    identity: Identity,
    roster: Arc<Roster>,
    assets: Arc<dyn AssetSource>,
    navigator: Navigator,
    reply: ReplyEngine,
    cracks: CrackOverlay,
    transcript: Transcript,
}

impl Session {
    /// Load the configured character and sit on its start node.
    ///
    /// Fails only if the story itself cannot be loaded.
    pub async fn start(
        config: SessionConfig,
        assets: Arc<dyn AssetSource>,
        service: Arc<dyn CompletionService>,
    ) -> Result<Self, SessionError> {
        let id = Uuid::new_v4();
        let loaded = CharacterAssets::load(assets.as_ref(), &config.character).await?;

        let mut navigator = Navigator::new();
        navigator.install(loaded.story)?;

        let reply = ReplyEngine::new(
            config.character.clone(),
            loaded.config,
            loaded.knowledge,
            service,
        )
        .with_session_id(id.to_string());

        let mut identity = Identity::anonymous(config.character);
        if let Some(name) = config.display_name {
            identity.display_name = name;
        }

        tracing::info!(session = %id, character = %identity.character, "session started");

        Ok(Self {
            id,
            identity,
            roster: config.roster,
            assets,
            navigator,
            reply,
            cracks: CrackOverlay::new(),
            transcript: Transcript::new(),
        })
    }

    /// Instructions that redraw the whole screen: theme, intro, cracks and
    /// the current scene.
    pub fn opening(&self) -> Vec<RenderInstruction> {
        let mut out = Vec::new();
        if let Some(graph) = self.navigator.graph() {
            out.push(RenderInstruction::Theme(graph.theme().clone()));
        }
        if let Some(profile) = self.roster.profile(&self.identity.character) {
            out.push(RenderInstruction::bot(profile.intro.clone()));
        }
        out.push(self.cracks_instruction());
        if let Some(transition) = self.navigator.current() {
            out.extend(transition_instructions(&transition));
        }
        out
    }

    // ========================================================================
    // Identity
    // ========================================================================

    /// Direct login with a display name and password.
    pub fn login(&mut self, display_name: &str, password: &str) -> Result<Vec<RenderInstruction>, SessionError> {
        let name = display_name.trim();
        if name.is_empty() || password.trim().is_empty() {
            return Err(SessionError::Login(MISSING_CREDENTIALS.to_string()));
        }
        Ok(self.complete_login(name.to_string(), LoginMethod::Direct))
    }

    /// Login announced by an embedded frame; switches character first if needed.
    pub async fn connect(
        &mut self,
        character: CharacterKey,
        gamertag: Option<String>,
    ) -> Result<Vec<RenderInstruction>, SessionError> {
        let mut out = Vec::new();
        if character != self.identity.character {
            out.extend(self.switch_character(character).await?);
        }
        let name = gamertag.unwrap_or_else(|| ANONYMOUS.to_string());
        out.extend(self.complete_login(name, LoginMethod::Frame));
        Ok(out)
    }

    /// Forget the player; the loaded character stays.
    pub fn logout(&mut self) -> Vec<RenderInstruction> {
        tracing::info!(session = %self.id, "logout");
        self.identity = Identity::anonymous(self.identity.character.clone());
        vec![RenderInstruction::system("Logged out.")]
    }

    fn complete_login(&mut self, name: String, method: LoginMethod) -> Vec<RenderInstruction> {
        self.identity.display_name = name;
        self.identity.logged_in = true;
        self.identity.method = method;

        tracing::info!(session = %self.id, character = %self.identity.character, ?method, "login");

        let welcome = format!(
            "Welcome {}! You are connected as {}.",
            self.identity.display_name,
            self.identity.character.shout()
        );
        self.transcript.push(Speaker::System, &welcome);
        vec![RenderInstruction::system(welcome)]
    }

    /// Load another character's story and knowledge.
    ///
    /// Navigation restarts at the new story's start node. The reply
    /// engine's wrong-answer counter and mood carry over.
    pub async fn switch_character(&mut self, key: CharacterKey) -> Result<Vec<RenderInstruction>, SessionError> {
        let loaded = CharacterAssets::load(self.assets.as_ref(), &key).await?;
        self.navigator.install(loaded.story)?;
        self.reply.set_character(key.clone(), loaded.config, loaded.knowledge);

        tracing::info!(session = %self.id, from = %self.identity.character, to = %key, "character switched");
        self.identity.character = key;
        Ok(self.opening())
    }

    // ========================================================================
    // Story
    // ========================================================================

    pub fn go_to(&mut self, id: &str) -> Result<Vec<RenderInstruction>, SessionError> {
        let transition = self.navigator.go_to(id)?;
        Ok(transition_instructions(&transition))
    }

    /// Follow a choice (zero-based); tagged choices move the crack overlay.
    pub fn choose(&mut self, index: usize) -> Result<Vec<RenderInstruction>, SessionError> {
        let tag = self.navigator.choice_at(index)?.tag;
        let transition = self.navigator.choose(index)?;

        let mut out = Vec::new();
        if let Some(tag) = tag {
            self.cracks.apply(tag);
            out.push(self.cracks_instruction());
        }
        out.extend(transition_instructions(&transition));
        Ok(out)
    }

    pub fn restart(&mut self) -> Result<Vec<RenderInstruction>, SessionError> {
        let transition = self.navigator.restart()?;
        Ok(transition_instructions(&transition))
    }

    // ========================================================================
    // Chat
    // ========================================================================

    /// Handle a chat message. Blank input is ignored.
    pub async fn send(&mut self, text: &str) -> Vec<RenderInstruction> {
        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }

        self.transcript.push(Speaker::User, text);
        let mut out = vec![RenderInstruction::Message {
            speaker: Speaker::User,
            text: text.to_string(),
        }];

        if let Some(tag) = cracks::chat_trigger(text) {
            self.cracks.apply(tag);
            let answer = match tag {
                ChoiceTag::Risky => cracks::RISKY_REPLY,
                ChoiceTag::Recovery => cracks::RECOVERY_REPLY,
            };
            out.push(self.cracks_instruction());
            out.push(self.bot_says(answer));
            return out;
        }

        let before = self.reply.mood();
        let reply = self.reply.reply(text).await;
        if reply.mood != before {
            out.push(RenderInstruction::Mood(reply.mood));
        }
        out.push(self.bot_says(&reply.text));
        out
    }

    /// A random safety tip for the current character.
    pub fn tip(&mut self) -> Vec<RenderInstruction> {
        let tip = self.roster.tip(&self.identity.character).map(str::to_string);
        match tip {
            Some(tip) => vec![self.bot_says(&tip)],
            None => Vec::new(),
        }
    }

    /// `Hello {name}!` plus one of the character's canned lines.
    pub fn greet(&mut self) -> Vec<RenderInstruction> {
        let name = if self.identity.logged_in {
            self.identity.display_name.clone()
        } else {
            ANONYMOUS.to_string()
        };
        let greeting = match self.roster.response(&self.identity.character) {
            Some(line) => format!("Hello {name}! {line}"),
            None => format!("Hello {name}!"),
        };
        vec![self.bot_says(&greeting)]
    }

    pub fn reset_mood(&mut self) -> Vec<RenderInstruction> {
        self.reply.reset();
        vec![RenderInstruction::Mood(Mood::Normal)]
    }

    fn bot_says(&mut self, text: &str) -> RenderInstruction {
        self.transcript.push(Speaker::Bot, text);
        RenderInstruction::bot(text)
    }

    fn cracks_instruction(&self) -> RenderInstruction {
        RenderInstruction::Cracks {
            level: self.cracks.level(),
            asset: self.cracks.asset().to_string(),
        }
    }

    // ========================================================================
    // Transcript
    // ========================================================================

    pub fn export_transcript(&self) -> Transcript {
        self.transcript.clone()
    }

    /// Replace the transcript from save-file JSON; unchanged on error.
    pub fn import_transcript(&mut self, json: &str) -> Result<Vec<RenderInstruction>, SessionError> {
        let transcript = Transcript::from_json(json)?;
        Ok(self.replace_transcript(transcript))
    }

    pub async fn save_transcript(&self, path: impl AsRef<Path>) -> Result<(), SessionError> {
        self.transcript.save(path).await?;
        Ok(())
    }

    pub async fn load_transcript(&mut self, path: impl AsRef<Path>) -> Result<Vec<RenderInstruction>, SessionError> {
        let transcript = Transcript::load(path).await?;
        Ok(self.replace_transcript(transcript))
    }

    fn replace_transcript(&mut self, transcript: Transcript) -> Vec<RenderInstruction> {
        self.transcript = transcript;
        vec![RenderInstruction::Transcript(self.transcript.lines().to_vec())]
    }

    // ========================================================================
    // Boundary
    // ========================================================================

    /// Run a command, recovering every error into a notice.
    pub async fn dispatch(&mut self, command: Command) -> Vec<RenderInstruction> {
        let result = match command {
            Command::Connect { character, gamertag } => self.connect(character, gamertag).await,
            Command::Login {
                display_name,
                password,
            } => self.login(&display_name, &password),
            Command::Logout => Ok(self.logout()),
            Command::SwitchCharacter(key) => self.switch_character(key).await,
            Command::GoTo(id) => self.go_to(&id),
            Command::Choose(index) => self.choose(index),
            Command::Restart => self.restart(),
            Command::Send(text) => Ok(self.send(&text).await),
            Command::Tip => Ok(self.tip()),
            Command::Greet => Ok(self.greet()),
            Command::Import(json) => self.import_transcript(&json),
            Command::ResetMood => Ok(self.reset_mood()),
        };

        result.unwrap_or_else(|e| {
            tracing::warn!(session = %self.id, error = %e, "command failed");
            vec![RenderInstruction::notice(e.user_message())]
        })
    }

    /// End the session, handing back the transcript.
    pub fn close(mut self) -> Transcript {
        self.navigator.unload();
        tracing::info!(session = %self.id, lines = self.transcript.len(), "session closed");
        self.transcript
    }

    // ========================================================================
    // State queries
    // ========================================================================

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn character(&self) -> &CharacterKey {
        &self.identity.character
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn current_node(&self) -> Option<&str> {
        self.navigator.current_id()
    }

    pub fn reply_engine(&self) -> &ReplyEngine {
        &self.reply
    }

    pub fn mood(&self) -> Mood {
        self.reply.mood()
    }

    pub fn wrong_count(&self) -> u32 {
        self.reply.state().wrong_count()
    }

    pub fn cracks(&self) -> &CrackOverlay {
        &self.cracks
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }
}
