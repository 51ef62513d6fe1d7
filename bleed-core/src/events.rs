//! Typed command channel.
//!
//! Embedded frames announce logins with loosely shaped JSON messages such
//! as `{ "action": "eli-connected", "gamertag": "neo" }`. Those are
//! validated here, at the boundary, and turned into [`Command`]s. Local
//! UI actions use the same command type.

use crate::character::{CharacterKey, InvalidKey};
use crate::roster::Roster;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

const CONNECTED_SUFFIX: &str = "-connected";

/// Everything a front end can ask a session to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Login announced by an embedded frame.
    Connect {
        character: CharacterKey,
        gamertag: Option<String>,
    },
    Login {
        display_name: String,
        password: String,
    },
    Logout,
    SwitchCharacter(CharacterKey),
    GoTo(String),
    /// Zero-based choice index on the current node.
    Choose(usize),
    Restart,
    Send(String),
    Tip,
    /// Canned hello from the active character.
    Greet,
    /// Replace the transcript with a save file's contents.
    Import(String),
    ResetMood,
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame message is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("frame message has no action")]
    MissingAction,

    #[error("unsupported frame action '{0}'")]
    UnknownAction(String),

    #[error(transparent)]
    InvalidCharacter(#[from] InvalidKey),

    #[error("unknown character '{0}'")]
    UnknownCharacter(CharacterKey),

    #[error("command channel closed")]
    Closed,
}

#[derive(Debug, Deserialize)]
struct FrameMessage {
    action: Option<String>,
    gamertag: Option<String>,
}

impl Command {
    /// Validate an inbound frame message.
    pub fn from_frame(json: &str, roster: &Roster) -> Result<Self, FrameError> {
        let message: FrameMessage = serde_json::from_str(json)?;
        let action = message.action.ok_or(FrameError::MissingAction)?;

        let key = action
            .strip_suffix(CONNECTED_SUFFIX)
            .ok_or_else(|| FrameError::UnknownAction(action.clone()))?;
        let character = CharacterKey::new(key)?;
        if !roster.contains(&character) {
            return Err(FrameError::UnknownCharacter(character));
        }

        let gamertag = message
            .gamertag
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty());

        Ok(Command::Connect { character, gamertag })
    }
}

/// Create a bounded command channel.
pub fn command_channel(capacity: usize, roster: Arc<Roster>) -> (CommandSender, CommandReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (CommandSender { tx, roster }, CommandReceiver { rx })
}

#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: mpsc::Sender<Command>,
    roster: Arc<Roster>,
}

impl CommandSender {
    pub async fn send(&self, command: Command) -> Result<(), FrameError> {
        self.tx.send(command).await.map_err(|_| FrameError::Closed)
    }

    /// Validate a frame message and enqueue it. Rejected frames are logged
    /// and never reach the receiver.
    pub async fn post_frame(&self, json: &str) -> Result<(), FrameError> {
        let command = Command::from_frame(json, &self.roster).map_err(|e| {
            tracing::warn!(error = %e, "rejected frame message");
            e
        })?;
        self.send(command).await
    }
}

#[derive(Debug)]
pub struct CommandReceiver {
    rx: mpsc::Receiver<Command>,
}

impl CommandReceiver {
    pub async fn recv(&mut self) -> Option<Command> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Command> {
        self.rx.try_recv().ok()
    }
}
