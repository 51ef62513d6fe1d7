//! Branching story engine with a themed safety chatbot.
//!
//! This crate provides:
//! - Story graphs of scenes, choices and endings, and a navigator over them
//! - A reply engine: keyword knowledge base, mood degradation and a remote
//!   completion fallback
//! - Crack overlay, character roster and chat transcripts
//! - A `Session` that ties it together and emits render instructions
//!
//! # Quick Start
//!
//! ```ignore
//! use bleed_core::{AssetLayout, Offline, Session, SessionConfig, TextRenderer, Renderer};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SessionConfig::new("eli".parse()?).with_display_name("neo");
//!     let mut session = Session::start(config, Arc::new(AssetLayout::new(".")), Arc::new(Offline)).await?;
//!
//!     let mut out = TextRenderer::new(std::io::stdout());
//!     out.render_all(&session.opening())?;
//!     out.render_all(&session.choose(0)?)?;
//!     out.render_all(&session.send("is this a scam?").await)?;
//!
//!     session.save_transcript("chatlog.json").await?;
//!     Ok(())
//! }
//! ```

pub mod assets;
pub mod character;
pub mod cracks;
pub mod events;
pub mod knowledge;
pub mod navigator;
pub mod persist;
pub mod render;
pub mod reply;
pub mod roster;
pub mod session;
pub mod source;
pub mod story;
pub mod testing;
pub mod topics;

// Primary public API
pub use assets::{AssetLayout, AssetSource, CharacterAssets};
pub use character::{CharacterConfig, CharacterKey};
pub use events::{command_channel, Command, CommandReceiver, CommandSender, FrameError};
pub use navigator::{NavError, Navigator, Transition};
pub use persist::{ImportError, Transcript};
pub use render::{RenderInstruction, Renderer, Speaker, TextRenderer};
pub use reply::{CompletionService, HttpChatService, Mood, Offline, Reply, ReplyEngine, ServiceError};
pub use roster::Roster;
pub use session::{Session, SessionConfig, SessionError};
pub use source::Source;
pub use story::{LoadError, StoryGraph};
pub use testing::{MockCompletion, TestHarness};
