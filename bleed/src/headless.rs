//! Headless mode.
//!
//! A line-oriented interface for playing without a browser, suitable for
//! scripted testing. Output comes from `TextRenderer`, so every line starts
//! with a bracketed tag or a speaker label.

use crate::config::HeadlessConfig;
use bleed_core::{
    command_channel, AssetLayout, AssetSource, Command, CommandReceiver, CommandSender, CompletionService,
    HttpChatService, Offline, RenderInstruction, Renderer, Session, SessionConfig, Source, TextRenderer,
};
use std::io::{self, BufRead};
use std::sync::Arc;

const HELP: &[&str] = &[
    "  <number>               - Pick a choice",
    "  #go <node>             - Jump to a node",
    "  #restart               - Back to the start node",
    "  #character <key>       - Switch character (maya, eli, stanley)",
    "  #login <name> <pass>   - Log in",
    "  #logout                - Log out",
    "  #tip                   - Show a safety tip",
    "  #greet                 - Say hello to the character",
    "  #reset                 - Reset the bot's mood",
    "  #status                - Show session status",
    "  #save <path>           - Save the chat transcript",
    "  #load <path>           - Load a chat transcript",
    "  #frame <json>          - Deliver a frame message",
    "  #help                  - Show this help",
    "  #quit                  - Exit",
    "  (anything else is sent to the chatbot)",
];

/// What a single input line produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutput {
    Render(Vec<RenderInstruction>),
    Print(Vec<String>),
    Quit,
}

/// A session plus the frame channel feeding it.
pub struct Headless {
    session: Session,
    frames: CommandSender,
    inbox: CommandReceiver,
}

impl Headless {
    pub fn new(session: Session) -> Self {
        let (frames, inbox) = command_channel(8, Arc::new(session.roster().clone()));
        Self {
            session,
            frames,
            inbox,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Interpret one line of input.
    pub async fn handle(&mut self, line: &str) -> LineOutput {
        let line = line.trim();
        if line.is_empty() {
            return LineOutput::Render(Vec::new());
        }

        if let Ok(number) = line.parse::<usize>() {
            return match number.checked_sub(1) {
                Some(index) => self.run(Command::Choose(index)).await,
                None => LineOutput::Render(vec![RenderInstruction::notice("Choices start at 1.")]),
            };
        }

        let Some(rest) = line.strip_prefix('#') else {
            return self.run(Command::Send(line.to_string())).await;
        };
        let (command, arg) = match rest.split_once(char::is_whitespace) {
            Some((command, arg)) => (command, arg.trim()),
            None => (rest, ""),
        };

        match command {
            "quit" | "exit" => LineOutput::Quit,
            "go" if !arg.is_empty() => self.run(Command::GoTo(arg.to_string())).await,
            "restart" => self.run(Command::Restart).await,
            "character" => match arg.parse() {
                Ok(key) => self.run(Command::SwitchCharacter(key)).await,
                Err(e) => error(e.to_string()),
            },
            "login" => {
                let mut parts = arg.split_whitespace();
                let display_name = parts.next().unwrap_or_default().to_string();
                let password = parts.next().unwrap_or_default().to_string();
                self.run(Command::Login {
                    display_name,
                    password,
                })
                .await
            }
            "logout" => self.run(Command::Logout).await,
            "tip" => self.run(Command::Tip).await,
            "greet" => self.run(Command::Greet).await,
            "reset" => self.run(Command::ResetMood).await,
            "status" => LineOutput::Print(self.status()),
            "save" if !arg.is_empty() => match self.session.save_transcript(arg).await {
                Ok(()) => LineOutput::Print(vec![format!("[SAVED] Transcript saved to {arg}")]),
                Err(e) => error(format!("Save failed: {e}")),
            },
            "load" if !arg.is_empty() => match self.session.load_transcript(arg).await {
                Ok(out) => LineOutput::Render(out),
                Err(e) => {
                    tracing::warn!(path = %arg, error = %e, "transcript load failed");
                    LineOutput::Render(vec![RenderInstruction::notice(e.user_message())])
                }
            },
            "frame" => self.frame(arg).await,
            "help" => {
                let mut lines = vec!["[HELP]".to_string()];
                lines.extend(HELP.iter().map(|s| s.to_string()));
                LineOutput::Print(lines)
            }
            "go" => error("Usage: #go <node>"),
            "save" | "load" => error(format!("Usage: #{command} <path>")),
            _ => error("Unknown command. Type #help for help."),
        }
    }

    async fn run(&mut self, command: Command) -> LineOutput {
        LineOutput::Render(self.session.dispatch(command).await)
    }

    async fn frame(&mut self, json: &str) -> LineOutput {
        if let Err(e) = self.frames.post_frame(json).await {
            return error(format!("Frame rejected: {e}"));
        }
        let mut out = Vec::new();
        while let Some(command) = self.inbox.try_recv() {
            out.extend(self.session.dispatch(command).await);
        }
        LineOutput::Render(out)
    }

    fn status(&self) -> Vec<String> {
        let session = &self.session;
        let identity = session.identity();
        let player = if identity.logged_in {
            identity.display_name.as_str()
        } else {
            "(not logged in)"
        };
        vec![
            "[STATUS]".to_string(),
            format!("  Character: {}", identity.character),
            format!("  Player: {player}"),
            format!("  Node: {}", session.current_node().unwrap_or("-")),
            format!("  Mood: {} ({} wrong answers)", session.mood(), session.wrong_count()),
            format!("  Cracks: {} / {}", session.cracks().level(), bleed_core::cracks::MAX_CRACKS),
            format!("  Transcript: {} lines", session.transcript().len()),
        ]
    }
}

fn error(message: impl Into<String>) -> LineOutput {
    LineOutput::Print(vec![format!("[ERROR] {}", message.into())])
}

/// Pick the completion backend: a remote server, the API directly, or nothing.
pub fn completion_service(config: &HeadlessConfig) -> Arc<dyn CompletionService> {
    if let Some(server) = &config.server {
        tracing::info!(%server, "using remote chat server");
        return Arc::new(HttpChatService::new(server));
    }
    match completion::Client::from_env() {
        Ok(client) => Arc::new(client),
        Err(e) => {
            tracing::warn!(error = %e, "no completion service; chatbot replies will fall back");
            Arc::new(Offline)
        }
    }
}

/// Run the game in headless mode until `#quit` or end of input.
pub async fn run_headless(config: HeadlessConfig) -> anyhow::Result<()> {
    let service = completion_service(&config);
    let assets: Arc<dyn AssetSource> = Arc::new(AssetLayout::new(Source::parse(&config.assets)));

    let mut session_config = SessionConfig::new(config.character.clone());
    if let Some(name) = &config.name {
        session_config = session_config.with_display_name(name);
    }
    let session = Session::start(session_config, assets, service).await?;

    let mut renderer = TextRenderer::new(io::stdout());
    println!("=== Bleed Headless Mode ===");
    println!("Type #help for commands.");
    println!();
    renderer.render_all(&session.opening())?;

    let mut game = Headless::new(session);
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("Error reading input: {e}");
                break;
            }
        };

        match game.handle(&line).await {
            LineOutput::Render(out) => renderer.render_all(&out)?,
            LineOutput::Print(lines) => {
                for line in lines {
                    println!("{line}");
                }
            }
            LineOutput::Quit => {
                println!("Goodbye!");
                break;
            }
        }
    }

    tracing::info!(lines = game.session().transcript().len(), "headless session ended");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bleed_core::testing::{test_key, InMemoryAssets, MockCompletion};

    async fn headless() -> Headless {
        let session = Session::start(
            SessionConfig::new(test_key("maya")),
            Arc::new(InMemoryAssets::sample()),
            MockCompletion::new().as_service(),
        )
        .await
        .unwrap();
        Headless::new(session)
    }

    #[tokio::test]
    async fn test_numbers_are_one_based_choices() {
        let mut game = headless().await;
        assert!(matches!(game.handle("1").await, LineOutput::Render(_)));
        assert_eq!(game.session().current_node(), Some("S2"));

        let LineOutput::Render(out) = game.handle("0").await else {
            panic!("expected render output");
        };
        assert_eq!(out, vec![RenderInstruction::notice("Choices start at 1.")]);
    }

    #[tokio::test]
    async fn test_commands() {
        let mut game = headless().await;
        game.handle("#go S2").await;
        assert_eq!(game.session().current_node(), Some("S2"));
        game.handle("#restart").await;
        assert_eq!(game.session().current_node(), Some("S1"));

        game.handle("#login neo hunter2").await;
        assert!(game.session().identity().logged_in);

        let LineOutput::Print(lines) = game.handle("#status").await else {
            panic!("expected status lines");
        };
        assert_eq!(lines[0], "[STATUS]");
        assert!(lines.contains(&"  Player: neo".to_string()));

        assert_eq!(game.handle("#quit").await, LineOutput::Quit);
    }

    #[tokio::test]
    async fn test_frame_command_switches_character() {
        let mut game = headless().await;
        game.handle(r#"#frame { "action": "stanley-connected", "gamertag": "E-1138" }"#)
            .await;
        assert_eq!(game.session().character().as_str(), "stanley");
        assert_eq!(game.session().identity().display_name, "E-1138");

        let LineOutput::Print(lines) = game.handle(r#"#frame { "action": "hack" }"#).await else {
            panic!("expected an error line");
        };
        assert!(lines[0].starts_with("[ERROR] Frame rejected"));
    }

    #[tokio::test]
    async fn test_plain_text_goes_to_chat() {
        let mut game = headless().await;
        let LineOutput::Render(out) = game.handle("is this a scam?").await else {
            panic!("expected render output");
        };
        assert!(out.contains(&RenderInstruction::bot("Scammers ask for money quickly.")));
    }

    #[tokio::test]
    async fn test_greet_command() {
        let mut game = headless().await;
        game.handle("#login neo hunter2").await;
        let LineOutput::Render(out) = game.handle("#greet").await else {
            panic!("expected render output");
        };
        let [RenderInstruction::Message { text, .. }] = out.as_slice() else {
            panic!("expected one message, got {out:?}");
        };
        assert!(text.starts_with("Hello neo! "));
    }

    #[tokio::test]
    async fn test_usage_errors() {
        let mut game = headless().await;
        assert_eq!(
            game.handle("#go").await,
            LineOutput::Print(vec!["[ERROR] Usage: #go <node>".to_string()])
        );
        assert_eq!(
            game.handle("#dance").await,
            LineOutput::Print(vec!["[ERROR] Unknown command. Type #help for help.".to_string()])
        );
    }
}
