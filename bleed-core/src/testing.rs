//! Testing utilities.
//!
//! This module provides tools for integration testing:
//! - `MockCompletion` for deterministic replies without network calls
//! - `InMemoryAssets` for stories and knowledge bases built in code
//! - `TestHarness` for scripted sessions
//! - `RecordingRenderer` and assertion helpers for checking output

use crate::assets::AssetSource;
use crate::character::{CharacterConfig, CharacterKey};
use crate::events::Command;
use crate::knowledge::{KnowledgeBase, KnowledgeEntry};
use crate::render::{RenderInstruction, Renderer, Speaker};
use crate::reply::{CompletionService, Mood, PromptRequest, ServiceError, Thresholds};
use crate::session::{Session, SessionConfig, SessionError};
use crate::source::FetchError;
use crate::story::{Choice, ChoiceTag, LoadError, Node, Outcome, StoryGraph, Theme};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

/// Reply used once the script runs out.
pub const UNSCRIPTED_REPLY: &str = "The mock has no more scripted replies.";

// ============================================================================
// Mock completion service
// ============================================================================

#[derive(Default)]
struct MockState {
    script: VecDeque<Result<String, ServiceError>>,
    prompts: Vec<PromptRequest>,
}

/// A completion service that returns scripted results in order.
///
/// Clones share the same script and prompt log, so a test can keep one
/// handle while the session owns another.
#[derive(Clone, Default)]
pub struct MockCompletion {
    state: Arc<Mutex<MockState>>,
}

impl MockCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply.
    pub fn reply(&self, text: impl Into<String>) -> &Self {
        self.lock().script.push_back(Ok(text.into()));
        self
    }

    /// Queue a failure.
    pub fn fail(&self, error: ServiceError) -> &Self {
        self.lock().script.push_back(Err(error));
        self
    }

    /// Every prompt received so far.
    pub fn prompts(&self) -> Vec<PromptRequest> {
        self.lock().prompts.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().prompts.len()
    }

    pub fn last_prompt(&self) -> Option<PromptRequest> {
        self.lock().prompts.last().cloned()
    }

    pub fn as_service(&self) -> Arc<dyn CompletionService> {
        Arc::new(self.clone())
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl CompletionService for MockCompletion {
    async fn complete(&self, request: &PromptRequest) -> Result<String, ServiceError> {
        let mut state = self.lock();
        state.prompts.push(request.clone());
        state
            .script
            .pop_front()
            .unwrap_or_else(|| Ok(UNSCRIPTED_REPLY.to_string()))
    }
}

// ============================================================================
// In-memory assets
// ============================================================================

/// An asset source backed by maps. Missing entries fail like missing files.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAssets {
    stories: HashMap<CharacterKey, StoryGraph>,
    knowledge: HashMap<CharacterKey, KnowledgeBase>,
    characters: HashMap<CharacterKey, CharacterConfig>,
}

impl InMemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Story, knowledge and persona for `maya`, `eli` and `stanley`.
    pub fn sample() -> Self {
        let mut assets = Self::new();
        for key in ["maya", "eli", "stanley"] {
            assets = assets
                .with_story(key, sample_graph())
                .with_knowledge(key, sample_knowledge())
                .with_character(key, sample_character(key));
        }
        assets
    }

    pub fn with_story(mut self, key: &str, graph: StoryGraph) -> Self {
        self.stories.insert(test_key(key), graph);
        self
    }

    pub fn with_knowledge(mut self, key: &str, knowledge: KnowledgeBase) -> Self {
        self.knowledge.insert(test_key(key), knowledge);
        self
    }

    pub fn with_character(mut self, key: &str, config: CharacterConfig) -> Self {
        self.characters.insert(test_key(key), config);
        self
    }

    pub fn without_knowledge(mut self, key: &str) -> Self {
        self.knowledge.remove(&test_key(key));
        self
    }

    pub fn without_character(mut self, key: &str) -> Self {
        self.characters.remove(&test_key(key));
        self
    }
}

fn missing(kind: &str, key: &CharacterKey) -> LoadError {
    LoadError::Fetch(FetchError::Io {
        path: PathBuf::from(format!("memory/{kind}/{key}.json")),
        source: io::Error::new(io::ErrorKind::NotFound, "not in memory"),
    })
}

#[async_trait]
impl AssetSource for InMemoryAssets {
    async fn story(&self, key: &CharacterKey) -> Result<StoryGraph, LoadError> {
        self.stories.get(key).cloned().ok_or_else(|| missing("stories", key))
    }

    async fn knowledge(&self, key: &CharacterKey) -> Result<KnowledgeBase, LoadError> {
        self.knowledge
            .get(key)
            .cloned()
            .ok_or_else(|| missing("knowledge", key))
    }

    async fn character(&self, key: &CharacterKey) -> Result<CharacterConfig, LoadError> {
        self.characters
            .get(key)
            .cloned()
            .ok_or_else(|| missing("characters", key))
    }
}

// ============================================================================
// Sample data
// ============================================================================

/// `S1 --Go--> S2`, where S2 is a successful ending narrated "Done".
pub fn sample_graph() -> StoryGraph {
    StoryGraph::new(
        Theme::default(),
        vec![
            Node::new("S1", "a.html").with_choice(Choice::new("Go", "S2")),
            Node::new("S2", "b.html").ending(Outcome::Success, "Done"),
        ],
    )
    .unwrap_or_else(|e| panic!("sample graph is valid: {e}"))
}

/// A branching story with tagged choices and one dangling target.
///
/// S1 offers a risky link (to S2) and a recovery report (to S3). S2 has a
/// broken choice pointing at `S404`. S3 succeeds, S4 fails.
pub fn tagged_graph() -> StoryGraph {
    StoryGraph::new(
        Theme {
            class: "theme-maya".to_string(),
            music: Some("maya.mp3".to_string()),
        },
        vec![
            Node::new("S1", "match.html")
                .with_choice(Choice::new("Click the link", "S2").tagged(ChoiceTag::Risky))
                .with_choice(Choice::new("Report the profile", "S3").tagged(ChoiceTag::Recovery)),
            Node::new("S2", "link.html")
                .with_choice(Choice::new("Send the money", "S4").tagged(ChoiceTag::Risky))
                .with_choice(Choice::new("Wait", "S404")),
            Node::new("S3", "report.html").ending(Outcome::Success, "You stayed safe."),
            Node::new("S4", "loss.html").ending(Outcome::Failure, "The money is gone."),
        ],
    )
    .unwrap_or_else(|e| panic!("tagged graph is valid: {e}"))
}

pub fn sample_knowledge() -> KnowledgeBase {
    KnowledgeBase::new(vec![
        KnowledgeEntry::new("scam", "Scammers ask for money quickly."),
        KnowledgeEntry::new("password", "Never share your password."),
    ])
}

/// A persona that gets tired after two misses and breaks after three.
pub fn sample_character(key: &str) -> CharacterConfig {
    CharacterConfig {
        name: key.to_uppercase(),
        role: "safety guide".to_string(),
        style: "calm".to_string(),
        lore: vec!["Grew up online.".to_string(), "Trusts nobody.".to_string()],
        failure: "glitch out".to_string(),
        thresholds: Thresholds::new(2, 3),
    }
}

/// Parse a key that tests know is valid.
pub fn test_key(key: &str) -> CharacterKey {
    CharacterKey::new(key).unwrap_or_else(|e| panic!("{e}"))
}

// ============================================================================
// Recording renderer
// ============================================================================

/// A renderer that keeps every instruction it receives.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    instructions: Vec<RenderInstruction>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instructions(&self) -> &[RenderInstruction] {
        &self.instructions
    }

    /// Node ids of every scene rendered, in order.
    pub fn scenes(&self) -> Vec<&str> {
        self.instructions
            .iter()
            .filter_map(|i| match i {
                RenderInstruction::Scene { node, .. } => Some(node.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Texts spoken by `speaker`, in order.
    pub fn messages(&self, speaker: Speaker) -> Vec<&str> {
        self.instructions
            .iter()
            .filter_map(|i| match i {
                RenderInstruction::Message { speaker: s, text } if *s == speaker => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn notices(&self) -> Vec<&str> {
        self.instructions
            .iter()
            .filter_map(|i| match i {
                RenderInstruction::Notice(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.instructions.clear();
    }
}

impl Renderer for RecordingRenderer {
    fn render(&mut self, instruction: &RenderInstruction) -> io::Result<()> {
        self.instructions.push(instruction.clone());
        Ok(())
    }
}

// ============================================================================
// Harness
// ============================================================================

/// A session wired to in-memory assets and a mock completion service.
pub struct TestHarness {
    pub session: Session,
    pub completion: MockCompletion,
    pub renderer: RecordingRenderer,
}

impl TestHarness {
    /// Start as `maya` on the sample assets.
    pub async fn new() -> Result<Self, SessionError> {
        Self::with_assets(InMemoryAssets::sample(), "maya").await
    }

    pub async fn with_assets(assets: InMemoryAssets, character: &str) -> Result<Self, SessionError> {
        let completion = MockCompletion::new();
        let session = Session::start(
            SessionConfig::new(test_key(character)),
            Arc::new(assets),
            completion.as_service(),
        )
        .await?;

        let mut renderer = RecordingRenderer::new();
        // Render output never fails for the recording renderer.
        let _ = renderer.render_all(&session.opening());

        Ok(Self {
            session,
            completion,
            renderer,
        })
    }

    /// Queue a successful remote reply.
    pub fn expect_reply(&mut self, text: impl Into<String>) -> &mut Self {
        self.completion.reply(text);
        self
    }

    pub fn expect_failure(&mut self, error: ServiceError) -> &mut Self {
        self.completion.fail(error);
        self
    }

    /// Dispatch a command and record its output.
    pub async fn run(&mut self, command: Command) -> Vec<RenderInstruction> {
        let out = self.session.dispatch(command).await;
        let _ = self.renderer.render_all(&out);
        out
    }

    pub async fn send(&mut self, text: &str) -> Vec<RenderInstruction> {
        self.run(Command::Send(text.to_string())).await
    }

    /// Choose by zero-based index.
    pub async fn choose(&mut self, index: usize) -> Vec<RenderInstruction> {
        self.run(Command::Choose(index)).await
    }

    pub async fn go_to(&mut self, id: &str) -> Vec<RenderInstruction> {
        self.run(Command::GoTo(id.to_string())).await
    }

    pub fn current_node(&self) -> Option<&str> {
        self.session.current_node()
    }

    pub fn mood(&self) -> Mood {
        self.session.mood()
    }

    pub fn wrong_count(&self) -> u32 {
        self.session.wrong_count()
    }

    pub fn crack_level(&self) -> u8 {
        self.session.cracks().level()
    }

    /// Most recent bot line in the transcript.
    pub fn last_bot_message(&self) -> Option<&str> {
        self.session
            .transcript()
            .lines()
            .iter()
            .rev()
            .find_map(|line| line.strip_prefix("Bot: "))
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

#[track_caller]
pub fn assert_at_node(harness: &TestHarness, id: &str) {
    assert_eq!(
        harness.current_node(),
        Some(id),
        "Expected to be at node '{id}'"
    );
}

#[track_caller]
pub fn assert_mood(harness: &TestHarness, mood: Mood) {
    assert_eq!(
        harness.mood(),
        mood,
        "Expected mood {mood}, got {} after {} misses",
        harness.mood(),
        harness.wrong_count()
    );
}

#[track_caller]
pub fn assert_cracks(harness: &TestHarness, level: u8) {
    assert_eq!(
        harness.crack_level(),
        level,
        "Expected crack level {level}"
    );
}

/// Assert that `instructions` contain a bot message with exactly `text`.
#[track_caller]
pub fn assert_bot_said(instructions: &[RenderInstruction], text: &str) {
    assert!(
        instructions.contains(&RenderInstruction::bot(text)),
        "Expected bot to say '{text}', got {instructions:?}"
    );
}

/// Assert that `instructions` contain a notice.
#[track_caller]
pub fn assert_notice(instructions: &[RenderInstruction], text: &str) {
    assert!(
        instructions.contains(&RenderInstruction::notice(text)),
        "Expected notice '{text}', got {instructions:?}"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_completion_script() {
        let mock = MockCompletion::new();
        mock.reply("one").fail(ServiceError::Empty);

        let request = PromptRequest {
            character: test_key("maya"),
            system_prompt: "p".into(),
            message: "hi".into(),
            session_id: None,
        };

        assert_eq!(mock.complete(&request).await.unwrap(), "one");
        assert!(matches!(mock.complete(&request).await, Err(ServiceError::Empty)));
        assert_eq!(mock.complete(&request).await.unwrap(), UNSCRIPTED_REPLY);
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn test_harness_opening_renders_start_scene() {
        let harness = TestHarness::new().await.unwrap();
        assert_at_node(&harness, "S1");
        assert_eq!(harness.renderer.scenes(), vec!["S1"]);
        assert_eq!(harness.renderer.messages(Speaker::Bot).len(), 1);
        assert_cracks(&harness, 0);
    }

    #[tokio::test]
    async fn test_harness_chat_uses_mock() {
        let mut harness = TestHarness::new().await.unwrap();
        harness.expect_reply("Stay in the app.");

        let out = harness.send("who are you?").await;
        assert_bot_said(&out, "Stay in the app.");
        assert_eq!(harness.last_bot_message(), Some("Stay in the app."));

        let prompt = harness.completion.last_prompt().unwrap();
        assert_eq!(prompt.message, "who are you?");
        assert!(prompt.system_prompt.starts_with("MAYA is a safety guide."));
        assert_eq!(prompt.session_id, Some(harness.session.id().to_string()));
    }

    #[tokio::test]
    async fn test_missing_story_fails_start() {
        let result = TestHarness::with_assets(InMemoryAssets::new(), "maya").await;
        assert!(matches!(result, Err(SessionError::Load(LoadError::Fetch(_)))));
    }

    #[test]
    fn test_tagged_graph_has_dangling_choice() {
        assert_eq!(
            tagged_graph().dangling_choices(),
            vec![("S2".to_string(), "S404".to_string())]
        );
    }
}
