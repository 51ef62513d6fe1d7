//! Integration tests that call the real completion API.
//!
//! These tests require OPENAI_API_KEY to be set (via .env file or environment).
//! Run with: `cargo test -p bleed-core --test api_integration -- --ignored`
//!
//! These are marked #[ignore] by default to avoid API costs in CI and
//! failures when no key is available.

use bleed_core::reply::{CompletionService, PromptRequest, ReplyEngine, ReplySource};
use bleed_core::testing::{sample_character, sample_knowledge, test_key};
use std::sync::Arc;

/// Load environment variables from .env file
fn setup() {
    let _ = dotenvy::dotenv();
}

/// Check if API key is available
fn has_api_key() -> bool {
    std::env::var("OPENAI_API_KEY").is_ok()
}

#[tokio::test]
#[ignore] // Run with: cargo test -p bleed-core --test api_integration -- --ignored
async fn test_client_answers_in_character() {
    setup();
    if !has_api_key() {
        eprintln!("Skipping test: OPENAI_API_KEY not set");
        return;
    }

    let client = completion::Client::from_env().expect("Failed to create client");
    let request = PromptRequest {
        character: test_key("maya"),
        system_prompt: sample_character("maya").system_prompt(),
        message: "Someone I met online wants me to move to another app. Thoughts?".to_string(),
        session_id: None,
    };

    let reply = CompletionService::complete(&client, &request)
        .await
        .expect("completion should succeed");
    println!("Reply: {reply}");
    assert!(!reply.trim().is_empty());
}

#[tokio::test]
#[ignore]
async fn test_engine_falls_through_to_remote() {
    setup();
    if !has_api_key() {
        eprintln!("Skipping test: OPENAI_API_KEY not set");
        return;
    }

    let client = completion::Client::from_env().expect("Failed to create client");
    let mut engine = ReplyEngine::new(
        test_key("maya"),
        Some(sample_character("maya")),
        Some(sample_knowledge()),
        Arc::new(client),
    );

    let reply = engine.reply("What is your favourite colour?").await;
    println!("Reply ({:?}): {}", reply.source, reply.text);
    assert_eq!(reply.source, ReplySource::Remote);
    assert_eq!(reply.wrong_count, 1);
}
