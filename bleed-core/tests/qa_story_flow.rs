//! QA tests for story traversal through a session.
//!
//! These run entirely in memory: stories come from `InMemoryAssets` and the
//! chatbot is a `MockCompletion`.
//!
//! Run with: `cargo test -p bleed-core --test qa_story_flow`

use bleed_core::events::{command_channel, Command};
use bleed_core::render::{RenderInstruction, Speaker};
use bleed_core::story::Outcome;
use bleed_core::testing::{
    assert_at_node, assert_cracks, assert_notice, tagged_graph, test_key, InMemoryAssets, TestHarness,
};
use std::sync::Arc;

fn scenes(instructions: &[RenderInstruction]) -> usize {
    instructions
        .iter()
        .filter(|i| matches!(i, RenderInstruction::Scene { .. }))
        .count()
}

async fn tagged_harness() -> TestHarness {
    let assets = InMemoryAssets::sample().with_story("maya", tagged_graph());
    TestHarness::with_assets(assets, "maya").await.unwrap()
}

// =============================================================================
// BASIC TRAVERSAL
// =============================================================================

#[tokio::test]
async fn test_go_then_follow_choice_reaches_success_ending() {
    let mut harness = TestHarness::new().await.unwrap();

    let out = harness.go_to("S1").await;
    assert_eq!(scenes(&out), 1);
    assert_at_node(&harness, "S1");

    let out = harness.choose(0).await;
    assert_at_node(&harness, "S2");
    assert_eq!(
        out,
        vec![
            RenderInstruction::Scene {
                node: "S2".into(),
                scene: "b.html".into(),
                choices: vec![],
            },
            RenderInstruction::Ending {
                outcome: Outcome::Success,
                narration: "Done".into(),
            },
        ]
    );
}

#[tokio::test]
async fn test_each_transition_renders_scene_once() {
    let mut harness = TestHarness::new().await.unwrap();
    harness.renderer.clear();

    harness.choose(0).await;
    harness.run(Command::Restart).await;
    harness.go_to("S2").await;

    assert_eq!(harness.renderer.scenes(), vec!["S2", "S1", "S2"]);
}

#[tokio::test]
async fn test_unknown_node_keeps_current_scene() {
    let mut harness = TestHarness::new().await.unwrap();

    let out = harness.go_to("S9").await;
    assert_notice(&out, "Node S9 not found");
    assert_eq!(scenes(&out), 0);
    assert_at_node(&harness, "S1");
}

#[tokio::test]
async fn test_terminal_node_offers_no_choices() {
    let mut harness = TestHarness::new().await.unwrap();
    harness.choose(0).await;

    let out = harness.choose(0).await;
    assert_notice(&out, "That choice is not available.");
    assert_at_node(&harness, "S2");
    assert!(harness.session.navigator().is_finished());
}

#[tokio::test]
async fn test_restart_after_ending() {
    let mut harness = TestHarness::new().await.unwrap();
    harness.choose(0).await;

    let out = harness.run(Command::Restart).await;
    assert_at_node(&harness, "S1");
    assert!(matches!(&out[0], RenderInstruction::Scene { choices, .. } if choices.len() == 1));
}

// =============================================================================
// TAGGED CHOICES AND DANGLING TARGETS
// =============================================================================

#[tokio::test]
async fn test_risky_choices_crack_the_overlay() {
    let mut harness = tagged_harness().await;

    let out = harness.choose(0).await;
    assert_cracks(&harness, 1);
    assert!(matches!(out[0], RenderInstruction::Cracks { level: 1, .. }));

    let out = harness.choose(0).await;
    assert_cracks(&harness, 2);
    assert_at_node(&harness, "S4");
    assert!(out.contains(&RenderInstruction::Ending {
        outcome: Outcome::Failure,
        narration: "The money is gone.".into(),
    }));
}

#[tokio::test]
async fn test_recovery_choice_never_goes_below_zero() {
    let mut harness = tagged_harness().await;

    harness.choose(1).await;
    assert_cracks(&harness, 0);
    assert_at_node(&harness, "S3");
}

#[tokio::test]
async fn test_dangling_choice_fails_closed() {
    let mut harness = tagged_harness().await;
    harness.choose(0).await;

    let out = harness.choose(1).await;
    assert_notice(&out, "Node S404 not found");
    assert_at_node(&harness, "S2");
    assert_cracks(&harness, 1);
}

#[tokio::test]
async fn test_opening_carries_theme() {
    let harness = tagged_harness().await;
    let theme = harness
        .renderer
        .instructions()
        .iter()
        .find_map(|i| match i {
            RenderInstruction::Theme(theme) => Some(theme.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(theme.class, "theme-maya");
    assert_eq!(theme.music.as_deref(), Some("maya.mp3"));
}

// =============================================================================
// IDENTITY AND CHARACTERS
// =============================================================================

#[tokio::test]
async fn test_login_requires_both_credentials() {
    let mut harness = TestHarness::new().await.unwrap();

    let out = harness
        .run(Command::Login {
            display_name: "neo".into(),
            password: "   ".into(),
        })
        .await;
    assert_notice(&out, "Please enter both credentials!");
    assert!(!harness.session.identity().logged_in);

    let out = harness
        .run(Command::Login {
            display_name: " neo ".into(),
            password: "hunter2".into(),
        })
        .await;
    assert_eq!(
        out,
        vec![RenderInstruction::system("Welcome neo! You are connected as MAYA.")]
    );
    assert!(harness.session.identity().logged_in);

    harness.run(Command::Logout).await;
    let identity = harness.session.identity();
    assert!(!identity.logged_in);
    assert!(identity.display_name.is_empty());
    assert_eq!(identity.character.as_str(), "maya");
}

#[tokio::test]
async fn test_switch_character_restarts_story_and_keeps_mood() {
    let mut harness = tagged_harness().await;
    harness.choose(0).await;
    harness.send("what now?").await;
    assert_eq!(harness.wrong_count(), 1);

    let out = harness.run(Command::SwitchCharacter(test_key("eli"))).await;
    assert_eq!(harness.session.character().as_str(), "eli");
    assert_at_node(&harness, "S1");
    assert_eq!(harness.wrong_count(), 1);

    let intro = harness.session.roster().profile(&test_key("eli")).unwrap().intro.clone();
    assert!(out.contains(&RenderInstruction::bot(intro)));
}

#[tokio::test]
async fn test_switch_to_missing_story_keeps_current() {
    let mut harness = TestHarness::new().await.unwrap();
    harness.choose(0).await;

    let out = harness.run(Command::SwitchCharacter(test_key("nobody"))).await;
    assert_notice(&out, "Could not load the story. Try again.");
    assert_eq!(harness.session.character().as_str(), "maya");
    assert_at_node(&harness, "S2");
}

#[tokio::test]
async fn test_frame_login_through_channel() {
    let mut harness = TestHarness::new().await.unwrap();
    let roster = Arc::new(harness.session.roster().clone());
    let (tx, mut rx) = command_channel(4, roster);

    assert!(tx.post_frame(r#"{ "action": "zed-connected" }"#).await.is_err());
    tx.post_frame(r#"{ "action": "eli-connected", "gamertag": "E-1138" }"#)
        .await
        .unwrap();
    drop(tx);

    while let Some(command) = rx.recv().await {
        harness.run(command).await;
    }

    let identity = harness.session.identity();
    assert_eq!(identity.character.as_str(), "eli");
    assert_eq!(identity.display_name, "E-1138");
    assert!(identity.logged_in);
    assert_eq!(
        harness.renderer.messages(Speaker::System).last(),
        Some(&"Welcome E-1138! You are connected as ELI.")
    );
}
