//! Visual corruption overlay.
//!
//! A saturating level in `0..=5`. Risky actions crack the screen further,
//! recovery actions mend it. Each level has its own image.

use crate::story::ChoiceTag;

pub const MAX_CRACKS: u8 = 5;

pub const RISKY_REPLY: &str = "⚠️ That action felt risky. Consider reporting or verifying first.";
pub const RECOVERY_REPLY: &str = "✅ Stabilized. Keep choices in-app and verify identities.";

const DEFAULT_ASSETS: [&str; MAX_CRACKS as usize + 1] = [
    "./assets/images/chroma_logo.png",
    "./assets/images/chroma_break_1.png",
    "./assets/images/chroma_break_2.png",
    "./assets/images/chroma_break_3.png",
    "./assets/images/chroma_break_4.png",
    "./assets/images/chroma_break_5.png",
];

/// Classify chat input that drives the overlay directly.
///
/// `bad` or anything mentioning `unsafe` is risky; `heal` and `repair`
/// are recovery. Everything else is left to the reply engine.
pub fn chat_trigger(text: &str) -> Option<ChoiceTag> {
    let t = text.trim().to_lowercase();
    if t == "bad" || t.contains("unsafe") {
        Some(ChoiceTag::Risky)
    } else if t == "heal" || t == "repair" {
        Some(ChoiceTag::Recovery)
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrackOverlay {
    level: u8,
    assets: Vec<String>,
}

impl Default for CrackOverlay {
    fn default() -> Self {
        Self::new()
    }
}

impl CrackOverlay {
    pub fn new() -> Self {
        Self {
            level: 0,
            assets: DEFAULT_ASSETS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Use custom images; one per level, missing levels reuse the last image.
    pub fn with_assets(mut self, assets: Vec<String>) -> Self {
        if !assets.is_empty() {
            self.assets = assets;
        }
        self
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn increment(&mut self) -> u8 {
        self.set(i32::from(self.level) + 1)
    }

    pub fn decrement(&mut self) -> u8 {
        self.set(i32::from(self.level) - 1)
    }

    /// Clamp into `0..=MAX_CRACKS`.
    pub fn set(&mut self, level: i32) -> u8 {
        self.level = level.clamp(0, i32::from(MAX_CRACKS)) as u8;
        self.level
    }

    /// Apply a tagged action.
    pub fn apply(&mut self, tag: ChoiceTag) -> u8 {
        match tag {
            ChoiceTag::Risky => self.increment(),
            ChoiceTag::Recovery => self.decrement(),
        }
    }

    pub fn asset(&self) -> &str {
        let index = usize::from(self.level).min(self.assets.len() - 1);
        &self.assets[index]
    }

    pub fn reset(&mut self) {
        self.level = 0;
    }
}
