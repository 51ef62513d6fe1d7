//! Resolving a character's documents.

use crate::character::{CharacterConfig, CharacterKey};
use crate::knowledge::KnowledgeBase;
use crate::source::Source;
use crate::story::{LoadError, StoryGraph};
use async_trait::async_trait;

/// Supplies the story, knowledge base and persona for a character.
#[async_trait]
pub trait AssetSource: Send + Sync {
    async fn story(&self, key: &CharacterKey) -> Result<StoryGraph, LoadError>;
    async fn knowledge(&self, key: &CharacterKey) -> Result<KnowledgeBase, LoadError>;
    async fn character(&self, key: &CharacterKey) -> Result<CharacterConfig, LoadError>;
}

/// Everything loaded for one character.
///
/// Only the story is mandatory. A missing knowledge base or persona is
/// logged and left as `None`.
#[derive(Debug, Clone)]
pub struct CharacterAssets {
    pub story: StoryGraph,
    pub knowledge: Option<KnowledgeBase>,
    pub config: Option<CharacterConfig>,
}

impl CharacterAssets {
    pub async fn load(assets: &dyn AssetSource, key: &CharacterKey) -> Result<Self, LoadError> {
        let story = assets.story(key).await.map_err(|e| {
            tracing::error!(character = %key, error = %e, "error loading story");
            e
        })?;

        let knowledge = match assets.knowledge(key).await {
            Ok(kb) => Some(kb),
            Err(e) => {
                tracing::warn!(character = %key, error = %e, "error loading knowledge base");
                None
            }
        };

        let config = match assets.character(key).await {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!(character = %key, error = %e, "could not load character config");
                None
            }
        };

        Ok(Self {
            story,
            knowledge,
            config,
        })
    }
}

/// Directory (or URL) layout:
/// `stories/<key>.json`, `knowledge/<key>.json`, `characters/<key>.json`.
#[derive(Debug, Clone)]
pub struct AssetLayout {
    base: Source,
}

impl AssetLayout {
    pub fn new(base: impl Into<Source>) -> Self {
        Self { base: base.into() }
    }

    pub fn story_source(&self, key: &CharacterKey) -> Source {
        self.base.join(&format!("stories/{key}.json"))
    }

    pub fn knowledge_source(&self, key: &CharacterKey) -> Source {
        self.base.join(&format!("knowledge/{key}.json"))
    }

    pub fn character_source(&self, key: &CharacterKey) -> Source {
        self.base.join(&format!("characters/{key}.json"))
    }
}

#[async_trait]
impl AssetSource for AssetLayout {
    async fn story(&self, key: &CharacterKey) -> Result<StoryGraph, LoadError> {
        StoryGraph::load(&self.story_source(key)).await
    }

    async fn knowledge(&self, key: &CharacterKey) -> Result<KnowledgeBase, LoadError> {
        KnowledgeBase::load(&self.knowledge_source(key)).await
    }

    async fn character(&self, key: &CharacterKey) -> Result<CharacterConfig, LoadError> {
        CharacterConfig::load(&self.character_source(key)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_paths() {
        let layout = AssetLayout::new("https://cdn.example.com/bleed");
        let key = CharacterKey::new("eli").unwrap();
        assert_eq!(
            layout.story_source(&key),
            Source::Url("https://cdn.example.com/bleed/stories/eli.json".into())
        );
        assert_eq!(
            layout.character_source(&key),
            Source::Url("https://cdn.example.com/bleed/characters/eli.json".into())
        );
    }
}
