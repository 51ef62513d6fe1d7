//! Keyword knowledge base for the chatbot.

use crate::source::Source;
use crate::story::LoadError;
use serde::{Deserialize, Serialize};

/// One keyword → answer pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub input: String,
    pub output: String,
}

impl KnowledgeEntry {
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct KnowledgeDocument {
    knowledge: Vec<KnowledgeEntry>,
}

/// Ordered entries; the first match wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnowledgeBase {
    entries: Vec<KnowledgeEntry>,
}

impl KnowledgeBase {
    pub fn new(entries: Vec<KnowledgeEntry>) -> Self {
        Self { entries }
    }

    /// Parse a `{ "knowledge": [...] }` document.
    pub fn from_json(json: &str) -> Result<Self, LoadError> {
        let document: KnowledgeDocument = serde_json::from_str(json)?;
        Ok(Self::new(document.knowledge))
    }

    pub async fn load(source: &Source) -> Result<Self, LoadError> {
        let json = source.read_to_string().await?;
        Self::from_json(&json)
    }

    /// Answer for the first entry whose input occurs in `text`, ignoring case.
    pub fn lookup(&self, text: &str) -> Option<&str> {
        let normalized = text.trim().to_lowercase();
        self.entries
            .iter()
            .filter(|entry| !entry.input.trim().is_empty())
            .find(|entry| normalized.contains(&entry.input.to_lowercase()))
            .map(|entry| entry.output.as_str())
    }

    pub fn push(&mut self, entry: KnowledgeEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[KnowledgeEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_ignores_case_and_surroundings() {
        let kb = KnowledgeBase::from_json(
            r#"{ "knowledge": [ { "input": "scam", "output": "Scammers ask for money quickly." } ] }"#,
        )
        .unwrap();

        assert_eq!(
            kb.lookup("  Is this a SCAM or not?  "),
            Some("Scammers ask for money quickly.")
        );
        assert_eq!(kb.lookup("hello"), None);
    }

    #[test]
    fn test_first_declared_entry_wins() {
        let kb = KnowledgeBase::new(vec![
            KnowledgeEntry::new("gift card", "Never pay with gift cards."),
            KnowledgeEntry::new("card", "Guard your card details."),
        ]);
        assert_eq!(kb.lookup("they want a gift card"), Some("Never pay with gift cards."));
        assert_eq!(kb.lookup("my card"), Some("Guard your card details."));
    }

    #[test]
    fn test_blank_input_never_matches() {
        let kb = KnowledgeBase::new(vec![
            KnowledgeEntry::new("  ", "catch-all"),
            KnowledgeEntry::new("2fa", "Turn on 2FA."),
        ]);
        assert_eq!(kb.lookup("anything"), None);
        assert_eq!(kb.lookup("what is 2FA"), Some("Turn on 2FA."));
    }

    #[test]
    fn test_entry_input_is_lowercased() {
        let kb = KnowledgeBase::new(vec![KnowledgeEntry::new("Police Exchange", "Trade there.")]);
        assert_eq!(kb.lookup("where is the police exchange zone"), Some("Trade there."));
    }

    #[test]
    fn test_missing_knowledge_field_is_error() {
        assert!(KnowledgeBase::from_json(r#"{ "entries": [] }"#).is_err());
    }
}
