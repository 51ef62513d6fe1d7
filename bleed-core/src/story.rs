//! Story graphs: nodes, choices and endings.
//!
//! A story document is fetched once per character and parsed into an
//! immutable [`StoryGraph`]. Traversal lives in [`crate::navigator`].

use crate::source::{FetchError, Source};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Every story starts here.
pub const START_NODE: &str = "S1";

/// Identifier of a node within one story graph.
pub type NodeId = String;

/// Errors from loading a story or knowledge document.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("invalid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("story has no start node '{0}'")]
    MissingStartNode(String),

    #[error("thresholds out of order: wrongAnswers {wrong_answers} > critical {critical}")]
    ThresholdOrder { wrong_answers: u32, critical: u32 },
}

/// How a terminal node ends the story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success => f.write_str("success"),
            Outcome::Failure => f.write_str("failure"),
        }
    }
}

/// Marks a choice as moving the crack overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChoiceTag {
    #[serde(alias = "unsafe")]
    Risky,
    #[serde(alias = "safe")]
    Recovery,
}

/// A labeled transition to another node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub label: String,
    pub next: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<ChoiceTag>,
}

impl Choice {
    pub fn new(label: impl Into<String>, next: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            next: next.into(),
            tag: None,
        }
    }

    pub fn tagged(mut self, tag: ChoiceTag) -> Self {
        self.tag = Some(tag);
        self
    }
}

/// A single narrative beat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Filled from the document key; not part of the node body.
    #[serde(skip)]
    pub id: NodeId,
    pub scene: String,
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<Outcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narration: Option<String>,
}

impl Node {
    pub fn new(id: impl Into<String>, scene: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            scene: scene.into(),
            choices: Vec::new(),
            end: None,
            narration: None,
        }
    }

    pub fn with_choice(mut self, choice: Choice) -> Self {
        self.choices.push(choice);
        self
    }

    pub fn ending(mut self, outcome: Outcome, narration: impl Into<String>) -> Self {
        self.end = Some(outcome);
        self.narration = Some(narration.into());
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.end.is_some()
    }
}

/// Cosmetic theme metadata carried by a story.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    #[serde(default)]
    pub class: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub music: Option<String>,
}

/// Wire shape of a story document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryDocument {
    #[serde(default)]
    pub theme: Theme,
    pub nodes: HashMap<NodeId, Node>,
}

/// An immutable, loaded story.
#[derive(Debug, Clone, PartialEq)]
pub struct StoryGraph {
    theme: Theme,
    nodes: HashMap<NodeId, Node>,
}

impl StoryGraph {
    /// Build a graph from already-constructed nodes.
    pub fn new(theme: Theme, nodes: impl IntoIterator<Item = Node>) -> Result<Self, LoadError> {
        let nodes = nodes.into_iter().map(|n| (n.id.clone(), n)).collect();
        Self::from_document(StoryDocument { theme, nodes })
    }

    /// Validate a parsed document into a graph.
    ///
    /// Node ids are taken from the map keys. Terminal nodes lose any
    /// choices they declare.
    pub fn from_document(document: StoryDocument) -> Result<Self, LoadError> {
        let mut nodes = document.nodes;

        for (id, node) in nodes.iter_mut() {
            node.id = id.clone();
            if node.is_terminal() && !node.choices.is_empty() {
                tracing::warn!(node = %id, count = node.choices.len(), "dropping choices on terminal node");
                node.choices.clear();
            }
        }

        if !nodes.contains_key(START_NODE) {
            return Err(LoadError::MissingStartNode(START_NODE.to_string()));
        }

        let graph = Self {
            theme: document.theme,
            nodes,
        };

        for (node, target) in graph.dangling_choices() {
            tracing::warn!(%node, %target, "choice points at a missing node");
        }

        Ok(graph)
    }

    /// Parse a story document.
    pub fn from_json(json: &str) -> Result<Self, LoadError> {
        let document: StoryDocument = serde_json::from_str(json)?;
        Self::from_document(document)
    }

    /// Fetch and parse a story document.
    pub async fn load(source: &Source) -> Result<Self, LoadError> {
        let json = source.read_to_string().await?;
        Self::from_json(&json)
    }

    /// Look up a node by id.
    pub fn get(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// True if `id` names a node in this graph.
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Id of the start node.
    pub fn start(&self) -> &str {
        START_NODE
    }

    /// Theme class and music for this story.
    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node ids, in no particular order.
    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// `(node, target)` pairs whose target is not in the graph, sorted.
    pub fn dangling_choices(&self) -> Vec<(NodeId, NodeId)> {
        let mut dangling: Vec<_> = self
            .nodes
            .values()
            .flat_map(|node| {
                node.choices
                    .iter()
                    .filter(|c| !self.nodes.contains_key(&c.next))
                    .map(move |c| (node.id.clone(), c.next.clone()))
            })
            .collect();
        dangling.sort();
        dangling
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STANLEY: &str = r#"{
        "theme": { "class": "theme-stanley", "music": "crt.mp3" },
        "nodes": {
            "S1": { "scene": "scenes/login.html", "choices": [
                { "label": "Accept request", "next": "S2", "tag": "unsafe" },
                { "label": "Verify first", "next": "S3" }
            ]},
            "S2": { "scene": "scenes/wire.html", "end": "failure", "narration": "The money is gone." },
            "S3": { "scene": "scenes/report.html", "end": "success", "narration": "You reported it." }
        }
    }"#;

    #[test]
    fn test_parse_document() {
        let graph = StoryGraph::from_json(STANLEY).unwrap();
        assert_eq!(graph.len(), 3);
        assert_eq!(graph.theme().class, "theme-stanley");
        assert_eq!(graph.theme().music.as_deref(), Some("crt.mp3"));

        let start = graph.get("S1").unwrap();
        assert_eq!(start.id, "S1");
        assert_eq!(start.choices.len(), 2);
        assert_eq!(start.choices[0].tag, Some(ChoiceTag::Risky));
        assert_eq!(start.choices[1].tag, None);

        let fail = graph.get("S2").unwrap();
        assert_eq!(fail.end, Some(Outcome::Failure));
        assert!(fail.is_terminal());
    }

    #[test]
    fn test_missing_start_node() {
        let json = r#"{ "theme": {"class": "x"}, "nodes": { "S2": { "scene": "b.html" } } }"#;
        let err = StoryGraph::from_json(json).unwrap_err();
        assert!(matches!(err, LoadError::MissingStartNode(id) if id == "S1"));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            StoryGraph::from_json("{ nodes: ").unwrap_err(),
            LoadError::Parse(_)
        ));
    }

    #[test]
    fn test_terminal_node_drops_choices() {
        let json = r#"{ "nodes": {
            "S1": { "scene": "a.html", "end": "success", "choices": [{ "label": "Again", "next": "S1" }] }
        } }"#;
        let graph = StoryGraph::from_json(json).unwrap();
        assert!(graph.get("S1").unwrap().choices.is_empty());
    }

    #[test]
    fn test_dangling_choices_reported_not_fatal() {
        let graph = StoryGraph::new(
            Theme::default(),
            vec![
                Node::new("S1", "a.html")
                    .with_choice(Choice::new("Go", "S2"))
                    .with_choice(Choice::new("Lost", "S9")),
                Node::new("S2", "b.html").ending(Outcome::Success, "Done"),
            ],
        )
        .unwrap();

        assert_eq!(
            graph.dangling_choices(),
            vec![("S1".to_string(), "S9".to_string())]
        );
    }

    #[test]
    fn test_safe_alias_is_recovery() {
        let choice: Choice =
            serde_json::from_str(r#"{ "label": "Block them", "next": "S4", "tag": "safe" }"#).unwrap();
        assert_eq!(choice.tag, Some(ChoiceTag::Recovery));
    }
}
