//! Story traversal.
//!
//! The navigator is a small state machine: it starts `Unloaded`, and once a
//! graph is installed it always sits on exactly one node. Every successful
//! move returns a [`Transition`] describing what to render; failed moves
//! leave the current node untouched.

use crate::source::Source;
use crate::story::{Choice, LoadError, NodeId, Outcome, StoryGraph};
use std::sync::Arc;
use thiserror::Error;

/// Errors from navigation.
#[derive(Debug, Error)]
pub enum NavError {
    #[error("no story loaded")]
    NotLoaded,

    #[error("node '{0}' not found")]
    UnknownNode(NodeId),

    #[error("node '{node}' has no choice {index}")]
    NoSuchChoice { node: NodeId, index: usize },

    #[error("story failed to load: {0}")]
    Load(#[from] LoadError),
}

/// What happens after the scene is shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Choices(Vec<Choice>),
    Ending(Ending),
}

/// The ending event for a terminal node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ending {
    pub outcome: Outcome,
    pub narration: String,
}

/// The result of moving to a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub node: NodeId,
    pub scene: String,
    pub step: Step,
}

impl Transition {
    pub fn ending(&self) -> Option<&Ending> {
        match &self.step {
            Step::Ending(ending) => Some(ending),
            Step::Choices(_) => None,
        }
    }

    pub fn choices(&self) -> &[Choice] {
        match &self.step {
            Step::Choices(choices) => choices,
            Step::Ending(_) => &[],
        }
    }
}

/// Traverses one story graph at a time.
#[derive(Debug, Default)]
pub struct Navigator {
    graph: Option<Arc<StoryGraph>>,
    current: Option<NodeId>,
}

impl Navigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch, parse and install a story, moving to its start node.
    ///
    /// On failure the navigator keeps whatever it had before.
    pub async fn load(&mut self, source: &Source) -> Result<Transition, NavError> {
        let graph = StoryGraph::load(source).await.map_err(|e| {
            tracing::error!(%source, error = %e, "error loading story");
            e
        })?;
        self.install(graph)
    }

    /// Install an already-parsed graph and move to its start node.
    pub fn install(&mut self, graph: impl Into<Arc<StoryGraph>>) -> Result<Transition, NavError> {
        let graph = graph.into();
        let start = graph.start().to_string();
        let transition = Self::transition(&graph, &start)?;

        tracing::debug!(nodes = graph.len(), "story installed");
        self.graph = Some(graph);
        self.current = Some(start);
        Ok(transition)
    }

    /// Drop the story and return to the unloaded state.
    pub fn unload(&mut self) {
        self.graph = None;
        self.current = None;
    }

    /// Move to a node by id.
    pub fn go_to(&mut self, id: &str) -> Result<Transition, NavError> {
        let graph = self.graph.as_ref().ok_or(NavError::NotLoaded)?;
        let transition = Self::transition(graph, id).map_err(|e| {
            tracing::warn!(node = %id, "node not found");
            e
        })?;

        tracing::debug!(from = ?self.current, to = %id, "transition");
        self.current = Some(transition.node.clone());
        Ok(transition)
    }

    /// Follow the choice at `index` (zero-based) on the current node.
    pub fn choose(&mut self, index: usize) -> Result<Transition, NavError> {
        let choice = self.choice_at(index)?.clone();
        self.go_to(&choice.next)
    }

    /// Follow the first choice on the current node whose label matches.
    pub fn choose_label(&mut self, label: &str) -> Result<Transition, NavError> {
        let index = self
            .choices()
            .iter()
            .position(|c| c.label.eq_ignore_ascii_case(label.trim()))
            .unwrap_or(self.choices().len());
        self.choose(index)
    }

    /// Go back to the start node.
    pub fn restart(&mut self) -> Result<Transition, NavError> {
        let start = self.graph.as_ref().ok_or(NavError::NotLoaded)?.start().to_string();
        self.go_to(&start)
    }

    /// The choice at `index` on the current node.
    pub fn choice_at(&self, index: usize) -> Result<&Choice, NavError> {
        let node = self.current_id().ok_or(NavError::NotLoaded)?;
        self.choices().get(index).ok_or_else(|| NavError::NoSuchChoice {
            node: node.to_string(),
            index,
        })
    }

    /// Choices visible on the current node; empty for terminal nodes.
    pub fn choices(&self) -> &[Choice] {
        match self.current_node() {
            Some(node) if !node.is_terminal() => &node.choices,
            _ => &[],
        }
    }

    /// The view of the current node, as if just arrived.
    pub fn current(&self) -> Option<Transition> {
        let graph = self.graph.as_ref()?;
        Self::transition(graph, self.current.as_deref()?).ok()
    }

    /// Id of the current node, if a story is loaded.
    pub fn current_id(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// The current node itself.
    pub fn current_node(&self) -> Option<&crate::story::Node> {
        let graph = self.graph.as_ref()?;
        graph.get(self.current.as_deref()?)
    }

    /// The installed story graph.
    pub fn graph(&self) -> Option<&StoryGraph> {
        self.graph.as_deref()
    }

    /// True once a story has been installed.
    pub fn is_loaded(&self) -> bool {
        self.graph.is_some()
    }

    /// True when sitting on a terminal node.
    pub fn is_finished(&self) -> bool {
        self.current_node().is_some_and(|n| n.is_terminal())
    }

    fn transition(graph: &StoryGraph, id: &str) -> Result<Transition, NavError> {
        let node = graph
            .get(id)
            .ok_or_else(|| NavError::UnknownNode(id.to_string()))?;

        let step = match node.end {
            Some(outcome) => Step::Ending(Ending {
                outcome,
                narration: node.narration.clone().unwrap_or_default(),
            }),
            None => Step::Choices(node.choices.clone()),
        };

        Ok(Transition {
            node: node.id.clone(),
            scene: node.scene.clone(),
            step,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::story::{Node, Theme};

    fn two_step() -> StoryGraph {
        StoryGraph::new(
            Theme::default(),
            vec![
                Node::new("S1", "a.html").with_choice(Choice::new("Go", "S2")),
                Node::new("S2", "b.html").ending(Outcome::Success, "Done"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_unloaded_navigation_fails() {
        let mut nav = Navigator::new();
        assert!(matches!(nav.go_to("S1"), Err(NavError::NotLoaded)));
        assert!(matches!(nav.choose(0), Err(NavError::NotLoaded)));
        assert!(nav.current_id().is_none());
    }

    #[test]
    fn test_install_moves_to_start() {
        let mut nav = Navigator::new();
        let t = nav.install(two_step()).unwrap();
        assert_eq!(t.node, "S1");
        assert_eq!(t.scene, "a.html");
        assert_eq!(t.choices(), &[Choice::new("Go", "S2")]);
        assert_eq!(nav.current_id(), Some("S1"));
    }

    #[test]
    fn test_follow_choice_to_ending() {
        let mut nav = Navigator::new();
        nav.install(two_step()).unwrap();

        let t = nav.choose(0).unwrap();
        assert_eq!(t.node, "S2");
        assert_eq!(
            t.ending(),
            Some(&Ending {
                outcome: Outcome::Success,
                narration: "Done".to_string()
            })
        );
        assert!(t.choices().is_empty());
        assert!(nav.is_finished());
    }

    #[test]
    fn test_unknown_node_keeps_state() {
        let mut nav = Navigator::new();
        nav.install(two_step()).unwrap();

        let err = nav.go_to("S404").unwrap_err();
        assert!(matches!(err, NavError::UnknownNode(id) if id == "S404"));
        assert_eq!(nav.current_id(), Some("S1"));
    }

    #[test]
    fn test_choice_out_of_range() {
        let mut nav = Navigator::new();
        nav.install(two_step()).unwrap();
        assert!(matches!(
            nav.choose(3),
            Err(NavError::NoSuchChoice { index: 3, .. })
        ));
        assert_eq!(nav.current_id(), Some("S1"));
    }

    #[test]
    fn test_terminal_node_has_no_choices() {
        let mut nav = Navigator::new();
        nav.install(two_step()).unwrap();
        nav.go_to("S2").unwrap();
        assert!(nav.choices().is_empty());
        assert!(matches!(nav.choose(0), Err(NavError::NoSuchChoice { .. })));
    }

    #[test]
    fn test_choose_label_case_insensitive() {
        let mut nav = Navigator::new();
        nav.install(two_step()).unwrap();
        assert_eq!(nav.choose_label(" go ").unwrap().node, "S2");
    }

    #[test]
    fn test_restart_and_unload() {
        let mut nav = Navigator::new();
        nav.install(two_step()).unwrap();
        nav.choose(0).unwrap();

        assert_eq!(nav.restart().unwrap().node, "S1");

        nav.unload();
        assert!(!nav.is_loaded());
        assert!(matches!(nav.restart(), Err(NavError::NotLoaded)));
    }

    #[tokio::test]
    async fn test_failed_load_keeps_previous_story() {
        let mut nav = Navigator::new();
        nav.install(two_step()).unwrap();

        let err = nav
            .load(&Source::parse("/no/such/story.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, NavError::Load(LoadError::Fetch(_))));
        assert_eq!(nav.current_id(), Some("S1"));
    }
}
