//! Render instructions and the renderer seam.
//!
//! The core never draws. Operations return a list of instructions and a
//! front end decides how to show them.

use crate::navigator::{Step, Transition};
use crate::reply::Mood;
use crate::story::{Choice, Outcome, Theme};
use std::io::{self, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Bot,
    System,
}

impl Speaker {
    /// Transcript prefix for this speaker.
    pub fn label(self) -> &'static str {
        match self {
            Speaker::User => "You",
            Speaker::Bot => "Bot",
            Speaker::System => "System",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderInstruction {
    Theme(Theme),
    Scene {
        node: String,
        scene: String,
        choices: Vec<Choice>,
    },
    Ending {
        outcome: Outcome,
        narration: String,
    },
    Message {
        speaker: Speaker,
        text: String,
    },
    /// Short in-context message for a recovered error.
    Notice(String),
    Cracks {
        level: u8,
        asset: String,
    },
    Mood(Mood),
    /// Replace the visible transcript.
    Transcript(Vec<String>),
}

impl RenderInstruction {
    pub fn bot(text: impl Into<String>) -> Self {
        RenderInstruction::Message {
            speaker: Speaker::Bot,
            text: text.into(),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        RenderInstruction::Message {
            speaker: Speaker::System,
            text: text.into(),
        }
    }

    pub fn notice(text: impl Into<String>) -> Self {
        RenderInstruction::Notice(text.into())
    }
}

/// Instructions for a navigation step: the scene, then an ending if terminal.
pub fn transition_instructions(transition: &Transition) -> Vec<RenderInstruction> {
    let mut out = vec![RenderInstruction::Scene {
        node: transition.node.clone(),
        scene: transition.scene.clone(),
        choices: transition.choices().to_vec(),
    }];
    if let Step::Ending(ending) = &transition.step {
        out.push(RenderInstruction::Ending {
            outcome: ending.outcome,
            narration: ending.narration.clone(),
        });
    }
    out
}

/// A front end that consumes render instructions.
pub trait Renderer {
    fn render(&mut self, instruction: &RenderInstruction) -> io::Result<()>;

    fn render_all(&mut self, instructions: &[RenderInstruction]) -> io::Result<()> {
        for instruction in instructions {
            self.render(instruction)?;
        }
        Ok(())
    }
}

/// Line-oriented text renderer.
///
/// Every line starts with a bracketed tag so scripts can parse the output.
pub struct TextRenderer<W: Write> {
    out: W,
}

impl<W: Write> TextRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Renderer for TextRenderer<W> {
    fn render(&mut self, instruction: &RenderInstruction) -> io::Result<()> {
        match instruction {
            RenderInstruction::Theme(theme) => match &theme.music {
                Some(music) => writeln!(self.out, "[THEME] {} ({music})", theme.class)?,
                None => writeln!(self.out, "[THEME] {}", theme.class)?,
            },
            RenderInstruction::Scene { node, scene, choices } => {
                writeln!(self.out, "[SCENE] {node}: {scene}")?;
                for (i, choice) in choices.iter().enumerate() {
                    writeln!(self.out, "  {}. {}", i + 1, choice.label)?;
                }
            }
            RenderInstruction::Ending { outcome, narration } => {
                let banner = match outcome {
                    Outcome::Success => "✅ Success",
                    Outcome::Failure => "❌ Failure",
                };
                writeln!(self.out, "[ENDING] {banner}")?;
                if !narration.is_empty() {
                    writeln!(self.out, "  {narration}")?;
                }
                writeln!(self.out, "  (#restart to play again)")?;
            }
            RenderInstruction::Message { speaker, text } => {
                writeln!(self.out, "{}: {text}", speaker.label())?;
            }
            RenderInstruction::Notice(text) => writeln!(self.out, "[NOTICE] {text}")?,
            RenderInstruction::Cracks { level, asset } => {
                writeln!(self.out, "[CRACKS] {level} / {} ({asset})", crate::cracks::MAX_CRACKS)?
            }
            RenderInstruction::Mood(mood) => writeln!(self.out, "[MOOD] {mood}")?,
            RenderInstruction::Transcript(lines) => {
                writeln!(self.out, "[TRANSCRIPT] {} lines", lines.len())?;
                for line in lines {
                    writeln!(self.out, "  {line}")?;
                }
            }
        }
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigator::Ending;

    fn render_to_string(instructions: &[RenderInstruction]) -> String {
        let mut renderer = TextRenderer::new(Vec::new());
        renderer.render_all(instructions).unwrap();
        String::from_utf8(renderer.into_inner()).unwrap()
    }

    #[test]
    fn test_scene_lists_choices_one_based() {
        let text = render_to_string(&[RenderInstruction::Scene {
            node: "S1".into(),
            scene: "a.html".into(),
            choices: vec![Choice::new("Go", "S2"), Choice::new("Stay", "S1")],
        }]);
        assert_eq!(text, "[SCENE] S1: a.html\n  1. Go\n  2. Stay\n");
    }

    #[test]
    fn test_terminal_transition_renders_scene_then_ending() {
        let transition = Transition {
            node: "S2".into(),
            scene: "b.html".into(),
            step: Step::Ending(Ending {
                outcome: Outcome::Success,
                narration: "Done".into(),
            }),
        };
        let instructions = transition_instructions(&transition);
        assert_eq!(instructions.len(), 2);
        assert!(matches!(instructions[0], RenderInstruction::Scene { ref choices, .. } if choices.is_empty()));
        assert_eq!(
            instructions[1],
            RenderInstruction::Ending {
                outcome: Outcome::Success,
                narration: "Done".into()
            }
        );
    }

    #[test]
    fn test_messages_use_transcript_labels() {
        let text = render_to_string(&[
            RenderInstruction::Message {
                speaker: Speaker::User,
                text: "hi".into(),
            },
            RenderInstruction::bot("hello"),
            RenderInstruction::notice("Node S9 not found"),
        ]);
        assert_eq!(text, "You: hi\nBot: hello\n[NOTICE] Node S9 not found\n");
    }
}
