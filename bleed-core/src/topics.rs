//! Canned topic responder behind `/api/chatbot`.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown mode '{0}'")]
pub struct UnknownMode(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Story,
    Faq,
    Stats,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Story => "story",
            Mode::Faq => "faq",
            Mode::Stats => "stats",
        }
    }

    /// Reply for `message` in this mode. Keyword checks are case-sensitive.
    pub fn respond(self, message: &str) -> &'static str {
        match self {
            Mode::Story if message.contains("help") => "The system is unstable. Beware of fake profiles.",
            Mode::Story => "The narrative continues...",
            Mode::Faq if message.contains("scam") => "Scammers often ask for money quickly or push you off-platform.",
            Mode::Faq => "Try asking about 'identity fraud' or 'dating app risks'.",
            Mode::Stats => "Over $10B is lost annually to online scams. Stay vigilant.",
        }
    }
}

impl FromStr for Mode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "story" => Ok(Mode::Story),
            "faq" => Ok(Mode::Faq),
            "stats" => Ok(Mode::Stats),
            other => Err(UnknownMode(other.to_string())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
