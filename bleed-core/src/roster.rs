//! Built-in character roster.
//!
//! Cosmetic and flavor data for each playable character. This is data,
//! not code paths: a roster can also be read from JSON.

use crate::character::CharacterKey;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Labels shown on a character's login form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialLabels {
    pub gamertag: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Palette {
    pub primary: String,
    pub secondary: String,
    pub accent: String,
    pub bg: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterProfile {
    pub name: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    pub credentials: CredentialLabels,
    /// First bot line after switching to this character.
    pub intro: String,
    pub palette: Palette,
    #[serde(default)]
    pub responses: Vec<String>,
    #[serde(default)]
    pub tips: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    #[serde(default)]
    pub general_tips: Vec<String>,
    pub characters: BTreeMap<CharacterKey, CharacterProfile>,
}

impl Roster {
    /// The built-in roster: maya, eli and stanley.
    pub fn builtin() -> &'static Roster {
        &BUILTIN
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn profile(&self, key: &CharacterKey) -> Option<&CharacterProfile> {
        self.characters.get(key)
    }

    pub fn contains(&self, key: &CharacterKey) -> bool {
        self.characters.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &CharacterKey> {
        self.characters.keys()
    }

    /// A random safety tip from the general deck plus the character's own.
    pub fn tip(&self, key: &CharacterKey) -> Option<&str> {
        let mut deck: Vec<&str> = self.general_tips.iter().map(String::as_str).collect();
        if let Some(profile) = self.profile(key) {
            deck.extend(profile.tips.iter().map(String::as_str));
        }
        deck.choose(&mut rand::thread_rng()).copied()
    }

    /// A random canned greeting line for the character.
    pub fn response(&self, key: &CharacterKey) -> Option<&str> {
        self.profile(key)?
            .responses
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn key(raw: &str) -> CharacterKey {
    CharacterKey::new(raw).unwrap_or_default()
}

lazy_static::lazy_static! {
    static ref BUILTIN: Roster = Roster {
        general_tips: strings(&[
            "I’m your safety companion. Ask me about reporting, blocking, or verifying profiles.",
            "Never move to private payments or share verification codes.",
            "If something feels rushed, it’s usually a red flag.",
        ]),
        characters: BTreeMap::from([
            (key("maya"), CharacterProfile {
                name: "Maya".into(),
                display_name: "Gaming Interface".into(),
                credentials: CredentialLabels { gamertag: "Gamertag".into(), password: "Password".into() },
                intro: "Dating app mode ready. Ask about verification & meeting safely.".into(),
                palette: Palette {
                    primary: "#FF0080".into(),
                    secondary: "#7928CA".into(),
                    accent: "#00FFFF".into(),
                    bg: "rgba(25, 0, 25, 0.9)".into(),
                },
                responses: strings(&[
                    "Ready for the next mission! 🎮",
                    "Let's level up together!",
                    "System status: All green!",
                    "What's our objective?",
                ]),
                tips: strings(&[
                    "On FriendBleed-like dating apps: verify with an in-app video call before meeting.",
                    "Refuse to send private photos; scammers stockpile them for coercion.",
                    "Meet only in public places. Tell a friend your plan.",
                ]),
            }),
            (key("eli"), CharacterProfile {
                name: "Eli".into(),
                display_name: "Advanced Terminal".into(),
                credentials: CredentialLabels { gamertag: "Access ID".into(), password: "One-Time Key".into() },
                intro: "Console mode ready. Ask about trades, lobbies, and account safety.".into(),
                palette: Palette {
                    primary: "#00FFFF".into(),
                    secondary: "#0A1A2A".into(),
                    accent: "#FFFFFF".into(),
                    bg: "rgba(5, 20, 35, 0.9)".into(),
                },
                responses: strings(&[
                    "ACCESSING DATASTREAM...",
                    "NEURAL LINK ESTABLISHED",
                    "QUANTUM ENCRYPTION ACTIVE",
                    "READY FOR DATA ANALYSIS",
                ]),
                tips: strings(&[
                    "Only trade devices at police exchange zones. Don’t meet at homes.",
                    "Keep DMs in-platform; avoid sending personal contacts or addresses.",
                    "Use 2FA on your gaming accounts.",
                ]),
            }),
            (key("stanley"), CharacterProfile {
                name: "Stanley".into(),
                display_name: "Corporate Access".into(),
                credentials: CredentialLabels { gamertag: "Employee ID".into(), password: "Access Key".into() },
                intro: "CRT mode ready. Ask me about romance fraud safety.".into(),
                palette: Palette {
                    primary: "#4A90A4".into(),
                    secondary: "#2C3E50".into(),
                    accent: "#ECF0F1".into(),
                    bg: "rgba(44, 62, 80, 0.9)".into(),
                },
                responses: strings(&[
                    "Corporate protocols engaged.",
                    "Security clearance verified.",
                    "Standing by for instructions.",
                    "All systems operational.",
                ]),
                tips: strings(&[
                    "Romance scams often mirror your posts. Verify identities out-of-band before trusting.",
                    "Never send money or gift cards; no legit friend will ask.",
                    "Use platform reporting. It helps others, too.",
                ]),
            }),
        ]),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_has_three_characters() {
        let roster = Roster::builtin();
        let keys: Vec<_> = roster.keys().map(CharacterKey::as_str).collect();
        assert_eq!(keys, vec!["eli", "maya", "stanley"]);
    }

    #[test]
    fn test_profile_labels() {
        let eli = Roster::builtin().profile(&key("eli")).unwrap();
        assert_eq!(eli.credentials.gamertag, "Access ID");
        assert_eq!(eli.credentials.password, "One-Time Key");
    }

    #[test]
    fn test_tip_draws_from_general_and_character_decks() {
        let roster = Roster::builtin();
        let stanley = key("stanley");
        let profile = roster.profile(&stanley).unwrap();
        for _ in 0..20 {
            let tip = roster.tip(&stanley).unwrap();
            assert!(
                roster.general_tips.iter().any(|t| t == tip) || profile.tips.iter().any(|t| t == tip),
                "unexpected tip {tip}"
            );
        }
    }

    #[test]
    fn test_unknown_character_still_gets_general_tip() {
        let roster = Roster::builtin();
        let ghost = key("ghost");
        assert!(roster.profile(&ghost).is_none());
        assert!(roster.tip(&ghost).is_some());
        assert!(roster.response(&ghost).is_none());
    }

    #[test]
    fn test_roster_from_json() {
        let roster = Roster::from_json(
            r##"{
                "characters": {
                    "nova": {
                        "name": "Nova",
                        "displayName": "Signal",
                        "credentials": { "gamertag": "Handle", "password": "Pin" },
                        "intro": "Signal mode ready.",
                        "palette": { "primary": "#fff", "secondary": "#000", "accent": "#f00", "bg": "black" }
                    }
                }
            }"##,
        )
        .unwrap();
        assert!(roster.contains(&key("nova")));
        assert!(roster.general_tips.is_empty());
    }
}
