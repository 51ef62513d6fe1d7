//! Runtime configuration from the environment and the command line.

use anyhow::{bail, Context};
use bleed_core::CharacterKey;
use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_MAX_SESSIONS: usize = 1024;

/// Settings for `bleed serve`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub characters_dir: PathBuf,
    pub knowledge_dir: PathBuf,
    /// Most chat sessions kept at once; the least recently used goes first.
    pub max_sessions: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            characters_dir: PathBuf::from("./characters"),
            knowledge_dir: PathBuf::from("./knowledge"),
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }
}

impl ServerConfig {
    /// Read `PORT`, `BLEED_CHARACTERS_DIR`, `BLEED_KNOWLEDGE_DIR` and
    /// `BLEED_MAX_SESSIONS`, then apply `--port`.
    pub fn from_env_and_args(args: &[String]) -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Ok(port) = std::env::var("PORT") {
            config.port = parse_port(&port)?;
        }
        if let Ok(dir) = std::env::var("BLEED_CHARACTERS_DIR") {
            config.characters_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("BLEED_KNOWLEDGE_DIR") {
            config.knowledge_dir = PathBuf::from(dir);
        }
        if let Ok(max) = std::env::var("BLEED_MAX_SESSIONS") {
            config.max_sessions = match max.trim().parse() {
                Ok(0) => bail!("BLEED_MAX_SESSIONS must be at least 1"),
                Ok(n) => n,
                Err(_) => bail!("invalid BLEED_MAX_SESSIONS '{max}'"),
            };
        }

        let mut i = 0;
        while i < args.len() {
            if args[i] == "--port" {
                let value = args.get(i + 1).context("--port needs a value")?;
                config.port = parse_port(value)?;
                i += 1;
            }
            i += 1;
        }

        Ok(config)
    }
}

fn parse_port(value: &str) -> anyhow::Result<u16> {
    value
        .trim()
        .parse()
        .with_context(|| format!("invalid port '{value}'"))
}

/// Settings for `bleed --headless`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadlessConfig {
    pub character: CharacterKey,
    pub name: Option<String>,
    /// Directory or URL holding `stories/`, `knowledge/` and `characters/`.
    pub assets: String,
    /// Remote `/api/chat` server; talk to the completion API directly when absent.
    pub server: Option<String>,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            character: CharacterKey::default(),
            name: None,
            assets: ".".to_string(),
            server: None,
        }
    }
}

impl HeadlessConfig {
    /// Parse `--character`, `--name`, `--assets` and `--server`.
    /// `BLEED_ASSETS` supplies the asset base when `--assets` is absent.
    pub fn from_env_and_args(args: &[String]) -> anyhow::Result<Self> {
        let mut config = Self::default();
        if let Ok(assets) = std::env::var("BLEED_ASSETS") {
            config.assets = assets;
        }

        let mut i = 0;
        while i < args.len() {
            let flag = args[i].as_str();
            if matches!(flag, "--character" | "--name" | "--assets" | "--server") {
                let Some(value) = args.get(i + 1) else {
                    bail!("{flag} needs a value");
                };
                match flag {
                    "--character" => {
                        config.character = value.parse().with_context(|| format!("bad --character '{value}'"))?
                    }
                    "--name" => config.name = Some(value.clone()),
                    "--assets" => config.assets = value.clone(),
                    _ => config.server = Some(value.clone()),
                }
                i += 1;
            }
            i += 1;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_headless_flags() {
        let config = HeadlessConfig::from_env_and_args(&args(&[
            "bleed",
            "--headless",
            "--character",
            "stanley",
            "--name",
            "neo",
            "--server",
            "http://localhost:3001",
        ]))
        .unwrap();
        assert_eq!(config.character.as_str(), "stanley");
        assert_eq!(config.name.as_deref(), Some("neo"));
        assert_eq!(config.server.as_deref(), Some("http://localhost:3001"));
    }

    #[test]
    fn test_headless_rejects_bad_key() {
        assert!(HeadlessConfig::from_env_and_args(&args(&["--character", "../etc"])).is_err());
        assert!(HeadlessConfig::from_env_and_args(&args(&["--name"])).is_err());
    }

    #[test]
    fn test_port_flag() {
        let config = ServerConfig::from_env_and_args(&args(&["bleed", "serve", "--port", "8080"])).unwrap();
        assert_eq!(config.port, 8080);
        assert!(ServerConfig::from_env_and_args(&args(&["--port", "http"])).is_err());
    }
}
