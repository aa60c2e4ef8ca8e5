//! Relay configuration — TOML file, `${VAR}` expansion and env overrides
//!
//! Resolution order: built-in defaults, then the TOML file, then the
//! environment (`PORT`, `TELEGRAM_BOT_TOKEN`, `RELAYDESK_OPERATOR_CHAT_ID`).
//! Command-line flags are applied on top by the binary.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{RelayError, Result};
use crate::types::ChatId;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Chat that receives client messages with a "Reply" button
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator_chat_id: Option<i64>,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            api_base: default_api_base(),
            operator_chat_id: None,
        }
    }
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

impl TelegramConfig {
    pub fn operator_chat(&self) -> Option<ChatId> {
        self.operator_chat_id.map(ChatId)
    }
}

/// `~/.config/relaydesk/config.toml` (platform equivalent)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("relaydesk").join("config.toml"))
}

/// Replace `${NAME}` with the value `lookup` returns; unknown names become empty
pub fn expand_env_vars<F>(text: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let re = match regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}") {
        Ok(re) => re,
        Err(_) => return text.to_string(),
    };

    re.replace_all(text, |caps: &regex::Captures<'_>| {
        let name = &caps[1];
        lookup(name).unwrap_or_else(|| {
            warn!("Config references unset variable ${{{}}}", name);
            String::new()
        })
    })
    .into_owned()
}

impl RelayConfig {
    pub fn from_toml_str<F>(text: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let expanded = expand_env_vars(text, lookup);
        toml::from_str(&expanded).map_err(|e| RelayError::Config(e.to_string()))
    }

    /// Load from `path`, or from the default location when it exists.
    /// An explicit path that cannot be read is an error; a missing default
    /// file just means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let lookup = |name: &str| std::env::var(name).ok();

        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match default_config_path() {
                Some(p) if p.exists() => p,
                _ => {
                    debug!("No config file, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        let text = std::fs::read_to_string(&path).map_err(|source| RelayError::Io {
            path: path.display().to_string(),
            source,
        })?;
        debug!("Loaded config from {}", path.display());
        Self::from_toml_str(&text, lookup)
    }

    /// Apply `PORT`, `TELEGRAM_BOT_TOKEN` and `RELAYDESK_OPERATOR_CHAT_ID`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| RelayError::Config(format!("PORT is not a valid port: {}", port)))?;
        }
        if let Some(token) = lookup("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = token.trim().to_string();
        }
        if let Some(chat) = lookup("RELAYDESK_OPERATOR_CHAT_ID") {
            let id = chat.trim().parse().map_err(|_| {
                RelayError::Config(format!("RELAYDESK_OPERATOR_CHAT_ID is not a chat id: {}", chat))
            })?;
            self.telegram.operator_chat_id = Some(id);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.trim().is_empty() {
            return Err(RelayError::Config(
                "telegram.bot_token is required (or set TELEGRAM_BOT_TOKEN)".to_string(),
            ));
        }
        if self.telegram.api_base.trim().is_empty() {
            return Err(RelayError::Config("telegram.api_base cannot be empty".to_string()));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.bind, self.server.port)
    }

    /// Copy safe to print
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.telegram.bot_token.is_empty() {
            copy.telegram.bot_token = "[REDACTED]".to_string();
        }
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.telegram.api_base, DEFAULT_API_BASE);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_with_env_expansion() {
        let text = r#"
            [server]
            port = 8080

            [telegram]
            bot_token = "${BOT_TOKEN}"
            operator_chat_id = -100123
        "#;
        let config = RelayConfig::from_toml_str(text, env(&[("BOT_TOKEN", "123:abc")])).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.telegram.bot_token, "123:abc");
        assert_eq!(config.telegram.operator_chat(), Some(ChatId(-100123)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unset_variable_expands_empty() {
        assert_eq!(expand_env_vars("a${MISSING}b", |_| None), "ab");
        assert_eq!(expand_env_vars("no vars", |_| None), "no vars");
    }

    #[test]
    fn test_invalid_toml() {
        let err = RelayConfig::from_toml_str("[server\nport=1", |_| None).unwrap_err();
        assert!(matches!(err, RelayError::Config(_)));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = RelayConfig::default();
        config
            .apply_env(env(&[
                ("PORT", "4000"),
                ("TELEGRAM_BOT_TOKEN", " tok "),
                ("RELAYDESK_OPERATOR_CHAT_ID", "77"),
            ]))
            .unwrap();
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.telegram.bot_token, "tok");
        assert_eq!(config.telegram.operator_chat_id, Some(77));
        assert_eq!(config.listen_addr(), "0.0.0.0:4000");
    }

    #[test]
    fn test_bad_port_rejected() {
        let mut config = RelayConfig::default();
        assert!(config.apply_env(env(&[("PORT", "eighty")])).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.toml");
        std::fs::write(&path, "[telegram]\nbot_token = \"file-token\"\n").unwrap();

        let config = RelayConfig::load(Some(&path)).unwrap();
        assert_eq!(config.telegram.bot_token, "file-token");
        assert_eq!(config.server.port, DEFAULT_PORT);
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = RelayConfig::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, RelayError::Io { .. }));
    }

    #[test]
    fn test_redacted() {
        let mut config = RelayConfig::default();
        config.telegram.bot_token = "secret".to_string();
        assert_eq!(config.redacted().telegram.bot_token, "[REDACTED]");
        assert_eq!(config.telegram.bot_token, "secret");
    }
}
