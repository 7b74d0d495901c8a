use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chatgpt::config::ChatGPTEngine;

use crate::error::ConfigError;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// An OpenAI API key. Kept in memory only and never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Returns `None` for blank input.
    pub fn new(key: &str) -> Option<Self> {
        let key = key.trim();
        if key.is_empty() {
            None
        } else {
            Some(Self(key.to_string()))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum Engine {
    Gpt35Turbo,
    Gpt4,
    Gpt4_32k,
}

impl Engine {
    pub fn to_chatgpt(self) -> ChatGPTEngine {
        match self {
            Engine::Gpt35Turbo => ChatGPTEngine::Gpt35Turbo,
            Engine::Gpt4 => ChatGPTEngine::Gpt4,
            Engine::Gpt4_32k => ChatGPTEngine::Gpt4_32k,
        }
    }
}

impl FromStr for Engine {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "gpt-3.5-turbo" => Ok(Engine::Gpt35Turbo),
            "gpt-4" => Ok(Engine::Gpt4),
            "gpt-4-32k" => Ok(Engine::Gpt4_32k),
            other => Err(ConfigError::UnknownEngine(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub engine: Engine,
    pub timeout: Duration,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            engine: Engine::Gpt35Turbo,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Used for chats that haven't sent their own key with /key.
    pub default_api_key: Option<ApiKey>,
    pub model: ModelConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let default_api_key = lookup("CHATGPT_API_KEY").and_then(|key| ApiKey::new(&key));

        let engine = match lookup("CHATGPT_ENGINE") {
            Some(engine) => engine.parse()?,
            None => Engine::Gpt35Turbo,
        };

        let timeout = match lookup("CHATGPT_TIMEOUT_SECS") {
            Some(value) => {
                let secs = value.trim().parse::<u64>().unwrap_or(0);
                if secs == 0 {
                    return Err(ConfigError::InvalidTimeout {
                        name: "CHATGPT_TIMEOUT_SECS",
                        value,
                    });
                }
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        Ok(Self {
            default_api_key,
            model: ModelConfig { engine, timeout },
        })
    }
}
