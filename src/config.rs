//! Client configuration.

use crate::games::connect_four::DisplayAlphabet;
use crate::session::{ChallengePool, TurnGate};
use crate::store::{DEFAULT_TRANSACTION_RETRIES, StorePath};
use derive_getters::Getters;
use derive_more::{Display, Error};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Settings for an online participant.
#[derive(Debug, Clone, PartialEq, Getters, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Store collection holding session documents.
    #[serde(default = "default_sessions_path")]
    sessions_path: String,

    /// Waiting sessions inspected per matchmaking search.
    #[serde(default = "default_search_limit")]
    search_limit: usize,

    /// Vocabulary file for the answer-to-move rule.
    #[serde(default)]
    challenges_path: Option<PathBuf>,

    /// Whether moves are gated by challenges when a vocabulary is set.
    #[serde(default = "default_turn_gate")]
    turn_gate: bool,

    /// Symbols used when presenting the board.
    #[serde(default)]
    alphabet: DisplayAlphabet,

    /// Attempts per transaction in the in-memory store.
    #[serde(default = "default_transaction_retries")]
    transaction_retries: usize,
}

#[instrument]
fn default_sessions_path() -> String {
    "sessions".to_string()
}

#[instrument]
fn default_search_limit() -> usize {
    10
}

#[instrument]
fn default_turn_gate() -> bool {
    true
}

#[instrument]
fn default_transaction_retries() -> usize {
    DEFAULT_TRANSACTION_RETRIES
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            sessions_path: default_sessions_path(),
            search_limit: default_search_limit(),
            challenges_path: None,
            turn_gate: default_turn_gate(),
            alphabet: DisplayAlphabet::default(),
            transaction_retries: default_transaction_retries(),
        }
    }
}

impl ClientConfig {
    /// Loads configuration from a TOML file and validates it.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;
        let config = Self::from_toml(&content)?;
        info!(sessions_path = %config.sessions_path, "Config loaded successfully");
        Ok(config)
    }

    /// Parses and validates TOML text.
    #[instrument(skip(content))]
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Points the answer-to-move rule at a vocabulary file.
    pub fn with_challenges(mut self, path: impl Into<PathBuf>) -> Self {
        self.challenges_path = Some(path.into());
        self
    }

    /// Turns the answer-to-move rule on or off.
    pub fn with_turn_gate(mut self, enabled: bool) -> Self {
        self.turn_gate = enabled;
        self
    }

    /// Checks values serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sessions_path.trim_matches('/').is_empty() {
            return Err(ConfigError::new("sessions_path must not be empty".to_string()));
        }
        if let Err(e) = StorePath::parse(&self.sessions_path) {
            return Err(ConfigError::new(format!(
                "Invalid sessions_path: {}",
                e.message
            )));
        }
        if self.search_limit == 0 {
            return Err(ConfigError::new("search_limit must be at least 1".to_string()));
        }
        if !self.alphabet.is_distinct() {
            return Err(ConfigError::new(
                "alphabet symbols must all differ".to_string(),
            ));
        }
        Ok(())
    }

    /// Builds the turn gate: `None` when disabled or no vocabulary is set.
    /// The pool is shuffled with `rng`.
    #[instrument(skip(self, rng))]
    pub fn load_turn_gate<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Result<Option<TurnGate>, ConfigError> {
        if !self.turn_gate {
            debug!("Turn gate disabled");
            return Ok(None);
        }
        let Some(path) = &self.challenges_path else {
            debug!("No vocabulary configured");
            return Ok(None);
        };
        let mut pool = ChallengePool::from_file(path)
            .map_err(|e| ConfigError::new(format!("Failed to load challenges: {}", e)))?;
        pool.shuffle(rng);
        Ok(Some(TurnGate::new(pool)))
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_toml() {
        let config = ClientConfig::from_toml("").unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.sessions_path(), "sessions");
        assert_eq!(*config.search_limit(), 10);
        assert!(*config.turn_gate());
        assert_eq!(config.alphabet().empty, '-');
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(ClientConfig::from_toml("search_limit = 0").is_err());
        assert!(ClientConfig::from_toml("sessions_path = \"/\"").is_err());
        assert!(ClientConfig::from_toml("sessions_path = \"a//b\"").is_err());
        assert!(ClientConfig::from_toml("[alphabet]\nplayer_one = 'X'").is_err());
        assert!(ClientConfig::from_toml("sessions_path = \"games/c4/\"").is_ok());
    }

    #[test]
    fn test_gate_disabled_or_unset() {
        let mut rng = rand::thread_rng();
        assert!(ClientConfig::default().load_turn_gate(&mut rng).unwrap().is_none());
        let off = ClientConfig::default()
            .with_challenges("vocabulary.json")
            .with_turn_gate(false);
        assert!(off.load_turn_gate(&mut rng).unwrap().is_none());
    }
}
