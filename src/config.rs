//! Game content and scoring configuration, loaded once at startup.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use utoipa::ToSchema;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/party.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "PARTY_SYNC_BACK_CONFIG_PATH";
/// Smallest level3 range leaving at least one admissible target (`2..=range-1`).
const MIN_GUESS_RANGE: u32 = 3;

/// Immutable per-level content and scoring shared by every client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GameConfig {
    pub level1: Level1Config,
    pub level2: Level2Config,
    pub level3: Level3Config,
}

/// Majority vote settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Level1Config {
    /// Awarded to every voter who picked one of the winning options.
    pub points_per_win: i64,
    pub questions: Vec<MajorityQuestion>,
}

/// A prompt and the options players vote on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MajorityQuestion {
    pub prompt: String,
    pub options: Vec<String>,
}

/// Secret attribution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Level2Config {
    pub points_per_win: i64,
}

/// Elimination guess settings: one entry per round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Level3Config {
    pub rounds: Vec<RoundConfig>,
}

/// One elimination round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RoundConfig {
    /// Upper exclusive bound of the initial guess range.
    pub range: u32,
    /// Delta applied to the player who hits the target (negative).
    pub penalty: i64,
    /// Delta applied to every other player when the target is hit.
    pub reward: i64,
}

/// Reasons a configuration file is rejected as a whole.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("level1 question {index} has no options")]
    QuestionWithoutOptions { index: usize },
    #[error("level3 needs at least one round")]
    NoRounds,
    #[error("level3 round {index} has range {range}; the minimum is {MIN_GUESS_RANGE}")]
    RangeTooSmall { index: usize, range: u32 },
}

impl GameConfig {
    /// Load the configuration from disk, falling back to the built-in content.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(config) => {
                    info!(
                        path = %path.display(),
                        questions = config.level1.questions.len(),
                        rounds = config.level3.rounds.len(),
                        "loaded game config"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse and validate a JSON document.
    pub fn from_json(contents: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(index) = self
            .level1
            .questions
            .iter()
            .position(|question| question.options.is_empty())
        {
            return Err(ConfigError::QuestionWithoutOptions { index });
        }
        if self.level3.rounds.is_empty() {
            return Err(ConfigError::NoRounds);
        }
        for (index, round) in self.level3.rounds.iter().enumerate() {
            if round.range < MIN_GUESS_RANGE {
                return Err(ConfigError::RangeTooSmall {
                    index,
                    range: round.range,
                });
            }
        }
        Ok(())
    }

    pub fn question(&self, index: usize) -> Option<&MajorityQuestion> {
        self.level1.questions.get(index)
    }

    pub fn round(&self, index: usize) -> Option<&RoundConfig> {
        self.level3.rounds.get(index)
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            level1: Level1Config {
                points_per_win: 10,
                questions: vec![
                    MajorityQuestion::new(
                        "What is the most essential Christmas food?",
                        ["Roast Chicken", "Gingerbread", "Hot Pot", "Pizza"],
                    ),
                    MajorityQuestion::new(
                        "Which Christmas song is the most annoying?",
                        [
                            "All I Want for Christmas",
                            "Last Christmas",
                            "Jingle Bells",
                            "Baby Shark (Xmas ver)",
                        ],
                    ),
                    MajorityQuestion::new(
                        "Best gift to receive?",
                        ["Cash", "Gadgets", "Handmade Card", "Travel Ticket"],
                    ),
                ],
            },
            level2: Level2Config { points_per_win: 20 },
            level3: Level3Config {
                rounds: vec![
                    RoundConfig {
                        range: 100,
                        penalty: -20,
                        reward: 10,
                    },
                    RoundConfig {
                        range: 100,
                        penalty: -40,
                        reward: 20,
                    },
                    RoundConfig {
                        range: 100,
                        penalty: -80,
                        reward: 40,
                    },
                ],
            },
        }
    }
}

impl MajorityQuestion {
    fn new<const N: usize>(prompt: &str, options: [&str; N]) -> Self {
        Self {
            prompt: prompt.into(),
            options: options.into_iter().map(String::from).collect(),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = GameConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.level1.questions.len(), 3);
        assert_eq!(config.round(2).unwrap().penalty, -80);
    }

    #[test]
    fn parses_a_custom_document() {
        let json = r#"{
            "level1": {"points_per_win": 5, "questions": [{"prompt": "Tea or coffee?", "options": ["Tea", "Coffee"]}]},
            "level2": {"points_per_win": 7},
            "level3": {"rounds": [{"range": 10, "penalty": -1, "reward": 1}]}
        }"#;
        let config = GameConfig::from_json(json).unwrap();
        assert_eq!(config.level1.points_per_win, 5);
        assert_eq!(config.question(0).unwrap().options, ["Tea", "Coffee"]);
        assert_eq!(config.round(0).unwrap().range, 10);
    }

    #[test]
    fn rejects_unplayable_content() {
        let mut config = GameConfig::default();
        config.level1.questions[1].options.clear();
        assert_eq!(
            config.validate(),
            Err(ConfigError::QuestionWithoutOptions { index: 1 })
        );

        let mut config = GameConfig::default();
        config.level3.rounds[0].range = 2;
        assert_eq!(
            config.validate(),
            Err(ConfigError::RangeTooSmall { index: 0, range: 2 })
        );

        let mut config = GameConfig::default();
        config.level3.rounds.clear();
        assert_eq!(config.validate(), Err(ConfigError::NoRounds));
    }
}
