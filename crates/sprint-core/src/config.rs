//! Engine configuration
//!
//! Loaded from TOML; every section and field has a default, so an empty file
//! is a valid configuration. Task XP rewards live here rather than in code:
//! two reward tables have circulated for the same checklist, and the one in
//! force is whatever the deployment configures.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        /// Config path
        path: PathBuf,
        /// IO error
        #[source]
        source: std::io::Error,
    },

    /// TOML did not parse
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Values parsed but are unusable
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sprint checklist
    pub tasks: TaskConfig,
    /// Level thresholds
    pub levels: LevelConfig,
    /// Leaderboard scanning
    pub leaderboard: LeaderboardConfig,
    /// Logging
    pub telemetry: TelemetryConfig,
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate TOML
    ///
    /// # Errors
    /// [`ConfigError::Parse`] or [`ConfigError::Invalid`]
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    /// [`ConfigError::Io`] when unreadable, otherwise as [`Self::from_toml_str`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Check cross-field rules
    ///
    /// # Errors
    /// [`ConfigError::Invalid`] describing the first broken rule
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.leaderboard.page_size == 0 {
            return Err(ConfigError::Invalid("leaderboard.page_size must be positive".into()));
        }
        if self.leaderboard.hydrate_batch_size == 0 {
            return Err(ConfigError::Invalid(
                "leaderboard.hydrate_batch_size must be positive".into(),
            ));
        }
        if self.tasks.vote_threshold == 0 || self.tasks.feedback_threshold == 0 {
            return Err(ConfigError::Invalid("task thresholds must be positive".into()));
        }
        crate::levels::LevelTable::from_config(&self.levels).map(|_| ())
    }

    /// With leaderboard page size
    #[inline]
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.leaderboard.page_size = page_size;
        self
    }
}

/// Sprint checklist configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    /// Votes needed to complete the vote task
    pub vote_threshold: u32,
    /// Feedback entries needed to complete the feedback task
    pub feedback_threshold: u32,
    /// XP reward per task
    pub xp: TaskXp,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            vote_threshold: 5,
            feedback_threshold: 3,
            xp: TaskXp::default(),
        }
    }
}

/// XP reward per checklist task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskXp {
    /// Read the brief
    pub read_brief: u32,
    /// Submit a design
    pub submit_design: u32,
    /// Vote enough times
    pub vote: u32,
    /// Give enough feedback
    pub feedback: u32,
    /// Write a reflection
    pub reflection: u32,
}

impl Default for TaskXp {
    fn default() -> Self {
        Self {
            read_brief: 10,
            submit_design: 50,
            vote: 20,
            feedback: 30,
            reflection: 15,
        }
    }
}

/// Level table configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelConfig {
    /// Total XP at which each level starts; level 1 first
    pub thresholds: Vec<u64>,
    /// Title per level
    pub titles: Vec<String>,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            thresholds: vec![0, 100, 250, 500, 900, 1500, 2400, 3600],
            titles: [
                "Doodler",
                "Sketcher",
                "Wireframer",
                "Prototyper",
                "Designer",
                "Art Director",
                "Design Lead",
                "Visionary",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

/// Leaderboard configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaderboardConfig {
    /// XP events fetched per page while aggregating
    pub page_size: u32,
    /// Entries returned when the caller does not ask for a limit
    pub default_limit: usize,
    /// User ids per detail fetch
    pub hydrate_batch_size: usize,
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            page_size: 500,
            default_limit: 10,
            hydrate_batch_size: 50,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
    /// Emit JSON lines instead of text
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}
