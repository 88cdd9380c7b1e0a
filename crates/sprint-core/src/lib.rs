//! Sprint Core - design sprint lifecycle and aggregation engine
//!
//! Drives a recurring design competition:
//! - Moves sprints through their phases (scheduled, active, voting, retro, completed)
//! - Keeps non-terminal sprints from overlapping in time
//! - Derives each participant's task checklist from evidence records
//! - Folds the XP ledger into totals, levels and leaderboards
//! - Composes the challenge hub view from all of the above
//!
//! # Example
//!
//! ```rust,ignore
//! use sprint_core::prelude::*;
//! use sprint_store::MemoryStore;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), SprintError> {
//! let engine = SprintEngine::new(Arc::new(MemoryStore::new()), EngineConfig::new())?;
//!
//! let sprint = engine.lifecycle().create_sprint(NewSprint::default()).await?;
//! engine.lifecycle().activate_sprint(&sprint.id, None).await?;
//!
//! let hub = engine.challenge_hub("user123", HubOptions::default()).await?;
//! println!("level {} ({})", hub.level.level, hub.level.title);
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod hub;
pub mod leaderboard;
pub mod levels;
pub mod lifecycle;
pub mod state_machine;
pub mod tasks;
pub mod telemetry;
pub mod types;
pub mod xp;

pub use clock::{Clock, SystemClock};
pub use config::{
    ConfigError, EngineConfig, LeaderboardConfig, LevelConfig, TaskConfig, TaskXp,
    TelemetryConfig,
};
pub use engine::SprintEngine;
pub use error::{parse_id, OverlapConflict, SprintError, ValidationError};
pub use hub::{ChallengeHub, ChallengeHubComposer, HubCollaborators, HubOptions};
pub use leaderboard::{Leaderboard, LeaderboardEntry, LeaderboardScope, UserTotals};
pub use levels::{LevelProgress, LevelTable, LEVEL_COUNT};
pub use lifecycle::{intervals_overlap, DateValidation, SprintLifecycle};
pub use tasks::{
    TaskAggregator, TaskCompletion, TaskDefinition, TaskEvidence, TaskId, TaskStatus, TaskTable,
    DEFAULT_MAX_TASK_XP,
};
pub use types::{collections, NewSprint, Sprint, SprintStatus, UserDetails, XpEvent, XpSource};
pub use xp::{fold_total, AwardOutcome, XpAward, XpEngine, XpSummary};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the sprint engine
    pub use crate::{
        EngineConfig, HubOptions, LeaderboardScope, NewSprint, Sprint, SprintEngine, SprintError,
        SprintStatus, XpAward, XpSource,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
