//! Engine facade
//!
//! Wires every component over one record store and one configuration.

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::error::SprintError;
use crate::hub::{ChallengeHub, ChallengeHubComposer, HubCollaborators, HubOptions};
use crate::leaderboard::{Leaderboard, LeaderboardEntry, LeaderboardScope};
use crate::levels::LevelTable;
use crate::lifecycle::SprintLifecycle;
use crate::tasks::{TaskAggregator, TaskTable};
use crate::xp::XpEngine;
use sprint_store::RecordStore;
use std::sync::Arc;

/// Sprint lifecycle and aggregation engine
#[derive(Debug)]
pub struct SprintEngine {
    config: EngineConfig,
    store: Arc<dyn RecordStore>,
    lifecycle: Arc<SprintLifecycle>,
    xp: Arc<XpEngine>,
    tasks: Arc<TaskAggregator>,
    leaderboard: Leaderboard,
    hub: ChallengeHubComposer,
}

impl SprintEngine {
    /// Create engine on the wall clock
    ///
    /// # Errors
    /// [`SprintError::Config`] if the configuration is invalid
    pub fn new(store: Arc<dyn RecordStore>, config: EngineConfig) -> Result<Self, SprintError> {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    /// Create engine with a custom clock
    ///
    /// # Errors
    /// [`SprintError::Config`] if the configuration is invalid
    pub fn with_clock(
        store: Arc<dyn RecordStore>,
        config: EngineConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SprintError> {
        config.validate()?;
        let levels = LevelTable::from_config(&config.levels)?;

        let lifecycle = Arc::new(SprintLifecycle::with_clock(Arc::clone(&store), clock));
        let xp = Arc::new(XpEngine::new(
            Arc::clone(&store),
            levels,
            config.leaderboard.page_size,
        ));
        let tasks = Arc::new(TaskAggregator::new(
            Arc::clone(&store),
            Arc::clone(&lifecycle),
            TaskTable::from_config(&config.tasks),
        ));
        let leaderboard = Leaderboard::new(
            Arc::clone(&store),
            config.leaderboard.page_size,
            config.leaderboard.hydrate_batch_size,
        );
        let hub = ChallengeHubComposer::new(
            Arc::clone(&lifecycle),
            Arc::clone(&xp),
            Arc::clone(&tasks),
            HubCollaborators::from_store(Arc::clone(&store)),
        );

        tracing::info!(
            page_size = config.leaderboard.page_size,
            max_task_xp = tasks.table().max_xp(),
            "sprint engine ready"
        );

        Ok(Self {
            config,
            store,
            lifecycle,
            xp,
            tasks,
            leaderboard,
            hub,
        })
    }

    /// Replace the hub collaborators
    #[must_use]
    pub fn with_collaborators(mut self, collaborators: HubCollaborators) -> Self {
        self.hub = ChallengeHubComposer::new(
            Arc::clone(&self.lifecycle),
            Arc::clone(&self.xp),
            Arc::clone(&self.tasks),
            collaborators,
        );
        self
    }

    /// Configuration in force
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Underlying record store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Lifecycle manager
    #[inline]
    #[must_use]
    pub fn lifecycle(&self) -> &SprintLifecycle {
        &self.lifecycle
    }

    /// XP engine
    #[inline]
    #[must_use]
    pub fn xp(&self) -> &XpEngine {
        &self.xp
    }

    /// Task aggregator
    #[inline]
    #[must_use]
    pub fn tasks(&self) -> &TaskAggregator {
        &self.tasks
    }

    /// Hub composer
    #[inline]
    #[must_use]
    pub fn hub(&self) -> &ChallengeHubComposer {
        &self.hub
    }

    /// Leaderboard for a scope; `limit` defaults to the configured one
    ///
    /// # Errors
    /// Store failures while scanning or hydrating
    pub async fn leaderboard(
        &self,
        scope: &LeaderboardScope,
        limit: Option<usize>,
    ) -> Result<Vec<LeaderboardEntry>, SprintError> {
        let limit = limit.unwrap_or(self.config.leaderboard.default_limit);
        self.leaderboard.leaderboard(scope, limit).await
    }

    /// Challenge hub for a user
    ///
    /// # Errors
    /// As [`ChallengeHubComposer::challenge_hub`]
    pub async fn challenge_hub(
        &self,
        user_id: &str,
        options: HubOptions,
    ) -> Result<ChallengeHub, SprintError> {
        self.hub.challenge_hub(user_id, options).await
    }
}
