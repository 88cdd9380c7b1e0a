//! Challenge hub composer
//!
//! Builds the one-shot view of the challenge page for a user in three phases:
//! 1. Independent reads, concurrently: active sprint, XP total, badges, skills
//! 2. Reads that depend on the active sprint, concurrently among themselves
//! 3. Pure derivation of the level from the XP total
//!
//! Only the active sprint and the XP total are required. Every other section
//! falls back to empty (or `None`) and is listed in [`ChallengeHub::degraded`].

mod collaborators;

pub use collaborators::{
    AwardSource, Badge, BadgeSource, HubCollaborators, RetroSummary, RetrospectiveSource,
    SkillProgress, SkillSource, SprintAward, StoreCollaborators,
};

use crate::error::{parse_id, SprintError};
use crate::levels::LevelProgress;
use crate::lifecycle::SprintLifecycle;
use crate::tasks::{TaskAggregator, TaskCompletion};
use crate::types::Sprint;
use crate::xp::XpEngine;
use serde::{Deserialize, Serialize};
use sprint_store::RecordId;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Per-request composer options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubOptions {
    /// Fetch the latest retrospective
    pub include_retrospective: bool,
}

impl Default for HubOptions {
    fn default() -> Self {
        Self {
            include_retrospective: true,
        }
    }
}

impl HubOptions {
    /// Skip the retrospective
    #[inline]
    #[must_use]
    pub fn without_retrospective() -> Self {
        Self {
            include_retrospective: false,
        }
    }
}

/// Everything the challenge page shows for one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeHub {
    /// Viewer
    pub user_id: RecordId,
    /// Sprint accepting submissions, if any
    pub active_sprint: Option<Sprint>,
    /// Most recently completed sprint, if resolved
    pub latest_completed_sprint: Option<Sprint>,
    /// Whether the viewer joined the active sprint
    pub is_participant: bool,
    /// Viewer's XP total
    pub total_xp: i64,
    /// Viewer's level standing
    pub level: LevelProgress,
    /// Viewer's badges
    pub badges: Vec<Badge>,
    /// Viewer's skill progress
    pub skills: Vec<SkillProgress>,
    /// Awards of the active sprint, else of the latest completed one
    pub awards: Vec<SprintAward>,
    /// Sprint the awards belong to
    pub awards_sprint_id: Option<RecordId>,
    /// Retrospective of the latest completed sprint
    pub retrospective: Option<RetroSummary>,
    /// Viewer's checklist in the active sprint
    pub tasks: TaskCompletion,
    /// Optional sections that failed and were left empty
    pub degraded: Vec<String>,
}

/// Composes [`ChallengeHub`] views
pub struct ChallengeHubComposer {
    lifecycle: Arc<SprintLifecycle>,
    xp: Arc<XpEngine>,
    tasks: Arc<TaskAggregator>,
    collaborators: HubCollaborators,
}

impl fmt::Debug for ChallengeHubComposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChallengeHubComposer").finish_non_exhaustive()
    }
}

impl ChallengeHubComposer {
    /// Create composer
    #[must_use]
    pub fn new(
        lifecycle: Arc<SprintLifecycle>,
        xp: Arc<XpEngine>,
        tasks: Arc<TaskAggregator>,
        collaborators: HubCollaborators,
    ) -> Self {
        Self {
            lifecycle,
            xp,
            tasks,
            collaborators,
        }
    }

    /// Compose the hub for a user
    ///
    /// # Errors
    /// [`SprintError::InvalidId`] for a malformed user id; failures reading
    /// the active sprint or the XP total
    #[tracing::instrument(skip(self))]
    pub async fn challenge_hub(
        &self,
        user_id: &str,
        options: HubOptions,
    ) -> Result<ChallengeHub, SprintError> {
        let user_id = parse_id("user_id", user_id)?;
        let mut degraded = Vec::new();

        // phase 1
        let (active_sprint, total_xp, badges, skills) = tokio::join!(
            self.lifecycle.active_sprint(),
            self.xp.total_xp(&user_id),
            self.collaborators.badges.badges(&user_id),
            self.collaborators.skills.skills(&user_id),
        );
        let active_sprint = active_sprint?;
        let total_xp = total_xp?;
        let badges = optional("badges", badges, &mut degraded).unwrap_or_default();
        let skills = optional("skills", skills, &mut degraded).unwrap_or_default();

        // phase 2a: the fallback sprint feeds awards and retrospective
        let need_completed = active_sprint.is_none() || options.include_retrospective;
        let (is_participant, latest_completed) = tokio::join!(
            when(active_sprint.as_ref(), |sprint| {
                self.lifecycle.is_participant(&sprint.id, &user_id)
            }),
            async {
                if need_completed {
                    self.lifecycle.latest_completed_sprint().await
                } else {
                    Ok(None)
                }
            },
        );
        let is_participant = optional("participation", is_participant, &mut degraded)
            .flatten()
            .unwrap_or(false);
        let latest_completed = optional("latest_completed", latest_completed, &mut degraded).flatten();

        // phase 2b
        let awards_sprint = active_sprint.as_ref().or(latest_completed.as_ref());
        let retro_sprint = latest_completed
            .as_ref()
            .filter(|_| options.include_retrospective);
        let task_sprint = active_sprint.as_ref().filter(|_| is_participant);

        let (awards, retrospective, tasks) = tokio::join!(
            when(awards_sprint, |sprint| {
                self.collaborators.awards.sprint_awards(&sprint.id)
            }),
            when(retro_sprint, |sprint| {
                self.collaborators.retrospectives.retrospective(&sprint.id)
            }),
            async {
                match task_sprint {
                    Some(sprint) => Some(self.tasks.completion_for(&sprint.id, &user_id).await),
                    None => None,
                }
            },
        );
        let awards = optional("awards", awards, &mut degraded)
            .flatten()
            .unwrap_or_default();
        let retrospective = optional("retrospective", retrospective, &mut degraded)
            .flatten()
            .flatten();
        let tasks = tasks.unwrap_or_else(|| TaskCompletion::empty(self.tasks.table()));

        let awards_sprint_id = awards_sprint.map(|s| s.id.clone());

        // phase 3
        let level = self.xp.levels().progress(total_xp);

        Ok(ChallengeHub {
            user_id,
            active_sprint,
            latest_completed_sprint: latest_completed,
            is_participant,
            total_xp,
            level,
            badges,
            skills,
            awards,
            awards_sprint_id,
            retrospective,
            tasks,
            degraded,
        })
    }
}

/// Run `fetch` only when there is a sprint to fetch for
async fn when<'a, T, F, Fut>(sprint: Option<&'a Sprint>, fetch: F) -> Result<Option<T>, SprintError>
where
    F: FnOnce(&'a Sprint) -> Fut,
    Fut: Future<Output = Result<T, SprintError>>,
{
    match sprint {
        Some(sprint) => fetch(sprint).await.map(Some),
        None => Ok(None),
    }
}

/// Keep an optional section's value, or record it as degraded
fn optional<T>(
    section: &'static str,
    result: Result<T, SprintError>,
    degraded: &mut Vec<String>,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            metrics::counter!("hub_degraded_sections_total", "section" => section).increment(1);
            tracing::warn!(section, error = %e, "hub section unavailable");
            degraded.push(section.to_string());
            None
        }
    }
}
