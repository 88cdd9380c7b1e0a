//! Hub collaborators
//!
//! Badges, skills, awards and retrospectives are owned by other parts of the
//! product. The composer reads them through these traits; [`StoreCollaborators`]
//! reads them straight from the record store.

use crate::error::SprintError;
use crate::types::collections;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sprint_store::{Filter, Record, RecordId, RecordStore, Sort};
use std::fmt;
use std::sync::Arc;

/// Badge earned by a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Badge {
    /// Record id
    pub id: RecordId,
    /// Owner
    pub user_id: RecordId,
    /// Badge kind
    #[serde(default)]
    pub badge_id: Option<String>,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// When it was earned
    #[serde(default)]
    pub earned_at: Option<DateTime<Utc>>,
}

/// Progress in one design skill
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillProgress {
    /// Record id
    pub id: RecordId,
    /// Owner
    pub user_id: RecordId,
    /// Skill name
    pub skill: String,
    /// Skill level
    #[serde(default)]
    pub level: u32,
    /// Skill XP
    #[serde(default)]
    pub xp: i64,
}

/// Award granted at the end of a sprint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SprintAward {
    /// Record id
    pub id: RecordId,
    /// Sprint
    pub sprint_id: RecordId,
    /// Recipient
    pub user_id: RecordId,
    /// Award kind (`winner`, `most_helpful`, ...)
    pub award_type: String,
    /// Display title
    #[serde(default)]
    pub title: Option<String>,
}

/// Retrospective of a finished sprint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetroSummary {
    /// Record id
    pub id: RecordId,
    /// Sprint
    pub sprint_id: RecordId,
    /// Summary text
    #[serde(default)]
    pub summary: Option<String>,
    /// Highlighted moments
    #[serde(default)]
    pub highlights: Vec<String>,
}

/// Source of earned badges
#[async_trait]
pub trait BadgeSource: Send + Sync {
    /// Badges of a user
    async fn badges(&self, user_id: &RecordId) -> Result<Vec<Badge>, SprintError>;
}

/// Source of skill progress
#[async_trait]
pub trait SkillSource: Send + Sync {
    /// Skill progress of a user
    async fn skills(&self, user_id: &RecordId) -> Result<Vec<SkillProgress>, SprintError>;
}

/// Source of sprint awards
#[async_trait]
pub trait AwardSource: Send + Sync {
    /// Awards granted in a sprint
    async fn sprint_awards(&self, sprint_id: &RecordId) -> Result<Vec<SprintAward>, SprintError>;
}

/// Source of retrospectives
#[async_trait]
pub trait RetrospectiveSource: Send + Sync {
    /// Retrospective of a sprint, if written
    async fn retrospective(&self, sprint_id: &RecordId) -> Result<Option<RetroSummary>, SprintError>;
}

/// All collaborators backed by one record store
#[derive(Clone)]
pub struct StoreCollaborators {
    store: Arc<dyn RecordStore>,
}

impl StoreCollaborators {
    /// Create collaborators over a store
    #[inline]
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    async fn list<T: serde::de::DeserializeOwned>(
        &self,
        collection: &str,
        filter: &Filter,
        sort: &Sort,
    ) -> Result<Vec<T>, SprintError> {
        self.store
            .list_all(collection, filter, sort)
            .await?
            .iter()
            .map(|r: &Record| r.decode().map_err(SprintError::from))
            .collect()
    }
}

#[async_trait]
impl BadgeSource for StoreCollaborators {
    async fn badges(&self, user_id: &RecordId) -> Result<Vec<Badge>, SprintError> {
        self.list(
            collections::BADGES,
            &Filter::eq("user_id", user_id),
            &Sort::desc("earned_at").then_desc("created"),
        )
        .await
    }
}

#[async_trait]
impl SkillSource for StoreCollaborators {
    async fn skills(&self, user_id: &RecordId) -> Result<Vec<SkillProgress>, SprintError> {
        self.list(
            collections::SKILLS,
            &Filter::eq("user_id", user_id),
            &Sort::asc("skill"),
        )
        .await
    }
}

#[async_trait]
impl AwardSource for StoreCollaborators {
    async fn sprint_awards(&self, sprint_id: &RecordId) -> Result<Vec<SprintAward>, SprintError> {
        self.list(
            collections::AWARDS,
            &Filter::eq("sprint_id", sprint_id),
            &Sort::asc("created"),
        )
        .await
    }
}

#[async_trait]
impl RetrospectiveSource for StoreCollaborators {
    async fn retrospective(&self, sprint_id: &RecordId) -> Result<Option<RetroSummary>, SprintError> {
        Ok(self
            .store
            .find_first(
                collections::RETROSPECTIVES,
                &Filter::eq("sprint_id", sprint_id),
                &Sort::desc("created"),
            )
            .await?
            .map(|r| r.decode())
            .transpose()?)
    }
}

/// The collaborators a composer reads from
#[derive(Clone)]
pub struct HubCollaborators {
    /// Badges
    pub badges: Arc<dyn BadgeSource>,
    /// Skills
    pub skills: Arc<dyn SkillSource>,
    /// Awards
    pub awards: Arc<dyn AwardSource>,
    /// Retrospectives
    pub retrospectives: Arc<dyn RetrospectiveSource>,
}

impl HubCollaborators {
    /// Every collaborator read from the store
    #[must_use]
    pub fn from_store(store: Arc<dyn RecordStore>) -> Self {
        let collaborators = Arc::new(StoreCollaborators::new(store));
        Self {
            badges: collaborators.clone(),
            skills: collaborators.clone(),
            awards: collaborators.clone(),
            retrospectives: collaborators,
        }
    }

    /// With badge source
    #[inline]
    #[must_use]
    pub fn with_badges(mut self, badges: Arc<dyn BadgeSource>) -> Self {
        self.badges = badges;
        self
    }

    /// With skill source
    #[inline]
    #[must_use]
    pub fn with_skills(mut self, skills: Arc<dyn SkillSource>) -> Self {
        self.skills = skills;
        self
    }

    /// With award source
    #[inline]
    #[must_use]
    pub fn with_awards(mut self, awards: Arc<dyn AwardSource>) -> Self {
        self.awards = awards;
        self
    }

    /// With retrospective source
    #[inline]
    #[must_use]
    pub fn with_retrospectives(mut self, retrospectives: Arc<dyn RetrospectiveSource>) -> Self {
        self.retrospectives = retrospectives;
        self
    }
}

impl fmt::Debug for HubCollaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubCollaborators").finish_non_exhaustive()
    }
}
