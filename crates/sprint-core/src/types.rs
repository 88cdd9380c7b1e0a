//! Core types for the sprint engine
//!
//! Defines the persisted entities:
//! - Sprints and their phase status
//! - XP events and their sources
//! - User display details
//!
//! plus the collection names they live in.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sprint_store::RecordId;
use std::fmt;
use std::str::FromStr;

/// Collection names used by the engine
pub mod collections {
    /// Sprints
    pub const SPRINTS: &str = "sprints";
    /// XP events (append-only)
    pub const XP_EVENTS: &str = "xp_events";
    /// Design submissions
    pub const SUBMISSIONS: &str = "submissions";
    /// Votes on submissions
    pub const VOTES: &str = "votes";
    /// Feedback on submissions
    pub const FEEDBACK: &str = "feedback";
    /// Sprint participants
    pub const PARTICIPANTS: &str = "sprint_participants";
    /// Users (display details)
    pub const USERS: &str = "users";
    /// Awards granted at the end of a sprint
    pub const AWARDS: &str = "sprint_awards";
    /// Retrospective summaries
    pub const RETROSPECTIVES: &str = "retrospectives";
    /// Earned badges
    pub const BADGES: &str = "user_badges";
    /// Skill progress
    pub const SKILLS: &str = "skill_progress";
}

/// Sprint phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SprintStatus {
    /// Created, not started
    Scheduled,
    /// Accepting submissions
    Active,
    /// Submissions closed, voting open
    Voting,
    /// Retrospective phase
    Retro,
    /// Finished (terminal)
    Completed,
    /// Abandoned (terminal)
    Cancelled,
}

impl SprintStatus {
    /// Every status, in lifecycle order
    pub const ALL: [SprintStatus; 6] = [
        Self::Scheduled,
        Self::Active,
        Self::Voting,
        Self::Retro,
        Self::Completed,
        Self::Cancelled,
    ];

    /// Statuses whose date ranges must not overlap
    pub const NON_TERMINAL: [SprintStatus; 4] =
        [Self::Active, Self::Scheduled, Self::Voting, Self::Retro];

    /// Wire name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Active => "active",
            Self::Voting => "voting",
            Self::Retro => "retro",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether no further transition is possible
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl fmt::Display for SprintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SprintStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown sprint status: {s}"))
    }
}

impl From<SprintStatus> for Value {
    fn from(status: SprintStatus) -> Self {
        Value::String(status.as_str().to_string())
    }
}

/// A sprint as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sprint {
    /// Record id
    pub id: RecordId,
    /// Unique, monotonic sprint number
    pub sprint_number: u32,
    /// Design challenge this sprint runs
    #[serde(default)]
    pub challenge_id: Option<RecordId>,
    /// Current phase
    pub status: SprintStatus,
    /// Submission phase start
    #[serde(default)]
    pub start_at: Option<DateTime<Utc>>,
    /// Submission phase end
    #[serde(default)]
    pub end_at: Option<DateTime<Utc>>,
    /// Voting phase end
    #[serde(default)]
    pub voting_end_at: Option<DateTime<Utc>>,
    /// Day the retrospective closed
    #[serde(default)]
    pub retro_day: Option<NaiveDate>,
    /// Planned length in days
    #[serde(default)]
    pub duration_days: u32,
    /// Who activated the sprint
    #[serde(default)]
    pub started_by_id: Option<RecordId>,
    /// Who ended or cancelled the sprint
    #[serde(default)]
    pub ended_by_id: Option<RecordId>,
    /// Optimistic concurrency counter; missing or `null` reads as 0
    #[serde(default, deserialize_with = "version_or_zero")]
    pub version: u64,
    /// Store creation time
    pub created: DateTime<Utc>,
}

fn version_or_zero<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    Ok(Option::<u64>::deserialize(deserializer)?.unwrap_or_default())
}

impl Sprint {
    /// `[start_at, end_at]` if both are set
    #[inline]
    #[must_use]
    pub fn date_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        Some((self.start_at?, self.end_at?))
    }

    /// Human-readable date range, e.g. `Jan 01, 2025 to Jan 14, 2025`
    #[must_use]
    pub fn describe_range(&self) -> String {
        let day = |at: Option<DateTime<Utc>>| {
            at.map_or_else(|| "unset".to_string(), |at| at.format("%b %d, %Y").to_string())
        };
        format!("{} to {}", day(self.start_at), day(self.end_at))
    }
}

/// Input for creating a sprint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewSprint {
    /// Challenge to run
    pub challenge_id: Option<RecordId>,
    /// Planned start
    pub start_at: Option<DateTime<Utc>>,
    /// Planned end
    pub end_at: Option<DateTime<Utc>>,
    /// Planned length; derived from the range when omitted
    pub duration_days: Option<u32>,
}

impl NewSprint {
    /// Sprint planned over `[start_at, end_at]`
    #[inline]
    #[must_use]
    pub fn between(start_at: DateTime<Utc>, end_at: DateTime<Utc>) -> Self {
        Self {
            start_at: Some(start_at),
            end_at: Some(end_at),
            ..Self::default()
        }
    }

    /// With challenge
    #[inline]
    #[must_use]
    pub fn with_challenge(mut self, challenge_id: RecordId) -> Self {
        self.challenge_id = Some(challenge_id);
        self
    }

    /// With explicit duration
    #[inline]
    #[must_use]
    pub fn with_duration(mut self, days: u32) -> Self {
        self.duration_days = Some(days);
        self
    }
}

/// What earned an XP event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum XpSource {
    /// Read the sprint brief
    ReadBrief,
    /// Submitted a design
    SubmitDesign,
    /// Cast a vote
    Vote,
    /// Gave feedback
    Feedback,
    /// Wrote a reflection
    Reflection,
    /// Feedback marked helpful by its recipient
    HelpfulFeedback,
}

impl XpSource {
    /// Every source
    pub const ALL: [XpSource; 6] = [
        Self::ReadBrief,
        Self::SubmitDesign,
        Self::Vote,
        Self::Feedback,
        Self::Reflection,
        Self::HelpfulFeedback,
    ];

    /// Wire name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadBrief => "read_brief",
            Self::SubmitDesign => "submit_design",
            Self::Vote => "vote",
            Self::Feedback => "feedback",
            Self::Reflection => "reflection",
            Self::HelpfulFeedback => "helpful_feedback",
        }
    }

    /// Sources that may be credited at most once per user and sprint
    #[inline]
    #[must_use]
    pub fn once_per_sprint(&self) -> bool {
        matches!(self, Self::ReadBrief | Self::Reflection)
    }
}

impl fmt::Display for XpSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<XpSource> for Value {
    fn from(source: XpSource) -> Self {
        Value::String(source.as_str().to_string())
    }
}

/// Immutable XP credit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XpEvent {
    /// Record id
    pub id: RecordId,
    /// Credited user
    pub user_id: RecordId,
    /// Sprint the action belongs to
    pub sprint_id: RecordId,
    /// Action kind
    pub source_type: XpSource,
    /// Points
    pub amount: i64,
    /// Dedup key (submission id, feedback id, ...)
    #[serde(default)]
    pub source_id: Option<String>,
    /// Store creation time
    pub created: DateTime<Utc>,
}

/// Display details of a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDetails {
    /// Record id
    pub id: RecordId,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Avatar file or URL
    #[serde(default)]
    pub avatar: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn status_round_trip_names() {
        for status in SprintStatus::ALL {
            assert_eq!(status.as_str().parse::<SprintStatus>().unwrap(), status);
        }
        assert!("paused".parse::<SprintStatus>().is_err());
    }

    #[test]
    fn terminal_statuses() {
        assert!(SprintStatus::Completed.is_terminal());
        assert!(SprintStatus::Cancelled.is_terminal());
        assert!(SprintStatus::NON_TERMINAL.iter().all(|s| !s.is_terminal()));
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(serde_json::to_value(SprintStatus::Retro).unwrap(), "retro");
        assert_eq!(Value::from(XpSource::HelpfulFeedback), "helpful_feedback");
    }

    #[test]
    fn sprint_describe_range() {
        let sprint = Sprint {
            id: RecordId::parse("s1").unwrap(),
            sprint_number: 1,
            challenge_id: None,
            status: SprintStatus::Scheduled,
            start_at: Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()),
            end_at: Some(Utc.with_ymd_and_hms(2025, 1, 14, 0, 0, 0).unwrap()),
            voting_end_at: None,
            retro_day: None,
            duration_days: 14,
            started_by_id: None,
            ended_by_id: None,
            version: 0,
            created: Utc::now(),
        };
        assert_eq!(sprint.describe_range(), "Jan 01, 2025 to Jan 14, 2025");
        assert!(sprint.date_range().is_some());
    }

    #[test]
    fn once_per_sprint_sources() {
        assert!(XpSource::ReadBrief.once_per_sprint());
        assert!(XpSource::Reflection.once_per_sprint());
        assert!(!XpSource::Vote.once_per_sprint());
    }
}
