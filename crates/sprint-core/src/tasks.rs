//! Sprint task checklist
//!
//! Five fixed tasks per sprint, each completed by evidence scattered over
//! several collections:
//! - `read_brief` / `reflection`: an XP event of that source
//! - `submit_design`: a submitted design
//! - `vote` / `feedback`: enough votes or feedback entries
//!
//! Completion is recomputed from evidence on every call. A failed evidence
//! query counts as "not done" rather than failing the whole checklist.

use crate::config::TaskConfig;
use crate::error::{parse_id, SprintError};
use crate::lifecycle::SprintLifecycle;
use crate::types::{collections, XpSource};
use serde::{Deserialize, Serialize};
use sprint_store::{Filter, RecordId, RecordStore};
use std::fmt;
use std::sync::Arc;

/// XP available from the default task table
pub const DEFAULT_MAX_TASK_XP: u32 = 125;

/// Submission status that counts as "submitted"
const SUBMITTED: &str = "submitted";

/// Checklist task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskId {
    /// Read the sprint brief
    ReadBrief,
    /// Submit a design
    SubmitDesign,
    /// Vote on other designs
    Vote,
    /// Give feedback on other designs
    Feedback,
    /// Write a reflection
    Reflection,
}

impl TaskId {
    /// Checklist order
    pub const ALL: [TaskId; 5] = [
        Self::ReadBrief,
        Self::SubmitDesign,
        Self::Vote,
        Self::Feedback,
        Self::Reflection,
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
        }
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the task table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDefinition {
    /// Task
    pub id: TaskId,
    /// Display name
    pub name: String,
    /// XP reward
    pub xp: u32,
}

/// The checklist with its rewards and thresholds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskTable {
    definitions: Vec<TaskDefinition>,
    vote_threshold: u32,
    feedback_threshold: u32,
}

impl TaskTable {
    /// Build from configuration
    #[must_use]
    pub fn from_config(config: &TaskConfig) -> Self {
        let xp = &config.xp;
        let definitions = TaskId::ALL
            .into_iter()
            .map(|id| {
                let (name, xp) = match id {
                    TaskId::ReadBrief => ("Read the brief".to_string(), xp.read_brief),
                    TaskId::SubmitDesign => ("Submit a design".to_string(), xp.submit_design),
                    TaskId::Vote => (format!("Vote {} times", config.vote_threshold), xp.vote),
                    TaskId::Feedback => (
                        format!("Give feedback {} times", config.feedback_threshold),
                        xp.feedback,
                    ),
                    TaskId::Reflection => ("Write a reflection".to_string(), xp.reflection),
                };
                TaskDefinition { id, name, xp }
            })
            .collect();

        Self {
            definitions,
            vote_threshold: config.vote_threshold,
            feedback_threshold: config.feedback_threshold,
        }
    }

    /// Definitions in checklist order
    #[inline]
    #[must_use]
    pub fn definitions(&self) -> &[TaskDefinition] {
        &self.definitions
    }

    /// Votes needed
    #[inline]
    #[must_use]
    pub fn vote_threshold(&self) -> u32 {
        self.vote_threshold
    }

    /// Feedback entries needed
    #[inline]
    #[must_use]
    pub fn feedback_threshold(&self) -> u32 {
        self.feedback_threshold
    }

    /// XP for completing every task
    #[must_use]
    pub fn max_xp(&self) -> u32 {
        self.definitions.iter().map(|d| d.xp).sum()
    }
}

impl Default for TaskTable {
    fn default() -> Self {
        Self::from_config(&TaskConfig::default())
    }
}

/// Raw evidence behind the checklist
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskEvidence {
    /// A `read_brief` XP event exists
    pub read_brief: bool,
    /// A submitted design exists
    pub submitted_design: bool,
    /// Votes cast in the sprint
    pub votes: u64,
    /// Feedback entries given in the sprint
    pub feedback: u64,
    /// A `reflection` XP event exists
    pub reflection: bool,
}

impl TaskEvidence {
    fn satisfies(&self, task: TaskId, table: &TaskTable) -> bool {
        match task {
            TaskId::ReadBrief => self.read_brief,
            TaskId::SubmitDesign => self.submitted_design,
            TaskId::Vote => self.votes >= u64::from(table.vote_threshold),
            TaskId::Feedback => self.feedback >= u64::from(table.feedback_threshold),
            TaskId::Reflection => self.reflection,
        }
    }
}

/// One checklist row with its outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatus {
    /// Task
    pub id: TaskId,
    /// Display name
    pub name: String,
    /// XP reward
    pub xp: u32,
    /// Whether the evidence satisfies the task
    pub completed: bool,
}

/// Derived checklist for one user in one sprint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCompletion {
    /// Rows in checklist order
    pub tasks: Vec<TaskStatus>,
    /// XP of completed tasks
    pub total_xp: u32,
    /// XP of all tasks
    pub max_xp: u32,
    /// Number of completed tasks
    pub completed_count: usize,
}

impl TaskCompletion {
    /// Checklist with nothing done
    #[must_use]
    pub fn empty(table: &TaskTable) -> Self {
        Self::from_evidence(table, &TaskEvidence::default())
    }

    /// Evaluate evidence against the table
    #[must_use]
    pub fn from_evidence(table: &TaskTable, evidence: &TaskEvidence) -> Self {
        let tasks: Vec<TaskStatus> = table
            .definitions
            .iter()
            .map(|def| TaskStatus {
                id: def.id,
                name: def.name.clone(),
                xp: def.xp,
                completed: evidence.satisfies(def.id, table),
            })
            .collect();

        let total_xp = tasks.iter().filter(|t| t.completed).map(|t| t.xp).sum();
        let completed_count = tasks.iter().filter(|t| t.completed).count();

        Self {
            tasks,
            total_xp,
            max_xp: table.max_xp(),
            completed_count,
        }
    }

    /// Whether every task is done
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed_count == self.tasks.len()
    }

    /// Outcome of one task
    #[must_use]
    pub fn is_done(&self, task: TaskId) -> bool {
        self.tasks.iter().any(|t| t.id == task && t.completed)
    }
}

/// Gathers task evidence from the store
pub struct TaskAggregator {
    store: Arc<dyn RecordStore>,
    lifecycle: Arc<SprintLifecycle>,
    table: TaskTable,
}

impl fmt::Debug for TaskAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskAggregator")
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

impl TaskAggregator {
    /// Create aggregator
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, lifecycle: Arc<SprintLifecycle>, table: TaskTable) -> Self {
        Self {
            store,
            lifecycle,
            table,
        }
    }

    /// Task table in use
    #[inline]
    #[must_use]
    pub fn table(&self) -> &TaskTable {
        &self.table
    }

    /// Checklist for a user in a sprint
    ///
    /// # Errors
    /// [`SprintError::InvalidId`] for malformed ids; evidence failures
    /// never propagate
    #[tracing::instrument(skip(self))]
    pub async fn sprint_task_completion(
        &self,
        sprint_id: &str,
        user_id: &str,
    ) -> Result<TaskCompletion, SprintError> {
        let sprint_id = parse_id("sprint_id", sprint_id)?;
        let user_id = parse_id("user_id", user_id)?;
        Ok(self.completion_for(&sprint_id, &user_id).await)
    }

    /// Checklist for validated ids
    pub async fn completion_for(&self, sprint_id: &RecordId, user_id: &RecordId) -> TaskCompletion {
        let evidence = self.gather(sprint_id, user_id).await;
        TaskCompletion::from_evidence(&self.table, &evidence)
    }

    /// Checklist in the active sprint
    ///
    /// Empty when no sprint is active or the user has not joined it.
    ///
    /// # Errors
    /// Malformed user id, or failure resolving the active sprint
    #[tracing::instrument(skip(self))]
    pub async fn active_task_completion(&self, user_id: &str) -> Result<TaskCompletion, SprintError> {
        let user_id = parse_id("user_id", user_id)?;
        let Some(sprint) = self.lifecycle.active_sprint().await? else {
            return Ok(TaskCompletion::empty(&self.table));
        };
        if !self.lifecycle.is_participant(&sprint.id, &user_id).await? {
            return Ok(TaskCompletion::empty(&self.table));
        }
        Ok(self.completion_for(&sprint.id, &user_id).await)
    }

    async fn gather(&self, sprint_id: &RecordId, user_id: &RecordId) -> TaskEvidence {
        let xp_event = |source: XpSource| {
            Filter::eq("user_id", user_id)
                .and(Filter::eq("sprint_id", sprint_id))
                .and(Filter::eq("source_type", source))
        };
        let submission = Filter::eq("user_id", user_id)
            .and(Filter::eq("sprint_id", sprint_id))
            .and(Filter::eq("status", SUBMITTED));
        let votes = Filter::eq("voter_id", user_id).and(Filter::eq("sprint_id", sprint_id));
        let feedback = Filter::eq("author_id", user_id).and(Filter::eq("sprint_id", sprint_id));
        let read_brief = xp_event(XpSource::ReadBrief);
        let reflection = xp_event(XpSource::Reflection);

        let (read_brief, submitted, votes, feedback, reflection) = tokio::join!(
            self.store.exists(collections::XP_EVENTS, &read_brief),
            self.store.exists(collections::SUBMISSIONS, &submission),
            self.store.count(collections::VOTES, &votes),
            self.store.count(collections::FEEDBACK, &feedback),
            self.store.exists(collections::XP_EVENTS, &reflection),
        );

        TaskEvidence {
            read_brief: degrade(TaskId::ReadBrief, read_brief),
            submitted_design: degrade(TaskId::SubmitDesign, submitted),
            votes: degrade(TaskId::Vote, votes),
            feedback: degrade(TaskId::Feedback, feedback),
            reflection: degrade(TaskId::Reflection, reflection),
        }
    }
}

/// Failed evidence counts as absent
fn degrade<T: Default, E: fmt::Display>(task: TaskId, result: Result<T, E>) -> T {
    result.unwrap_or_else(|e| {
        metrics::counter!("task_evidence_failures_total", "task" => task.as_str()).increment(1);
        tracing::warn!(task = %task, error = %e, "task evidence unavailable");
        T::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn default_table_totals_125() {
        let table = TaskTable::default();
        assert_eq!(table.max_xp(), DEFAULT_MAX_TASK_XP);
        assert_eq!(table.definitions().len(), 5);
    }

    #[test]
    fn empty_completion() {
        let c = TaskCompletion::empty(&TaskTable::default());
        assert_eq!(c.completed_count, 0);
        assert_eq!(c.total_xp, 0);
        assert_eq!(c.max_xp, 125);
        assert!(!c.is_complete());
    }

    #[test]
    fn thresholds_are_inclusive() {
        let table = TaskTable::default();
        let evidence = TaskEvidence {
            votes: 5,
            feedback: 2,
            ..TaskEvidence::default()
        };
        let c = TaskCompletion::from_evidence(&table, &evidence);
        assert!(c.is_done(TaskId::Vote));
        assert!(!c.is_done(TaskId::Feedback));
        assert_eq!(c.total_xp, 20);
    }

    #[test]
    fn configured_rewards_flow_through() {
        let mut config = TaskConfig::default();
        config.xp.submit_design = 100;
        config.vote_threshold = 1;
        let table = TaskTable::from_config(&config);
        assert_eq!(table.max_xp(), 175);
        assert_eq!(table.definitions()[2].name, "Vote 1 times");
    }

    fn evidence() -> impl Strategy<Value = TaskEvidence> {
        (any::<bool>(), any::<bool>(), 0u64..10, 0u64..10, any::<bool>()).prop_map(
            |(read_brief, submitted_design, votes, feedback, reflection)| TaskEvidence {
                read_brief,
                submitted_design,
                votes,
                feedback,
                reflection,
            },
        )
    }

    proptest! {
        #[test]
        fn prop_more_evidence_never_undoes_tasks(base in evidence(), extra_votes in 0u64..5, extra_feedback in 0u64..5) {
            let table = TaskTable::default();
            let more = TaskEvidence {
                read_brief: true,
                votes: base.votes + extra_votes,
                feedback: base.feedback + extra_feedback,
                ..base
            };
            let before = TaskCompletion::from_evidence(&table, &base);
            let after = TaskCompletion::from_evidence(&table, &more);
            prop_assert!(after.completed_count >= before.completed_count);
            prop_assert!(after.total_xp >= before.total_xp);
            for (b, a) in before.tasks.iter().zip(&after.tasks) {
                prop_assert!(!b.completed || a.completed);
            }
        }

        #[test]
        fn prop_completion_is_deterministic(e in evidence()) {
            let table = TaskTable::default();
            prop_assert_eq!(
                TaskCompletion::from_evidence(&table, &e),
                TaskCompletion::from_evidence(&table, &e)
            );
        }
    }
}
