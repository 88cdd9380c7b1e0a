//! Sprint lifecycle manager
//!
//! Owns every write to the `sprints` collection:
//! - phase transitions (guarded by the state machine)
//! - scheduling, rescheduling and extension (guarded by overlap validation)
//! - participant enrolment
//!
//! Every status write is a conditional update on `status` and `version`, so
//! two racing transitions on one sprint cannot both succeed. Scheduling
//! writes are additionally serialized in-process by a lock around
//! "validate dates, then write". Activation and the move to voting stamp
//! `start_at`/`end_at`, so they take the same lock and re-check overlap when
//! the stamp changes the sprint's range.

use crate::clock::{Clock, SystemClock};
use crate::error::{OverlapConflict, SprintError, ValidationError};
use crate::state_machine;
use crate::types::{collections, NewSprint, Sprint, SprintStatus};
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use sprint_store::{
    encode, time_value, Fields, Filter, ListPage, Record, RecordId, RecordStore, Sort,
};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Duration stored when a sprint is created without dates or explicit length
pub const DEFAULT_DURATION_DAYS: u32 = 7;

/// Conditional-write attempts before a transition gives up
const WRITE_ATTEMPTS: usize = 3;

/// Closed-interval overlap: touching endpoints count
#[inline]
#[must_use]
pub fn intervals_overlap(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start <= b_end && a_end >= b_start
}

/// Outcome of date validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateValidation {
    /// No non-terminal sprint overlaps the range
    Valid,
    /// First overlapping sprint in list order
    Conflict(OverlapConflict),
}

impl DateValidation {
    /// Whether the range is free
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Turn a conflict into [`ValidationError::Overlap`]
    ///
    /// # Errors
    /// The conflict, if any
    pub fn into_result(self) -> Result<(), ValidationError> {
        match self {
            Self::Valid => Ok(()),
            Self::Conflict(conflict) => Err(ValidationError::Overlap(Box::new(conflict))),
        }
    }
}

/// Sprint lifecycle manager
pub struct SprintLifecycle {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    /// Serializes validate-then-write scheduling sequences
    schedule_lock: Mutex<()>,
}

impl std::fmt::Debug for SprintLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SprintLifecycle")
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl SprintLifecycle {
    /// Create lifecycle manager on the wall clock
    #[inline]
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    /// Create lifecycle manager with a custom clock
    #[inline]
    #[must_use]
    pub fn with_clock(store: Arc<dyn RecordStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            schedule_lock: Mutex::new(()),
        }
    }

    /// Clock used for phase stamps
    #[inline]
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    // ----- lookups -------------------------------------------------------

    /// Fetch a sprint
    ///
    /// # Errors
    /// [`SprintError::NotFound`] if absent
    pub async fn get_sprint(&self, sprint_id: &RecordId) -> Result<Sprint, SprintError> {
        self.find_sprint(sprint_id)
            .await?
            .ok_or_else(|| SprintError::not_found("sprint", sprint_id.as_str()))
    }

    /// Fetch a sprint if it exists
    pub async fn find_sprint(&self, sprint_id: &RecordId) -> Result<Option<Sprint>, SprintError> {
        self.store
            .find(collections::SPRINTS, sprint_id)
            .await?
            .map(|r| decode(&r))
            .transpose()
    }

    /// Sprint with the given number
    pub async fn get_sprint_by_number(&self, number: u32) -> Result<Option<Sprint>, SprintError> {
        self.first(&Filter::eq("sprint_number", number), &Sort::none())
            .await
    }

    /// The active sprint, earliest start first if several exist
    pub async fn active_sprint(&self) -> Result<Option<Sprint>, SprintError> {
        self.first(
            &Filter::eq("status", SprintStatus::Active),
            &Sort::asc("start_at").then_asc("created"),
        )
        .await
    }

    /// Newest sprint in a running phase (active, voting or retro)
    pub async fn current_sprint(&self) -> Result<Option<Sprint>, SprintError> {
        self.first(
            &Filter::any_eq(
                "status",
                [SprintStatus::Active, SprintStatus::Voting, SprintStatus::Retro],
            ),
            &Sort::desc("created"),
        )
        .await
    }

    /// Most recently created completed sprint
    pub async fn latest_completed_sprint(&self) -> Result<Option<Sprint>, SprintError> {
        self.first(
            &Filter::eq("status", SprintStatus::Completed),
            &Sort::desc("created"),
        )
        .await
    }

    /// One page of sprints, highest number first
    pub async fn list_sprints(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<ListPage<Sprint>, SprintError> {
        self.store
            .list(
                collections::SPRINTS,
                &Filter::All,
                &Sort::desc("sprint_number"),
                page,
                per_page,
            )
            .await?
            .try_map(|r| decode(&r))
    }

    /// `max(sprint_number) + 1`, or 1 for the first sprint
    pub async fn next_sprint_number(&self) -> Result<u32, SprintError> {
        let last = self
            .first(&Filter::All, &Sort::desc("sprint_number"))
            .await?;
        Ok(last.map_or(1, |s| s.sprint_number + 1))
    }

    async fn first(&self, filter: &Filter, sort: &Sort) -> Result<Option<Sprint>, SprintError> {
        self.store
            .find_first(collections::SPRINTS, filter, sort)
            .await?
            .map(|r| decode(&r))
            .transpose()
    }

    // ----- scheduling ----------------------------------------------------

    /// Check a proposed range against every non-terminal sprint
    ///
    /// `exclude` skips the sprint being rescheduled. Rejects `end <= start`
    /// before touching the store.
    ///
    /// # Errors
    /// [`ValidationError::InvalidRange`], or store failures
    #[tracing::instrument(skip(self))]
    pub async fn validate_sprint_dates(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<&RecordId>,
    ) -> Result<DateValidation, SprintError> {
        if end <= start {
            return Err(ValidationError::InvalidRange { start, end }.into());
        }

        let filter = Filter::any_eq("status", SprintStatus::NON_TERMINAL)
            .and(Filter::is_set("start_at"))
            .and(Filter::is_set("end_at"));
        let records = self
            .store
            .list_all(collections::SPRINTS, &filter, &Sort::none())
            .await?;

        for record in &records {
            let sprint = decode(record)?;
            if exclude == Some(&sprint.id) {
                continue;
            }
            let Some((sprint_start, sprint_end)) = sprint.date_range() else {
                continue;
            };
            if intervals_overlap(sprint_start, sprint_end, start, end) {
                let message = format!(
                    "Dates overlap with Sprint #{} ({}): {}",
                    sprint.sprint_number,
                    sprint.status,
                    sprint.describe_range()
                );
                tracing::debug!(conflict = %sprint.id, "date range rejected");
                return Ok(DateValidation::Conflict(OverlapConflict {
                    sprint_id: sprint.id,
                    sprint_number: sprint.sprint_number,
                    status: sprint.status,
                    start_at: sprint_start,
                    end_at: sprint_end,
                    message,
                }));
            }
        }

        Ok(DateValidation::Valid)
    }

    /// Create a sprint in `scheduled` with the next sprint number
    ///
    /// # Errors
    /// Invalid or overlapping dates, or store failures
    #[tracing::instrument(skip(self))]
    pub async fn create_sprint(&self, new: NewSprint) -> Result<Sprint, SprintError> {
        let _guard = self.schedule_lock.lock().await;

        if let (Some(start), Some(end)) = (new.start_at, new.end_at) {
            self.validate_sprint_dates(start, end, None)
                .await?
                .into_result()?;
        }

        let sprint_number = self.next_sprint_number().await?;
        let duration_days = new.duration_days.unwrap_or_else(|| match (new.start_at, new.end_at) {
            (Some(start), Some(end)) => span_days(start, end),
            _ => DEFAULT_DURATION_DAYS,
        });

        let fields = encode(&json!({
            "sprint_number": sprint_number,
            "challenge_id": new.challenge_id,
            "status": SprintStatus::Scheduled,
            "start_at": new.start_at.as_ref().map(time_value),
            "end_at": new.end_at.as_ref().map(time_value),
            "voting_end_at": null,
            "retro_day": null,
            "duration_days": duration_days,
            "started_by_id": null,
            "ended_by_id": null,
            "version": 0,
        }))?;

        let sprint = decode(&self.store.create(collections::SPRINTS, fields).await?)?;
        tracing::info!(sprint = %sprint.id, number = sprint.sprint_number, "sprint scheduled");
        Ok(sprint)
    }

    /// Move a scheduled sprint to new dates
    ///
    /// # Errors
    /// Sprint not scheduled, invalid or overlapping dates, store failures
    #[tracing::instrument(skip(self))]
    pub async fn reschedule_sprint(
        &self,
        sprint_id: &RecordId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Sprint, SprintError> {
        let _guard = self.schedule_lock.lock().await;

        let sprint = self.get_sprint(sprint_id).await?;
        if sprint.status != SprintStatus::Scheduled {
            return Err(ValidationError::NotReschedulable {
                sprint_id: sprint.id,
                status: sprint.status,
            }
            .into());
        }
        self.validate_sprint_dates(start, end, Some(sprint_id))
            .await?
            .into_result()?;

        let mut patch = Fields::new();
        patch.insert("start_at".into(), time_value(&start));
        patch.insert("end_at".into(), time_value(&end));
        patch.insert("duration_days".into(), json!(span_days(start, end)));
        self.write_guarded(&sprint, patch).await
    }

    /// Push `end_at` and `duration_days` out by `days`
    ///
    /// The extended range is re-validated against other non-terminal sprints.
    ///
    /// # Errors
    /// [`ValidationError::MissingEndDate`], [`ValidationError::NonPositiveExtension`],
    /// [`ValidationError::Overlap`], or store failures
    #[tracing::instrument(skip(self))]
    pub async fn extend_sprint(&self, sprint_id: &RecordId, days: i64) -> Result<Sprint, SprintError> {
        if days <= 0 {
            return Err(ValidationError::NonPositiveExtension { days }.into());
        }
        let extra_days = u32::try_from(days)
            .map_err(|_| ValidationError::NonPositiveExtension { days })?;

        let _guard = self.schedule_lock.lock().await;

        let sprint = self.get_sprint(sprint_id).await?;
        let Some(end_at) = sprint.end_at else {
            return Err(ValidationError::MissingEndDate {
                sprint_id: sprint.id,
            }
            .into());
        };
        let new_end = end_at + Duration::days(days);

        if !sprint.status.is_terminal() {
            let start = sprint.start_at.unwrap_or(end_at);
            self.validate_sprint_dates(start, new_end, Some(sprint_id))
                .await?
                .into_result()?;
        }

        let mut patch = Fields::new();
        patch.insert("end_at".into(), time_value(&new_end));
        patch.insert(
            "duration_days".into(),
            json!(sprint.duration_days.saturating_add(extra_days)),
        );
        let sprint = self.write_guarded(&sprint, patch).await?;
        tracing::info!(sprint = %sprint.id, days, "sprint extended");
        Ok(sprint)
    }

    /// Remove a scheduled or cancelled sprint (admin)
    ///
    /// # Errors
    /// [`ValidationError::NotDeletable`] for any other status
    #[tracing::instrument(skip(self))]
    pub async fn delete_sprint(&self, sprint_id: &RecordId) -> Result<(), SprintError> {
        let sprint = self.get_sprint(sprint_id).await?;
        if !matches!(sprint.status, SprintStatus::Scheduled | SprintStatus::Cancelled) {
            return Err(ValidationError::NotDeletable {
                sprint_id: sprint.id,
                status: sprint.status,
            }
            .into());
        }
        self.store.delete(collections::SPRINTS, sprint_id).await?;
        tracing::info!(sprint = %sprint_id, "sprint deleted");
        Ok(())
    }

    // ----- transitions ---------------------------------------------------

    /// `scheduled -> active`; stamps `start_at`, records `started_by_id`
    ///
    /// # Errors
    /// [`ValidationError::Overlap`] if the stamped range runs into another
    /// non-terminal sprint
    pub async fn activate_sprint(
        &self,
        sprint_id: &RecordId,
        actor: Option<&RecordId>,
    ) -> Result<Sprint, SprintError> {
        self.transition(sprint_id, SprintStatus::Active, actor).await
    }

    /// `active -> voting`; stamps `end_at`, records `ended_by_id`
    ///
    /// # Errors
    /// [`ValidationError::Overlap`] if a late stamp pushes `end_at` into
    /// another non-terminal sprint
    pub async fn transition_to_voting(
        &self,
        sprint_id: &RecordId,
        actor: Option<&RecordId>,
    ) -> Result<Sprint, SprintError> {
        self.transition(sprint_id, SprintStatus::Voting, actor).await
    }

    /// `voting -> retro`; stamps `voting_end_at`
    pub async fn transition_to_retro(
        &self,
        sprint_id: &RecordId,
        actor: Option<&RecordId>,
    ) -> Result<Sprint, SprintError> {
        self.transition(sprint_id, SprintStatus::Retro, actor).await
    }

    /// `retro -> completed`; stamps `retro_day`, records `ended_by_id`
    pub async fn complete_sprint(
        &self,
        sprint_id: &RecordId,
        actor: Option<&RecordId>,
    ) -> Result<Sprint, SprintError> {
        self.transition(sprint_id, SprintStatus::Completed, actor).await
    }

    /// `scheduled | active -> cancelled`; records `ended_by_id`
    pub async fn cancel_sprint(
        &self,
        sprint_id: &RecordId,
        actor: Option<&RecordId>,
    ) -> Result<Sprint, SprintError> {
        self.transition(sprint_id, SprintStatus::Cancelled, actor).await
    }

    /// Advance a running sprint one phase
    ///
    /// # Errors
    /// [`SprintError::InvalidStateTransition`] unless active, voting or retro
    pub async fn end_sprint(
        &self,
        sprint_id: &RecordId,
        actor: Option<&RecordId>,
    ) -> Result<Sprint, SprintError> {
        let sprint = self.get_sprint(sprint_id).await?;
        match state_machine::next_phase(sprint.status) {
            Some(next) => self.transition(sprint_id, next, actor).await,
            None => Err(SprintError::InvalidStateTransition {
                sprint_id: sprint.id,
                actual: sprint.status,
                expected: vec![SprintStatus::Active, SprintStatus::Voting, SprintStatus::Retro],
            }),
        }
    }

    #[tracing::instrument(skip(self), fields(to = %target))]
    async fn transition(
        &self,
        sprint_id: &RecordId,
        target: SprintStatus,
        actor: Option<&RecordId>,
    ) -> Result<Sprint, SprintError> {
        let _guard = match target {
            SprintStatus::Active | SprintStatus::Voting => Some(self.schedule_lock.lock().await),
            _ => None,
        };
        let mut last_conflict = None;

        for _ in 0..WRITE_ATTEMPTS {
            let sprint = self.get_sprint(sprint_id).await?;
            state_machine::validate_transition(sprint_id, sprint.status, target)?;

            let now = self.clock.now();
            if let Some((start, end)) = stamped_range(&sprint, target, now) {
                self.validate_sprint_dates(start, end, Some(sprint_id))
                    .await?
                    .into_result()?;
            }

            let patch = transition_patch(target, now, actor);
            match self.write_guarded(&sprint, patch).await {
                Ok(updated) => {
                    metrics::counter!("sprint_transitions_total", "to" => target.as_str())
                        .increment(1);
                    tracing::info!(
                        sprint = %updated.id,
                        from = %sprint.status,
                        to = %updated.status,
                        "sprint transitioned"
                    );
                    return Ok(updated);
                }
                // lost the race: re-read and re-check the precondition
                Err(SprintError::Store(e)) if e.is_precondition_failed() => {
                    metrics::counter!("sprint_transition_conflicts_total").increment(1);
                    tracing::debug!(sprint = %sprint_id, "concurrent write, retrying");
                    last_conflict = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_conflict.map_or_else(
            || SprintError::not_found("sprint", sprint_id.as_str()),
            SprintError::Store,
        ))
    }

    /// Apply `patch` only if the sprint still has the status and version we read
    async fn write_guarded(&self, read: &Sprint, mut patch: Fields) -> Result<Sprint, SprintError> {
        let version_guard = if read.version == 0 {
            Filter::eq("version", 0).or(Filter::is_null("version"))
        } else {
            Filter::eq("version", read.version)
        };
        let guard = Filter::eq("status", read.status).and(version_guard);
        patch.insert("version".into(), json!(read.version + 1));

        let record = self
            .store
            .update_where(collections::SPRINTS, &read.id, &guard, patch)
            .await?;
        decode(&record)
    }

    // ----- participants --------------------------------------------------

    /// Enrol a user; `Ok(false)` if already enrolled
    ///
    /// # Errors
    /// [`ValidationError::NotJoinable`] unless scheduled or active
    #[tracing::instrument(skip(self))]
    pub async fn join_sprint(
        &self,
        sprint_id: &RecordId,
        user_id: &RecordId,
    ) -> Result<bool, SprintError> {
        let sprint = self.get_sprint(sprint_id).await?;
        if !matches!(sprint.status, SprintStatus::Scheduled | SprintStatus::Active) {
            return Err(ValidationError::NotJoinable {
                sprint_id: sprint.id,
                status: sprint.status,
            }
            .into());
        }
        if self.is_participant(sprint_id, user_id).await? {
            return Ok(false);
        }

        let fields = encode(&json!({ "sprint_id": sprint_id, "user_id": user_id }))?;
        self.store.create(collections::PARTICIPANTS, fields).await?;
        tracing::info!(sprint = %sprint_id, user = %user_id, "participant joined");
        Ok(true)
    }

    /// Whether the user joined the sprint
    pub async fn is_participant(
        &self,
        sprint_id: &RecordId,
        user_id: &RecordId,
    ) -> Result<bool, SprintError> {
        let filter = Filter::eq("sprint_id", sprint_id).and(Filter::eq("user_id", user_id));
        Ok(self.store.exists(collections::PARTICIPANTS, &filter).await?)
    }
}

fn decode(record: &Record) -> Result<Sprint, SprintError> {
    Ok(record.decode()?)
}

/// Range a transition would leave on the sprint, when its stamp changes the range
///
/// Activation moves `start_at` to `now`. The move to voting moves `end_at` to
/// `now`, which only grows the range when voting opens late.
fn stamped_range(
    sprint: &Sprint,
    target: SprintStatus,
    now: DateTime<Utc>,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    match target {
        // a sprint activated past its planned end has no range left to check
        SprintStatus::Active => sprint.end_at.filter(|end| *end > now).map(|end| (now, end)),
        SprintStatus::Voting => {
            let start = sprint.start_at?;
            let grows = sprint.end_at.map_or(true, |end| now > end);
            (grows && now > start).then_some((start, now))
        }
        _ => None,
    }
}

fn transition_patch(target: SprintStatus, now: DateTime<Utc>, actor: Option<&RecordId>) -> Fields {
    let mut patch = Fields::new();
    patch.insert("status".into(), target.into());

    let actor_field = match target {
        SprintStatus::Active => {
            patch.insert("start_at".into(), time_value(&now));
            Some("started_by_id")
        }
        SprintStatus::Voting => {
            patch.insert("end_at".into(), time_value(&now));
            Some("ended_by_id")
        }
        SprintStatus::Retro => {
            patch.insert("voting_end_at".into(), time_value(&now));
            None
        }
        SprintStatus::Completed => {
            patch.insert("retro_day".into(), json!(now.date_naive()));
            Some("ended_by_id")
        }
        SprintStatus::Cancelled => Some("ended_by_id"),
        SprintStatus::Scheduled => None,
    };

    if let (Some(field), Some(actor)) = (actor_field, actor) {
        patch.insert(field.into(), Value::from(actor));
    }
    patch
}

/// Whole days in `[start, end]`, at least one
fn span_days(start: DateTime<Utc>, end: DateTime<Utc>) -> u32 {
    let days = (end - start).num_days().max(1);
    u32::try_from(days).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sprint_store::MemoryStore;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, d, 0, 0, 0).unwrap()
    }

    fn lifecycle() -> (Arc<MemoryStore>, SprintLifecycle) {
        let store = Arc::new(MemoryStore::new());
        let lifecycle = SprintLifecycle::new(store.clone());
        (store, lifecycle)
    }

    #[test]
    fn overlap_is_inclusive() {
        assert!(intervals_overlap(day(1), day(14), day(10), day(20)));
        assert!(intervals_overlap(day(1), day(14), day(14), day(20)));
        assert!(!intervals_overlap(day(1), day(14), day(15), day(28)));
    }

    #[test]
    fn span_days_is_at_least_one() {
        assert_eq!(span_days(day(1), day(15)), 14);
        assert_eq!(span_days(day(1), day(1) + Duration::hours(3)), 1);
    }

    #[tokio::test]
    async fn first_sprint_number_is_one() {
        let (_, lifecycle) = lifecycle();
        assert_eq!(lifecycle.next_sprint_number().await.unwrap(), 1);

        lifecycle.create_sprint(NewSprint::default()).await.unwrap();
        lifecycle.create_sprint(NewSprint::default()).await.unwrap();
        assert_eq!(lifecycle.next_sprint_number().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn create_sprint_defaults() {
        let (_, lifecycle) = lifecycle();
        let sprint = lifecycle
            .create_sprint(NewSprint::between(day(1), day(15)))
            .await
            .unwrap();
        assert_eq!(sprint.status, SprintStatus::Scheduled);
        assert_eq!(sprint.sprint_number, 1);
        assert_eq!(sprint.duration_days, 14);
        assert_eq!(sprint.version, 0);

        let undated = lifecycle.create_sprint(NewSprint::default()).await.unwrap();
        assert_eq!(undated.duration_days, DEFAULT_DURATION_DAYS);
    }

    #[tokio::test]
    async fn invalid_range_rejected_without_store() {
        let (_, lifecycle) = lifecycle();
        let err = lifecycle
            .validate_sprint_dates(day(5), day(5), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SprintError::Validation(ValidationError::InvalidRange { .. })
        ));
    }

    #[tokio::test]
    async fn version_increments_per_write() {
        let (_, lifecycle) = lifecycle();
        let sprint = lifecycle.create_sprint(NewSprint::between(day(1), day(8))).await.unwrap();
        let sprint = lifecycle
            .reschedule_sprint(&sprint.id, day(2), day(9))
            .await
            .unwrap();
        assert_eq!(sprint.version, 1);
        let sprint = lifecycle.extend_sprint(&sprint.id, 2).await.unwrap();
        assert_eq!(sprint.version, 2);
    }

    #[tokio::test]
    async fn legacy_records_without_version_transition() {
        let (store, lifecycle) = lifecycle();
        let rec = store
            .create(
                collections::SPRINTS,
                encode(&json!({ "sprint_number": 1, "status": "scheduled" })).unwrap(),
            )
            .await
            .unwrap();
        let sprint = lifecycle.activate_sprint(&rec.id, None).await.unwrap();
        assert_eq!(sprint.status, SprintStatus::Active);
        assert_eq!(sprint.version, 1);
    }

    #[tokio::test]
    async fn null_version_reads_as_zero() {
        let (store, lifecycle) = lifecycle();
        let rec = store
            .create(
                collections::SPRINTS,
                encode(&json!({ "sprint_number": 1, "status": "scheduled", "version": null }))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(lifecycle.get_sprint(&rec.id).await.unwrap().version, 0);

        let sprint = lifecycle.activate_sprint(&rec.id, None).await.unwrap();
        assert_eq!(sprint.status, SprintStatus::Active);
        assert_eq!(sprint.version, 1);
    }

    #[tokio::test]
    async fn racing_transitions_have_one_winner() {
        let (_, lifecycle) = lifecycle();
        let lifecycle = Arc::new(lifecycle);
        let sprint = lifecycle.create_sprint(NewSprint::default()).await.unwrap();

        let attempts = (0..8).map(|_| {
            let lifecycle = lifecycle.clone();
            let id = sprint.id.clone();
            tokio::spawn(async move { lifecycle.activate_sprint(&id, None).await })
        });
        let results = futures::future::join_all(attempts).await;
        let wins = results
            .into_iter()
            .map(|r| r.unwrap())
            .filter(Result::is_ok)
            .count();
        assert_eq!(wins, 1);
    }
}
