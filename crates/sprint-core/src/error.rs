//! Error types for the sprint engine
//!
//! Provides error handling for:
//! - Illegal phase transitions
//! - Date range validation and overlap conflicts
//! - Missing records and malformed ids
//! - Store and configuration failures
//!
//! Messages are written to be shown to an admin as-is.

use crate::config::ConfigError;
use crate::types::SprintStatus;
use chrono::{DateTime, Utc};
use sprint_store::{InvalidRecordId, RecordId, StoreError};

/// Main engine error type
#[derive(Debug, thiserror::Error)]
pub enum SprintError {
    /// Transition precondition not met
    #[error(
        "cannot change sprint {sprint_id}: status is '{actual}', expected {}",
        expected_list(.expected)
    )]
    InvalidStateTransition {
        /// Sprint that was asked to move
        sprint_id: RecordId,
        /// Status found in the store
        actual: SprintStatus,
        /// Statuses the operation accepts
        expected: Vec<SprintStatus>,
    },

    /// Date or scheduling validation failed
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Requested record is absent
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record
        entity: &'static str,
        /// Requested id
        id: String,
    },

    /// Structurally invalid id supplied by the caller
    #[error("invalid {field}: {source}")]
    InvalidId {
        /// Parameter name
        field: &'static str,
        /// Validation failure
        #[source]
        source: InvalidRecordId,
    },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Record store failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl SprintError {
    /// Create not found error
    #[inline]
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Check if error is a not found error
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if error is retryable
    ///
    /// Transition and validation errors are never retryable.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_retryable() || e.is_precondition_failed())
    }
}

/// Parse a caller-supplied id
///
/// # Errors
/// [`SprintError::InvalidId`] naming `field`
pub fn parse_id(field: &'static str, value: &str) -> Result<RecordId, SprintError> {
    RecordId::parse(value).map_err(|source| SprintError::InvalidId { field, source })
}

fn expected_list(expected: &[SprintStatus]) -> String {
    let quoted: Vec<String> = expected.iter().map(|s| format!("'{s}'")).collect();
    match quoted.as_slice() {
        [] => "no status".to_string(),
        [one] => one.clone(),
        [init @ .., last] => format!("{} or {}", init.join(", "), last),
    }
}

/// Validation errors
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// End is not after start
    #[error("end date {end} must be after start date {start}")]
    InvalidRange {
        /// Proposed start
        start: DateTime<Utc>,
        /// Proposed end
        end: DateTime<Utc>,
    },

    /// Sprint has no end date to extend
    #[error("sprint {sprint_id} has no end date to extend")]
    MissingEndDate {
        /// Sprint id
        sprint_id: RecordId,
    },

    /// Extension by zero or negative days
    #[error("extension must be at least one day, got {days}")]
    NonPositiveExtension {
        /// Requested days
        days: i64,
    },

    /// Proposed range overlaps a non-terminal sprint
    #[error("{}", .0.message)]
    Overlap(Box<OverlapConflict>),

    /// Only scheduled sprints can be rescheduled
    #[error("sprint {sprint_id} is '{status}'; only scheduled sprints can be rescheduled")]
    NotReschedulable {
        /// Sprint id
        sprint_id: RecordId,
        /// Current status
        status: SprintStatus,
    },

    /// Only scheduled or cancelled sprints can be deleted
    #[error("sprint {sprint_id} is '{status}'; only scheduled or cancelled sprints can be deleted")]
    NotDeletable {
        /// Sprint id
        sprint_id: RecordId,
        /// Current status
        status: SprintStatus,
    },

    /// Participants can only join scheduled or active sprints
    #[error("sprint {sprint_id} is '{status}'; participants can only join scheduled or active sprints")]
    NotJoinable {
        /// Sprint id
        sprint_id: RecordId,
        /// Current status
        status: SprintStatus,
    },
}

/// The sprint a proposed date range collides with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlapConflict {
    /// Conflicting sprint
    pub sprint_id: RecordId,
    /// Its number
    pub sprint_number: u32,
    /// Its status
    pub status: SprintStatus,
    /// Its start
    pub start_at: DateTime<Utc>,
    /// Its end
    pub end_at: DateTime<Utc>,
    /// Display message
    pub message: String,
}
