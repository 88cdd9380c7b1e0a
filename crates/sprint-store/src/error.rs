//! Error types for the record store
//!
//! Every backend maps its failures onto [`StoreError`] so callers can tell a
//! missing record apart from a failed conditional write or a broken backend.

use crate::record::RecordId;

/// Record store error
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No record with this id (or matching this filter) exists
    #[error("record not found in '{collection}': {id}")]
    NotFound {
        /// Collection that was queried
        collection: String,
        /// Id or filter that found nothing
        id: String,
    },

    /// Conditional update guard did not match the stored record
    #[error("precondition failed for '{collection}' record {id}")]
    PreconditionFailed {
        /// Collection of the guarded record
        collection: String,
        /// Guarded record id
        id: RecordId,
    },

    /// Create with an id that is already taken
    #[error("record {id} already exists in '{collection}'")]
    AlreadyExists {
        /// Target collection
        collection: String,
        /// Requested id
        id: RecordId,
    },

    /// Record fields could not be decoded into the requested type
    #[error("failed to decode '{collection}' record: {source}")]
    Decode {
        /// Collection of the record
        collection: String,
        /// Underlying serde error
        #[source]
        source: serde_json::Error,
    },

    /// Malformed query (bad page, entity that is not an object, ...)
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Backend failure (connection, IO, remote error)
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Create not found error
    #[inline]
    pub fn not_found(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Check if error is a not found error
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if error is a failed conditional write
    #[inline]
    #[must_use]
    pub fn is_precondition_failed(&self) -> bool {
        matches!(self, Self::PreconditionFailed { .. })
    }

    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Backend(_))
    }
}

/// Record id failed structural validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid record id {value:?}: {reason}")]
pub struct InvalidRecordId {
    /// Offending input
    pub value: String,
    /// Why it was rejected
    pub reason: &'static str,
}
