//! The record store collaborator
//!
//! [`RecordStore`] is the only shared mutable resource of the engine. It is
//! deliberately small: CRUD, filtered listing with pagination, and one
//! conditional write used for optimistic concurrency.

use crate::error::StoreError;
use crate::query::{Filter, Sort};
use crate::record::{Fields, ListPage, Record, RecordId};
use async_trait::async_trait;

/// CRUD + filtered query API over named collections
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch a record by id
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if absent
    async fn get(&self, collection: &str, id: &RecordId) -> Result<Record, StoreError>;

    /// First record matching `filter` under `sort`
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if nothing matches
    async fn get_first(
        &self,
        collection: &str,
        filter: &Filter,
        sort: &Sort,
    ) -> Result<Record, StoreError>;

    /// One page of matching records (`page` is 1-based)
    async fn list(
        &self,
        collection: &str,
        filter: &Filter,
        sort: &Sort,
        page: u32,
        per_page: u32,
    ) -> Result<ListPage<Record>, StoreError>;

    /// Every matching record, unpaginated
    async fn list_all(
        &self,
        collection: &str,
        filter: &Filter,
        sort: &Sort,
    ) -> Result<Vec<Record>, StoreError>;

    /// Create a record
    async fn create(&self, collection: &str, fields: Fields) -> Result<Record, StoreError>;

    /// Patch a record; only the given fields change, `null` clears a field
    async fn update(
        &self,
        collection: &str,
        id: &RecordId,
        fields: Fields,
    ) -> Result<Record, StoreError>;

    /// Patch a record only if it currently matches `guard`, atomically
    ///
    /// # Errors
    /// [`StoreError::PreconditionFailed`] if the record exists but does not match
    async fn update_where(
        &self,
        collection: &str,
        id: &RecordId,
        guard: &Filter,
        fields: Fields,
    ) -> Result<Record, StoreError>;

    /// Delete a record
    async fn delete(&self, collection: &str, id: &RecordId) -> Result<(), StoreError>;

    /// Lookup-style `get`: `None` instead of [`StoreError::NotFound`]
    async fn find(&self, collection: &str, id: &RecordId) -> Result<Option<Record>, StoreError> {
        match self.get(collection, id).await {
            Ok(record) => Ok(Some(record)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Lookup-style `get_first`
    async fn find_first(
        &self,
        collection: &str,
        filter: &Filter,
        sort: &Sort,
    ) -> Result<Option<Record>, StoreError> {
        match self.get_first(collection, filter, sort).await {
            Ok(record) => Ok(Some(record)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Number of matching records, read from a one-item page
    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let page = self.list(collection, filter, &Sort::none(), 1, 1).await?;
        Ok(page.total_items)
    }

    /// Whether any record matches
    async fn exists(&self, collection: &str, filter: &Filter) -> Result<bool, StoreError> {
        Ok(self.count(collection, filter).await? > 0)
    }
}

impl std::fmt::Debug for dyn RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RecordStore")
    }
}
