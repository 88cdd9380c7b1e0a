//! In-process record store
//!
//! Collections keep insertion order, so unsorted listings return records in
//! the order they were created. Creation timestamps are strictly increasing
//! per store, which keeps `created`-sorted pagination stable.

use crate::error::StoreError;
use crate::query::{Filter, Sort};
use crate::record::{Fields, ListPage, Record, RecordId, META_FIELDS};
use crate::store::RecordStore;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;

/// In-memory [`RecordStore`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Collection name -> records in insertion order
    collections: DashMap<String, Vec<Record>>,
    /// Last issued creation timestamp
    last_created: Mutex<Option<DateTime<Utc>>>,
}

impl MemoryStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in a collection
    #[must_use]
    pub fn len(&self, collection: &str) -> usize {
        self.collections.get(collection).map_or(0, |c| c.len())
    }

    /// Whether a collection is empty or missing
    #[must_use]
    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    /// Snapshot of a collection in insertion order
    #[must_use]
    pub fn records(&self, collection: &str) -> Vec<Record> {
        self.collections
            .get(collection)
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    fn next_created(&self) -> DateTime<Utc> {
        let mut last = self.last_created.lock();
        let now = Utc::now();
        let next = match *last {
            Some(prev) if now <= prev => prev + Duration::microseconds(1),
            _ => now,
        };
        *last = Some(next);
        next
    }

    fn matching(&self, collection: &str, filter: &Filter, sort: &Sort) -> Vec<Record> {
        let mut items: Vec<Record> = self
            .collections
            .get(collection)
            .map(|records| records.iter().filter(|r| filter.matches(r)).cloned().collect())
            .unwrap_or_default();

        if !sort.is_empty() {
            // stable: ties keep insertion order
            items.sort_by(|a, b| sort.compare_records(a, b));
        }
        items
    }
}

fn apply_patch(record: &mut Record, fields: Fields) {
    for (key, value) in fields {
        if META_FIELDS.contains(&key.as_str()) {
            continue;
        }
        record.fields.insert(key, value);
    }
    record.updated = Utc::now().max(record.updated);
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get(&self, collection: &str, id: &RecordId) -> Result<Record, StoreError> {
        self.collections
            .get(collection)
            .and_then(|records| records.iter().find(|r| &r.id == id).cloned())
            .ok_or_else(|| StoreError::not_found(collection, id.as_str()))
    }

    async fn get_first(
        &self,
        collection: &str,
        filter: &Filter,
        sort: &Sort,
    ) -> Result<Record, StoreError> {
        self.matching(collection, filter, sort)
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::not_found(collection, filter.to_string()))
    }

    async fn list(
        &self,
        collection: &str,
        filter: &Filter,
        sort: &Sort,
        page: u32,
        per_page: u32,
    ) -> Result<ListPage<Record>, StoreError> {
        if page == 0 {
            return Err(StoreError::InvalidQuery("page numbers start at 1".to_string()));
        }
        if per_page == 0 {
            return Err(StoreError::InvalidQuery("per_page must be positive".to_string()));
        }

        let all = self.matching(collection, filter, sort);
        let total_items = all.len() as u64;
        let total_pages = u32::try_from(total_items.div_ceil(u64::from(per_page)))
            .map_err(|_| StoreError::InvalidQuery("too many pages".to_string()))?;
        let skip = (page as usize - 1).saturating_mul(per_page as usize);
        let items = all.into_iter().skip(skip).take(per_page as usize).collect();

        Ok(ListPage {
            items,
            page,
            per_page,
            total_items,
            total_pages,
        })
    }

    async fn list_all(
        &self,
        collection: &str,
        filter: &Filter,
        sort: &Sort,
    ) -> Result<Vec<Record>, StoreError> {
        Ok(self.matching(collection, filter, sort))
    }

    async fn create(&self, collection: &str, mut fields: Fields) -> Result<Record, StoreError> {
        let id = match fields.get("id").and_then(Value::as_str) {
            Some(raw) => RecordId::parse(raw).map_err(|e| StoreError::InvalidQuery(e.to_string()))?,
            None => RecordId::generate(),
        };
        for key in META_FIELDS {
            fields.remove(key);
        }

        let mut records = self.collections.entry(collection.to_string()).or_default();
        if records.iter().any(|r| r.id == id) {
            return Err(StoreError::AlreadyExists {
                collection: collection.to_string(),
                id,
            });
        }

        let created = self.next_created();
        let record = Record {
            id,
            collection: collection.to_string(),
            created,
            updated: created,
            fields,
        };
        records.push(record.clone());

        tracing::trace!(collection, id = %record.id, "record created");
        Ok(record)
    }

    async fn update(
        &self,
        collection: &str,
        id: &RecordId,
        fields: Fields,
    ) -> Result<Record, StoreError> {
        self.update_where(collection, id, &Filter::All, fields).await
    }

    async fn update_where(
        &self,
        collection: &str,
        id: &RecordId,
        guard: &Filter,
        fields: Fields,
    ) -> Result<Record, StoreError> {
        // the shard write lock makes check-and-write atomic
        let mut records = self
            .collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::not_found(collection, id.as_str()))?;

        let record = records
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| StoreError::not_found(collection, id.as_str()))?;

        if !guard.matches(record) {
            return Err(StoreError::PreconditionFailed {
                collection: collection.to_string(),
                id: id.clone(),
            });
        }

        apply_patch(record, fields);
        Ok(record.clone())
    }

    async fn delete(&self, collection: &str, id: &RecordId) -> Result<(), StoreError> {
        let mut records = self
            .collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::not_found(collection, id.as_str()))?;

        let idx = records
            .iter()
            .position(|r| &r.id == id)
            .ok_or_else(|| StoreError::not_found(collection, id.as_str()))?;
        records.remove(idx);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::json;

    fn fields(v: Value) -> Fields {
        v.as_object().cloned().unwrap()
    }

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        for (n, status) in [(1, "completed"), (2, "active"), (3, "scheduled")] {
            store
                .create("sprints", fields(json!({ "sprint_number": n, "status": status })))
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn create_and_get() {
        let store = MemoryStore::new();
        let rec = store.create("notes", fields(json!({ "t": 1 }))).await.unwrap();
        let got = store.get("notes", &rec.id).await.unwrap();
        assert_eq!(got, rec);

        let missing = RecordId::parse("nope").unwrap();
        assert!(store.get("notes", &missing).await.unwrap_err().is_not_found());
        assert!(store.find("notes", &missing).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn create_honours_supplied_id() {
        let store = MemoryStore::new();
        let rec = store
            .create("users", fields(json!({ "id": "alice", "name": "Alice" })))
            .await
            .unwrap();
        assert_eq!(rec.id.as_str(), "alice");
        assert!(!rec.fields.contains_key("id"));

        let err = store
            .create("users", fields(json!({ "id": "alice" })))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));

        let err = store
            .create("users", fields(json!({ "id": "not valid" })))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidQuery(_)));
    }

    #[tokio::test]
    async fn created_is_strictly_increasing() {
        let store = MemoryStore::new();
        let mut prev = None;
        for _ in 0..50 {
            let rec = store.create("c", Fields::new()).await.unwrap();
            if let Some(p) = prev {
                assert!(rec.created > p);
            }
            prev = Some(rec.created);
        }
    }

    #[tokio::test]
    async fn list_paginates_and_counts() {
        let store = seeded().await;
        let page = store
            .list("sprints", &Filter::All, &Sort::desc("sprint_number"), 1, 2)
            .await
            .unwrap();
        assert_eq!(page.total_items, 3);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.items[0].fields["sprint_number"], json!(3));
        assert!(!page.is_last_page());

        let last = store
            .list("sprints", &Filter::All, &Sort::desc("sprint_number"), 2, 2)
            .await
            .unwrap();
        assert_eq!(last.items.len(), 1);
        assert!(last.is_last_page());

        assert_eq!(store.count("sprints", &Filter::eq("status", "active")).await.unwrap(), 1);
        assert!(store.list("sprints", &Filter::All, &Sort::none(), 0, 2).await.is_err());
    }

    #[tokio::test]
    async fn empty_collection_lists_nothing() {
        let store = MemoryStore::new();
        let page = store.list("x", &Filter::All, &Sort::none(), 1, 10).await.unwrap();
        assert_eq!(page.total_pages, 0);
        assert!(page.items.is_empty());
        assert!(page.is_last_page());
        assert!(store.find_first("x", &Filter::All, &Sort::none()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_patches_fields() {
        let store = seeded().await;
        let rec = store
            .get_first("sprints", &Filter::eq("status", "active"), &Sort::none())
            .await
            .unwrap();
        let updated = store
            .update("sprints", &rec.id, fields(json!({ "status": "voting", "ended_by_id": "u1" })))
            .await
            .unwrap();
        assert_eq!(updated.fields["status"], json!("voting"));
        assert_eq!(updated.fields["sprint_number"], json!(2));
        assert_eq!(updated.id, rec.id);
    }

    #[tokio::test]
    async fn update_where_guards_write() {
        let store = seeded().await;
        let rec = store
            .get_first("sprints", &Filter::eq("status", "active"), &Sort::none())
            .await
            .unwrap();
        let guard = Filter::eq("status", "active");

        store
            .update_where("sprints", &rec.id, &guard, fields(json!({ "status": "voting" })))
            .await
            .unwrap();

        let err = store
            .update_where("sprints", &rec.id, &guard, fields(json!({ "status": "retro" })))
            .await
            .unwrap_err();
        assert!(err.is_precondition_failed());
        assert_eq!(store.get("sprints", &rec.id).await.unwrap().fields["status"], json!("voting"));
    }

    #[tokio::test]
    async fn delete_removes_record() {
        let store = seeded().await;
        let rec = store.list_all("sprints", &Filter::All, &Sort::none()).await.unwrap()[0].clone();
        store.delete("sprints", &rec.id).await.unwrap();
        assert_eq!(store.len("sprints"), 2);
        assert!(store.delete("sprints", &rec.id).await.unwrap_err().is_not_found());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn prop_pages_concatenate_to_full_listing(
            groups in prop::collection::vec(0u8..4, 0..40),
            per_page in 1u32..12,
        ) {
            let (paged, all) = tokio_test::block_on(async {
                let store = MemoryStore::new();
                for group in &groups {
                    store
                        .create("events", fields(json!({ "group": group })))
                        .await
                        .unwrap();
                }
                let filter = Filter::ne("group", 0);
                let sort = Sort::desc("group").then_asc("created");

                let mut paged = Vec::new();
                let mut page = 1;
                loop {
                    let listing = store.list("events", &filter, &sort, page, per_page).await.unwrap();
                    paged.extend(listing.items.iter().map(|r| r.id.clone()));
                    if listing.is_last_page() {
                        break;
                    }
                    page += 1;
                }
                let all: Vec<RecordId> = store
                    .list_all("events", &filter, &sort)
                    .await
                    .unwrap()
                    .into_iter()
                    .map(|r| r.id)
                    .collect();
                (paged, all)
            });

            prop_assert_eq!(all.len(), groups.iter().filter(|g| **g != 0).count());
            prop_assert_eq!(paged, all);
        }
    }
}
