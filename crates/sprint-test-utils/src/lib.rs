//! Testing utilities for the design sprint workspace
//!
//! Shared fixtures, seeders and fault-injecting wrappers.

#![allow(missing_docs)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use sprint_core::{collections, Clock, EngineConfig, Sprint, SprintEngine, SprintStatus, XpSource};
use sprint_store::{
    time_value, Fields, Filter, ListPage, MemoryStore, Record, RecordId, RecordStore, Sort,
    StoreError,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Midnight UTC on 2025-01-`d`
pub fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + Duration::days(i64::from(d) - 1)
}

pub fn id(s: &str) -> RecordId {
    RecordId::parse(s).unwrap()
}

pub fn fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(at) }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock() = at;
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Store wrapper that fails chosen collections and can simulate racing writers
#[derive(Debug)]
pub struct FailingStore {
    inner: Arc<dyn RecordStore>,
    failing: RwLock<HashSet<String>>,
    interfering_updates: AtomicUsize,
}

impl FailingStore {
    pub fn new(inner: Arc<dyn RecordStore>) -> Self {
        Self {
            inner,
            failing: RwLock::new(HashSet::new()),
            interfering_updates: AtomicUsize::new(0),
        }
    }

    /// Every call touching `collection` fails with a backend error
    pub fn fail(&self, collection: &str) {
        self.failing.write().insert(collection.to_string());
    }

    pub fn heal(&self, collection: &str) {
        self.failing.write().remove(collection);
    }

    /// The next `n` conditional updates see a concurrent version bump first
    pub fn interfere_with_updates(&self, n: usize) {
        self.interfering_updates.store(n, Ordering::SeqCst);
    }

    fn check(&self, collection: &str) -> Result<(), StoreError> {
        if self.failing.read().contains(collection) {
            return Err(StoreError::Backend(format!("injected failure on '{collection}'")));
        }
        Ok(())
    }

    fn take_interference(&self) -> bool {
        self.interfering_updates
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl RecordStore for FailingStore {
    async fn get(&self, collection: &str, id: &RecordId) -> Result<Record, StoreError> {
        self.check(collection)?;
        self.inner.get(collection, id).await
    }

    async fn get_first(
        &self,
        collection: &str,
        filter: &Filter,
        sort: &Sort,
    ) -> Result<Record, StoreError> {
        self.check(collection)?;
        self.inner.get_first(collection, filter, sort).await
    }

    async fn list(
        &self,
        collection: &str,
        filter: &Filter,
        sort: &Sort,
        page: u32,
        per_page: u32,
    ) -> Result<ListPage<Record>, StoreError> {
        self.check(collection)?;
        self.inner.list(collection, filter, sort, page, per_page).await
    }

    async fn list_all(
        &self,
        collection: &str,
        filter: &Filter,
        sort: &Sort,
    ) -> Result<Vec<Record>, StoreError> {
        self.check(collection)?;
        self.inner.list_all(collection, filter, sort).await
    }

    async fn create(&self, collection: &str, fields: Fields) -> Result<Record, StoreError> {
        self.check(collection)?;
        self.inner.create(collection, fields).await
    }

    async fn update(
        &self,
        collection: &str,
        id: &RecordId,
        fields: Fields,
    ) -> Result<Record, StoreError> {
        self.check(collection)?;
        self.inner.update(collection, id, fields).await
    }

    async fn update_where(
        &self,
        collection: &str,
        id: &RecordId,
        guard: &Filter,
        fields: Fields,
    ) -> Result<Record, StoreError> {
        self.check(collection)?;
        if self.take_interference() {
            let current = self.inner.get(collection, id).await?;
            let version = current
                .fields
                .get("version")
                .and_then(Value::as_u64)
                .unwrap_or(0);
            let mut bump = Fields::new();
            bump.insert("version".into(), json!(version + 1));
            self.inner.update(collection, id, bump).await?;
        }
        self.inner.update_where(collection, id, guard, fields).await
    }

    async fn delete(&self, collection: &str, id: &RecordId) -> Result<(), StoreError> {
        self.check(collection)?;
        self.inner.delete(collection, id).await
    }
}

/// Engine over a memory store and a fixed clock
pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<FixedClock>,
    pub engine: SprintEngine,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(FixedClock::new(day(1)));
        let engine = SprintEngine::with_clock(store.clone(), config, clock.clone()).unwrap();
        Self {
            store,
            clock,
            engine,
        }
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Engine over a [`FailingStore`]
pub struct FaultyFixture {
    pub store: Arc<FailingStore>,
    pub clock: Arc<FixedClock>,
    pub engine: SprintEngine,
}

impl FaultyFixture {
    pub fn new() -> Self {
        let store = Arc::new(FailingStore::new(Arc::new(MemoryStore::new())));
        let clock = Arc::new(FixedClock::new(day(1)));
        let engine =
            SprintEngine::with_clock(store.clone(), EngineConfig::default(), clock.clone()).unwrap();
        Self {
            store,
            clock,
            engine,
        }
    }
}

impl Default for FaultyFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Insert a sprint in any status, bypassing the lifecycle
pub async fn seed_sprint(
    store: &dyn RecordStore,
    number: u32,
    status: SprintStatus,
    range: Option<(DateTime<Utc>, DateTime<Utc>)>,
) -> anyhow::Result<Sprint> {
    let (start_at, end_at) = match range {
        Some((start, end)) => (Some(time_value(&start)), Some(time_value(&end))),
        None => (None, None),
    };
    let record = store
        .create(
            collections::SPRINTS,
            fields(json!({
                "sprint_number": number,
                "status": status,
                "start_at": start_at,
                "end_at": end_at,
                "duration_days": 7,
                "version": 0,
            })),
        )
        .await?;
    Ok(record.decode()?)
}

pub async fn seed_user(store: &dyn RecordStore, user_id: &str, name: &str) -> anyhow::Result<RecordId> {
    let record = store
        .create(
            collections::USERS,
            fields(json!({ "id": user_id, "name": name, "avatar": format!("{user_id}.png") })),
        )
        .await?;
    Ok(record.id)
}

pub async fn seed_participant(
    store: &dyn RecordStore,
    sprint_id: &RecordId,
    user_id: &RecordId,
) -> anyhow::Result<()> {
    store
        .create(
            collections::PARTICIPANTS,
            fields(json!({ "sprint_id": sprint_id, "user_id": user_id })),
        )
        .await?;
    Ok(())
}

pub async fn seed_submission(
    store: &dyn RecordStore,
    user_id: &RecordId,
    sprint_id: &RecordId,
    status: &str,
) -> anyhow::Result<()> {
    store
        .create(
            collections::SUBMISSIONS,
            fields(json!({ "user_id": user_id, "sprint_id": sprint_id, "status": status })),
        )
        .await?;
    Ok(())
}

pub async fn seed_votes(
    store: &dyn RecordStore,
    voter_id: &RecordId,
    sprint_id: &RecordId,
    count: usize,
) -> anyhow::Result<()> {
    for _ in 0..count {
        store
            .create(
                collections::VOTES,
                fields(json!({ "voter_id": voter_id, "sprint_id": sprint_id })),
            )
            .await?;
    }
    Ok(())
}

pub async fn seed_feedback(
    store: &dyn RecordStore,
    author_id: &RecordId,
    sprint_id: &RecordId,
    count: usize,
) -> anyhow::Result<()> {
    for _ in 0..count {
        store
            .create(
                collections::FEEDBACK,
                fields(json!({ "author_id": author_id, "sprint_id": sprint_id })),
            )
            .await?;
    }
    Ok(())
}

/// Append a raw XP event, skipping dedup
pub async fn seed_xp(
    store: &dyn RecordStore,
    user_id: &RecordId,
    sprint_id: &RecordId,
    source: XpSource,
    amount: i64,
) -> anyhow::Result<()> {
    store
        .create(
            collections::XP_EVENTS,
            fields(json!({
                "user_id": user_id,
                "sprint_id": sprint_id,
                "source_type": source,
                "amount": amount,
            })),
        )
        .await?;
    Ok(())
}

pub async fn seed_award(
    store: &dyn RecordStore,
    sprint_id: &RecordId,
    user_id: &RecordId,
    award_type: &str,
) -> anyhow::Result<()> {
    store
        .create(
            collections::AWARDS,
            fields(json!({
                "sprint_id": sprint_id,
                "user_id": user_id,
                "award_type": award_type,
                "title": award_type.replace('_', " "),
            })),
        )
        .await?;
    Ok(())
}

pub async fn seed_retrospective(
    store: &dyn RecordStore,
    sprint_id: &RecordId,
    summary: &str,
) -> anyhow::Result<()> {
    store
        .create(
            collections::RETROSPECTIVES,
            fields(json!({ "sprint_id": sprint_id, "summary": summary, "highlights": [] })),
        )
        .await?;
    Ok(())
}
