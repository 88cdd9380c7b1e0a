//! XP engine
//!
//! XP is an append-only ledger of events. Every total is a fold of `amount`
//! over a page-by-page scan, so the result never depends on event order or
//! page size.

use crate::error::SprintError;
use crate::levels::{LevelProgress, LevelTable};
use crate::types::{collections, XpEvent, XpSource};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sprint_store::{encode, Filter, RecordId, RecordStore, Sort};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Sum of event amounts
#[inline]
#[must_use]
pub fn fold_total<'a>(events: impl IntoIterator<Item = &'a XpEvent>) -> i64 {
    events.into_iter().map(|e| e.amount).sum()
}

/// Order used for every event scan; `id` breaks `created` ties
#[must_use]
pub fn scan_order() -> Sort {
    Sort::asc("created").then_asc("id")
}

/// Visit every event matching `filter`, one page at a time
///
/// Returns the number of pages read.
pub(crate) async fn scan_events(
    store: &dyn RecordStore,
    filter: &Filter,
    page_size: u32,
    mut visit: impl FnMut(XpEvent),
) -> Result<u32, SprintError> {
    let sort = scan_order();
    let mut page = 1;
    loop {
        let batch = store
            .list(collections::XP_EVENTS, filter, &sort, page, page_size)
            .await?;
        let last = batch.is_last_page() || batch.items.is_empty();
        for record in &batch.items {
            visit(record.decode()?);
        }
        tracing::debug!(page, items = batch.items.len(), "scanned xp page");
        if last {
            return Ok(page);
        }
        page += 1;
    }
}

/// Per-user XP breakdown
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct XpSummary {
    /// Total XP
    pub total: i64,
    /// XP per source type
    pub by_source: BTreeMap<XpSource, i64>,
    /// XP per sprint id
    pub by_sprint: BTreeMap<String, i64>,
}

impl XpSummary {
    /// Account one event
    pub fn add(&mut self, event: &XpEvent) {
        self.total += event.amount;
        *self.by_source.entry(event.source_type).or_default() += event.amount;
        *self
            .by_sprint
            .entry(event.sprint_id.as_str().to_string())
            .or_default() += event.amount;
    }
}

/// Request to credit XP
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XpAward {
    /// Credited user
    pub user_id: RecordId,
    /// Sprint the action belongs to
    pub sprint_id: RecordId,
    /// Action kind
    pub source_type: XpSource,
    /// Points
    pub amount: i64,
    /// Dedup key
    pub source_id: Option<String>,
}

impl XpAward {
    /// Create award
    #[must_use]
    pub fn new(user_id: RecordId, sprint_id: RecordId, source_type: XpSource, amount: i64) -> Self {
        Self {
            user_id,
            sprint_id,
            source_type,
            amount,
            source_id: None,
        }
    }

    /// With dedup key
    #[inline]
    #[must_use]
    pub fn with_source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }
}

/// Result of [`XpEngine::award_xp`]
#[derive(Debug, Clone, PartialEq)]
pub enum AwardOutcome {
    /// New event appended
    Created(XpEvent),
    /// Matching event already existed; nothing written
    Duplicate(XpEvent),
}

impl AwardOutcome {
    /// The new or existing event
    #[inline]
    #[must_use]
    pub fn event(&self) -> &XpEvent {
        match self {
            Self::Created(e) | Self::Duplicate(e) => e,
        }
    }

    /// Whether an event was written
    #[inline]
    #[must_use]
    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Reads and appends XP events
pub struct XpEngine {
    store: Arc<dyn RecordStore>,
    levels: LevelTable,
    page_size: u32,
}

impl fmt::Debug for XpEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XpEngine")
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

impl XpEngine {
    /// Create engine
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, levels: LevelTable, page_size: u32) -> Self {
        Self {
            store,
            levels,
            page_size: page_size.max(1),
        }
    }

    /// Level table in use
    #[inline]
    #[must_use]
    pub fn levels(&self) -> &LevelTable {
        &self.levels
    }

    /// All XP a user has earned
    #[tracing::instrument(skip(self))]
    pub async fn total_xp(&self, user_id: &RecordId) -> Result<i64, SprintError> {
        self.fold(&Filter::eq("user_id", user_id)).await
    }

    /// XP a user earned in one sprint
    #[tracing::instrument(skip(self))]
    pub async fn xp_by_sprint(
        &self,
        user_id: &RecordId,
        sprint_id: &RecordId,
    ) -> Result<i64, SprintError> {
        let filter = Filter::eq("user_id", user_id).and(Filter::eq("sprint_id", sprint_id));
        self.fold(&filter).await
    }

    /// Total plus per-source and per-sprint breakdown in one pass
    #[tracing::instrument(skip(self))]
    pub async fn xp_summary(&self, user_id: &RecordId) -> Result<XpSummary, SprintError> {
        let mut summary = XpSummary::default();
        scan_events(
            self.store.as_ref(),
            &Filter::eq("user_id", user_id),
            self.page_size,
            |event| summary.add(&event),
        )
        .await?;
        Ok(summary)
    }

    /// Level standing derived from the user's total
    pub async fn level_progress(&self, user_id: &RecordId) -> Result<LevelProgress, SprintError> {
        let total = self.total_xp(user_id).await?;
        Ok(self.levels.progress(total))
    }

    /// Append an XP event unless an equivalent one exists
    ///
    /// An event is a duplicate when it shares user, source type and
    /// `source_id`, or, for once-per-sprint sources, user, source type and
    /// sprint.
    #[tracing::instrument(skip(self))]
    pub async fn award_xp(&self, award: XpAward) -> Result<AwardOutcome, SprintError> {
        let same_kind = Filter::eq("user_id", &award.user_id)
            .and(Filter::eq("source_type", award.source_type));

        if let Some(source_id) = &award.source_id {
            let filter = same_kind.clone().and(Filter::eq("source_id", source_id.as_str()));
            if let Some(existing) = self.existing(&filter).await? {
                return Ok(AwardOutcome::Duplicate(existing));
            }
        }
        if award.source_type.once_per_sprint() {
            let filter = same_kind.and(Filter::eq("sprint_id", &award.sprint_id));
            if let Some(existing) = self.existing(&filter).await? {
                return Ok(AwardOutcome::Duplicate(existing));
            }
        }

        let fields = encode(&json!({
            "user_id": award.user_id,
            "sprint_id": award.sprint_id,
            "source_type": award.source_type,
            "amount": award.amount,
            "source_id": award.source_id,
        }))?;
        let event: XpEvent = self
            .store
            .create(collections::XP_EVENTS, fields)
            .await?
            .decode()?;
        tracing::info!(
            user = %event.user_id,
            source = %event.source_type,
            amount = event.amount,
            "xp awarded"
        );
        Ok(AwardOutcome::Created(event))
    }

    async fn existing(&self, filter: &Filter) -> Result<Option<XpEvent>, SprintError> {
        Ok(self
            .store
            .find_first(collections::XP_EVENTS, filter, &scan_order())
            .await?
            .map(|r| r.decode())
            .transpose()?)
    }

    async fn fold(&self, filter: &Filter) -> Result<i64, SprintError> {
        let mut total = 0i64;
        scan_events(self.store.as_ref(), filter, self.page_size, |event| {
            total += event.amount;
        })
        .await?;
        Ok(total)
    }
}
