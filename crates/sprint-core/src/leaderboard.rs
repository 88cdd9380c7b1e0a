//! XP leaderboards
//!
//! Totals are accumulated over fixed-size pages of the event ledger, ranked,
//! and only the winners are hydrated with display details.

use crate::error::SprintError;
use crate::types::{collections, UserDetails};
use crate::xp::scan_events;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use sprint_store::{Filter, RecordId, RecordStore, Sort};
use std::cmp::Reverse;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Which events count
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LeaderboardScope {
    /// Every event ever
    Global,
    /// Events of one sprint
    Sprint(RecordId),
}

impl LeaderboardScope {
    fn filter(&self) -> Filter {
        match self {
            Self::Global => Filter::All,
            Self::Sprint(sprint_id) => Filter::eq("sprint_id", sprint_id),
        }
    }
}

/// One leaderboard row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    /// 1-based position
    pub rank: usize,
    /// User
    pub user_id: RecordId,
    /// XP within the scope
    pub total_xp: i64,
    /// Display name, if the user record has one
    pub name: Option<String>,
    /// Avatar, if the user record has one
    pub avatar: Option<String>,
}

/// Running per-user totals
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserTotals {
    totals: HashMap<RecordId, i64>,
}

impl UserTotals {
    /// Create empty totals
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one credit
    pub fn add(&mut self, user_id: RecordId, amount: i64) {
        *self.totals.entry(user_id).or_default() += amount;
    }

    /// Total for one user
    #[must_use]
    pub fn get(&self, user_id: &RecordId) -> i64 {
        self.totals.get(user_id).copied().unwrap_or(0)
    }

    /// Number of distinct users
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.totals.len()
    }

    /// Whether no user has been credited
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    /// Highest `limit` totals; ties by user id ascending
    #[must_use]
    pub fn top(&self, limit: usize) -> Vec<(RecordId, i64)> {
        let mut ranked: Vec<(RecordId, i64)> =
            self.totals.iter().map(|(id, xp)| (id.clone(), *xp)).collect();
        ranked.sort_by(|a, b| {
            Reverse(a.1)
                .cmp(&Reverse(b.1))
                .then_with(|| a.0.as_str().cmp(b.0.as_str()))
        });
        ranked.truncate(limit);
        ranked
    }
}

/// Builds leaderboards from the XP ledger
pub struct Leaderboard {
    store: Arc<dyn RecordStore>,
    page_size: u32,
    hydrate_batch_size: usize,
}

impl fmt::Debug for Leaderboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Leaderboard")
            .field("page_size", &self.page_size)
            .field("hydrate_batch_size", &self.hydrate_batch_size)
            .finish_non_exhaustive()
    }
}

impl Leaderboard {
    /// Create leaderboard builder
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, page_size: u32, hydrate_batch_size: usize) -> Self {
        Self {
            store,
            page_size: page_size.max(1),
            hydrate_batch_size: hydrate_batch_size.max(1),
        }
    }

    /// Per-user totals for a scope
    pub async fn totals(&self, scope: &LeaderboardScope) -> Result<UserTotals, SprintError> {
        let mut totals = UserTotals::new();
        let pages = scan_events(self.store.as_ref(), &scope.filter(), self.page_size, |event| {
            totals.add(event.user_id, event.amount);
        })
        .await?;
        metrics::counter!("leaderboard_pages_scanned_total").increment(u64::from(pages));
        Ok(totals)
    }

    /// Top `limit` users in a scope, with display details
    ///
    /// A user without a `users` record is still ranked, without details.
    #[tracing::instrument(skip(self))]
    pub async fn leaderboard(
        &self,
        scope: &LeaderboardScope,
        limit: usize,
    ) -> Result<Vec<LeaderboardEntry>, SprintError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let top = self.totals(scope).await?.top(limit);
        if top.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<RecordId> = top.iter().map(|(id, _)| id.clone()).collect();
        let details = self.hydrate(&ids).await?;

        Ok(top
            .into_iter()
            .enumerate()
            .map(|(idx, (user_id, total_xp))| {
                let user = details.get(&user_id);
                LeaderboardEntry {
                    rank: idx + 1,
                    total_xp,
                    name: user.and_then(|u| u.name.clone()),
                    avatar: user.and_then(|u| u.avatar.clone()),
                    user_id,
                }
            })
            .collect())
    }

    /// Fetch `users` records for exactly these ids, chunks in parallel
    async fn hydrate(&self, ids: &[RecordId]) -> Result<HashMap<RecordId, UserDetails>, SprintError> {
        let chunks = ids.chunks(self.hydrate_batch_size).map(|chunk| {
            let filter = Filter::any_eq("id", chunk.iter());
            let store = Arc::clone(&self.store);
            async move {
                store
                    .list_all(collections::USERS, &filter, &Sort::none())
                    .await
            }
        });

        let mut details = HashMap::with_capacity(ids.len());
        for records in try_join_all(chunks).await? {
            for record in records {
                let user: UserDetails = record.decode()?;
                details.insert(user.id.clone(), user);
            }
        }
        Ok(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn id(s: &str) -> RecordId {
        RecordId::parse(s).unwrap()
    }

    #[test]
    fn top_breaks_ties_by_user_id() {
        let mut totals = UserTotals::new();
        totals.add(id("carol"), 50);
        totals.add(id("bob"), 80);
        totals.add(id("alice"), 50);
        totals.add(id("bob"), -10);

        let top = totals.top(10);
        assert_eq!(
            top,
            vec![(id("bob"), 70), (id("alice"), 50), (id("carol"), 50)]
        );
        assert_eq!(totals.top(1).len(), 1);
    }

    #[test]
    fn empty_totals_have_no_top() {
        assert!(UserTotals::new().top(10).is_empty());
    }
}
