use pretty_assertions::assert_eq;
use proptest::prelude::*;
use sprint_core::{
    AwardOutcome, EngineConfig, Leaderboard, LeaderboardScope, SprintStatus, XpAward, XpSource,
};
use sprint_store::{MemoryStore, RecordId};
use sprint_test_utils::{id, seed_sprint, seed_user, seed_xp, FaultyFixture, Fixture};
use std::collections::HashMap;
use std::sync::Arc;

#[tokio::test]
async fn global_and_sprint_leaderboards() {
    let fx = Fixture::new();
    let store = fx.store.as_ref();
    let s1 = seed_sprint(store, 1, SprintStatus::Completed, None).await.unwrap();
    let s2 = seed_sprint(store, 2, SprintStatus::Active, None).await.unwrap();
    let alice = seed_user(store, "alice", "Alice").await.unwrap();
    let bob = seed_user(store, "bob", "Bob").await.unwrap();
    let carol = id("carol"); // no users record

    seed_xp(store, &alice, &s1.id, XpSource::SubmitDesign, 50).await.unwrap();
    seed_xp(store, &bob, &s1.id, XpSource::Vote, 20).await.unwrap();
    seed_xp(store, &bob, &s2.id, XpSource::SubmitDesign, 50).await.unwrap();
    seed_xp(store, &carol, &s2.id, XpSource::Feedback, 30).await.unwrap();

    let global = fx
        .engine
        .leaderboard(&LeaderboardScope::Global, None)
        .await
        .unwrap();
    let rows: Vec<(usize, &str, i64)> = global
        .iter()
        .map(|e| (e.rank, e.user_id.as_str(), e.total_xp))
        .collect();
    assert_eq!(rows, vec![(1, "bob", 70), (2, "alice", 50), (3, "carol", 30)]);
    assert_eq!(global[0].name.as_deref(), Some("Bob"));
    assert_eq!(global[0].avatar.as_deref(), Some("bob.png"));
    assert_eq!(global[2].name, None);

    let sprint = fx
        .engine
        .leaderboard(&LeaderboardScope::Sprint(s2.id.clone()), Some(1))
        .await
        .unwrap();
    assert_eq!(sprint.len(), 1);
    assert_eq!(sprint[0].user_id, bob);
    assert_eq!(sprint[0].total_xp, 50);
}

#[tokio::test]
async fn ties_rank_by_user_id() {
    let fx = Fixture::new();
    let store = fx.store.as_ref();
    let sprint = seed_sprint(store, 1, SprintStatus::Active, None).await.unwrap();
    for user in ["zed", "amy", "kim"] {
        seed_xp(store, &id(user), &sprint.id, XpSource::Vote, 20).await.unwrap();
    }
    let board = fx
        .engine
        .leaderboard(&LeaderboardScope::Global, None)
        .await
        .unwrap();
    let users: Vec<&str> = board.iter().map(|e| e.user_id.as_str()).collect();
    assert_eq!(users, vec!["amy", "kim", "zed"]);
    assert_eq!(board.iter().map(|e| e.rank).collect::<Vec<_>>(), vec![1, 2, 3]);
}

#[tokio::test]
async fn empty_ledger_gives_empty_board() {
    let fx = Fixture::new();
    let board = fx
        .engine
        .leaderboard(&LeaderboardScope::Global, Some(10))
        .await
        .unwrap();
    assert!(board.is_empty());
    assert_eq!(fx.engine.xp().total_xp(&id("nobody")).await.unwrap(), 0);
}

#[tokio::test]
async fn hydration_spans_several_batches() {
    let mut config = EngineConfig::default();
    config.leaderboard.hydrate_batch_size = 2;
    config.leaderboard.page_size = 3;
    let fx = Fixture::with_config(config);
    let store = fx.store.as_ref();
    let sprint = seed_sprint(store, 1, SprintStatus::Active, None).await.unwrap();

    for n in 0..7i64 {
        let user = seed_user(store, &format!("user{n}"), &format!("User {n}")).await.unwrap();
        seed_xp(store, &user, &sprint.id, XpSource::Vote, 10 * (n + 1)).await.unwrap();
    }

    let board = fx
        .engine
        .leaderboard(&LeaderboardScope::Global, Some(5))
        .await
        .unwrap();
    assert_eq!(board.len(), 5);
    assert_eq!(board[0].user_id.as_str(), "user6");
    assert!(board.iter().all(|e| e.name.is_some()));
}

#[tokio::test]
async fn leaderboard_propagates_ledger_failure() {
    let fx = FaultyFixture::new();
    fx.store.fail("xp_events");
    let err = fx
        .engine
        .leaderboard(&LeaderboardScope::Global, None)
        .await
        .unwrap_err();
    assert!(err.is_retryable());
}

#[tokio::test]
async fn award_dedup_through_engine() {
    let fx = Fixture::new();
    let xp = fx.engine.xp();
    let award = XpAward::new(id("user1"), id("sprint1"), XpSource::Feedback, 30)
        .with_source_id("feedback-9");

    let first = xp.award_xp(award.clone()).await.unwrap();
    let second = xp.award_xp(award).await.unwrap();
    assert!(matches!(first, AwardOutcome::Created(_)));
    assert!(matches!(second, AwardOutcome::Duplicate(_)));
    assert_eq!(first.event().id, second.event().id);

    let summary = xp.xp_summary(&id("user1")).await.unwrap();
    assert_eq!(summary.total, 30);
    assert_eq!(summary.by_source.get(&XpSource::Feedback), Some(&30));
}

fn seeded(events: &[(u8, i64)]) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    tokio_test::block_on(async {
        for (user, amount) in events {
            seed_xp(
                store.as_ref(),
                &id(&format!("u{user}")),
                &id("s1"),
                XpSource::Vote,
                *amount,
            )
            .await
            .unwrap();
        }
    });
    store
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_paged_totals_match_single_pass(
        events in prop::collection::vec((0u8..6, -50i64..200), 0..60),
        page_size in 1u32..25,
    ) {
        let store = seeded(&events);

        let mut expected: HashMap<RecordId, i64> = HashMap::new();
        for (user, amount) in &events {
            *expected.entry(id(&format!("u{user}"))).or_default() += amount;
        }

        let totals = tokio_test::block_on(
            Leaderboard::new(store, page_size, 50).totals(&LeaderboardScope::Global),
        )
        .unwrap();

        prop_assert_eq!(totals.len(), expected.len());
        for (user, total) in &expected {
            prop_assert_eq!(totals.get(user), *total);
        }
    }
}
