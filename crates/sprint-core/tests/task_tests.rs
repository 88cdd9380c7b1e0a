use pretty_assertions::assert_eq;
use sprint_core::{
    EngineConfig, SprintError, SprintStatus, TaskCompletion, TaskId, XpSource, DEFAULT_MAX_TASK_XP,
};
use sprint_test_utils::{
    id, seed_feedback, seed_participant, seed_sprint, seed_submission, seed_votes, seed_xp,
    FaultyFixture, Fixture,
};

fn flags(completion: &TaskCompletion) -> Vec<bool> {
    completion.tasks.iter().map(|t| t.completed).collect()
}

#[tokio::test]
async fn checklist_from_mixed_evidence() {
    let fx = Fixture::new();
    let store = fx.store.as_ref();
    let sprint = seed_sprint(store, 1, SprintStatus::Active, None).await.unwrap();
    let user = id("user1");

    seed_submission(store, &user, &sprint.id, "submitted").await.unwrap();
    seed_votes(store, &user, &sprint.id, 6).await.unwrap();
    seed_feedback(store, &user, &sprint.id, 1).await.unwrap();
    seed_xp(store, &user, &sprint.id, XpSource::ReadBrief, 10).await.unwrap();

    let completion = fx
        .engine
        .tasks()
        .sprint_task_completion(sprint.id.as_str(), "user1")
        .await
        .unwrap();

    assert_eq!(flags(&completion), vec![true, true, true, false, false]);
    assert_eq!(completion.completed_count, 3);
    assert_eq!(completion.total_xp, 80);
    assert_eq!(completion.max_xp, DEFAULT_MAX_TASK_XP);
}

#[tokio::test]
async fn evidence_is_scoped_to_user_and_sprint() {
    let fx = Fixture::new();
    let store = fx.store.as_ref();
    let sprint = seed_sprint(store, 1, SprintStatus::Active, None).await.unwrap();
    let other_sprint = seed_sprint(store, 2, SprintStatus::Completed, None).await.unwrap();
    let user = id("user1");

    seed_submission(store, &user, &sprint.id, "draft").await.unwrap();
    seed_submission(store, &user, &other_sprint.id, "submitted").await.unwrap();
    seed_votes(store, &id("user2"), &sprint.id, 9).await.unwrap();
    seed_xp(store, &user, &other_sprint.id, XpSource::Reflection, 15).await.unwrap();

    let completion = fx
        .engine
        .tasks()
        .sprint_task_completion(sprint.id.as_str(), "user1")
        .await
        .unwrap();
    assert_eq!(completion.completed_count, 0);
    assert_eq!(completion, TaskCompletion::empty(fx.engine.tasks().table()));
}

#[tokio::test]
async fn malformed_ids_are_rejected() {
    let fx = Fixture::new();
    let tasks = fx.engine.tasks();

    let err = tasks.sprint_task_completion("", "user1").await.unwrap_err();
    assert!(matches!(err, SprintError::InvalidId { field: "sprint_id", .. }));

    let err = tasks
        .sprint_task_completion("sprint1", "user 1")
        .await
        .unwrap_err();
    assert!(matches!(err, SprintError::InvalidId { field: "user_id", .. }));
}

#[tokio::test]
async fn failed_evidence_counts_as_not_done() {
    let fx = FaultyFixture::new();
    let store = fx.store.as_ref();
    let sprint = seed_sprint(store, 1, SprintStatus::Active, None).await.unwrap();
    let user = id("user1");
    seed_votes(store, &user, &sprint.id, 5).await.unwrap();
    seed_feedback(store, &user, &sprint.id, 3).await.unwrap();

    fx.store.fail("votes");
    let completion = fx
        .engine
        .tasks()
        .sprint_task_completion(sprint.id.as_str(), "user1")
        .await
        .unwrap();

    assert!(!completion.is_done(TaskId::Vote));
    assert!(completion.is_done(TaskId::Feedback));
    assert_eq!(completion.completed_count, 1);
}

#[tokio::test]
async fn active_checklist_requires_participation() {
    let fx = Fixture::new();
    let store = fx.store.as_ref();
    let tasks = fx.engine.tasks();
    let user = id("user1");

    // no active sprint
    let completion = tasks.active_task_completion("user1").await.unwrap();
    assert_eq!(completion.completed_count, 0);

    let sprint = seed_sprint(store, 1, SprintStatus::Active, None).await.unwrap();
    seed_xp(store, &user, &sprint.id, XpSource::ReadBrief, 10).await.unwrap();

    // active sprint, not joined
    let completion = tasks.active_task_completion("user1").await.unwrap();
    assert_eq!(completion.completed_count, 0);

    seed_participant(store, &sprint.id, &user).await.unwrap();
    let completion = tasks.active_task_completion("user1").await.unwrap();
    assert!(completion.is_done(TaskId::ReadBrief));
    assert_eq!(completion.total_xp, 10);
}

#[tokio::test]
async fn configured_thresholds_apply() {
    let mut config = EngineConfig::default();
    config.tasks.vote_threshold = 2;
    config.tasks.xp.vote = 40;
    let fx = Fixture::with_config(config);
    let store = fx.store.as_ref();
    let sprint = seed_sprint(store, 1, SprintStatus::Active, None).await.unwrap();
    seed_votes(store, &id("user1"), &sprint.id, 2).await.unwrap();

    let completion = fx
        .engine
        .tasks()
        .sprint_task_completion(sprint.id.as_str(), "user1")
        .await
        .unwrap();
    assert!(completion.is_done(TaskId::Vote));
    assert_eq!(completion.total_xp, 40);
    assert_eq!(completion.max_xp, 145);
}
