mod common;

use common::{seed_commit, seed_repo, seed_user_with_account, test_state};
use corral_server::poller::run_poll_cycle;
use httpmock::Method::GET;
use httpmock::MockServer;
use serde_json::json;

#[tokio::test]
async fn poll_cycle_caches_feed_statuses() {
    let remote = MockServer::start();
    let (_temp, state) = test_state(&remote.base_url()).await;

    seed_user_with_account(&state.metadata, "alice").await;
    let repo = seed_repo(&state.metadata, "42").await;
    let listed = seed_commit(&state.metadata, repo.id, "merged-1", "aaaaaaa1").await;
    let absent = seed_commit(&state.metadata, repo.id, "merged-2", "bbbbbbb2").await;

    remote.mock(|when, then| {
        when.method(GET).path("/api/repos/42/unavailable-commits");
        then.status(200).json_body(json!([
            { "commit_hash": "aaaaaaa1", "status": "paid_out" },
        ]));
    });

    let stats = run_poll_cycle(&state).await.unwrap();
    assert_eq!(stats.repos, 1);
    assert_eq!(stats.errors, 0);

    let cached = state.metadata.get_status(listed.id).await.unwrap().unwrap();
    assert_eq!(cached.status, "paid_out");
    // Absent from the feed and never cached: stays row-less (= available).
    assert!(state.metadata.get_status(absent.id).await.unwrap().is_none());
}

#[tokio::test]
async fn commit_dropped_from_feed_becomes_available() {
    let remote = MockServer::start();
    let (_temp, state) = test_state(&remote.base_url()).await;

    seed_user_with_account(&state.metadata, "alice").await;
    let repo = seed_repo(&state.metadata, "42").await;
    let commit = seed_commit(&state.metadata, repo.id, "merged-1", "aaaaaaa1").await;

    let mut first = remote.mock(|when, then| {
        when.method(GET).path("/api/repos/42/unavailable-commits");
        then.status(200)
            .json_body(json!([{ "commit_hash": "aaaaaaa1", "status": "paid_out" }]));
    });
    run_poll_cycle(&state).await.unwrap();
    first.delete();

    // The remote stops listing the commit; the next cycle flips it back.
    remote.mock(|when, then| {
        when.method(GET).path("/api/repos/42/unavailable-commits");
        then.status(200).json_body(json!([]));
    });
    run_poll_cycle(&state).await.unwrap();

    let cached = state.metadata.get_status(commit.id).await.unwrap().unwrap();
    assert_eq!(cached.status, "available");
    assert!(cached.expires_at.is_none());
}

#[tokio::test]
async fn poll_cycle_is_idempotent() {
    let remote = MockServer::start();
    let (_temp, state) = test_state(&remote.base_url()).await;

    seed_user_with_account(&state.metadata, "alice").await;
    let repo = seed_repo(&state.metadata, "42").await;
    let commit = seed_commit(&state.metadata, repo.id, "merged-1", "aaaaaaa1").await;

    remote.mock(|when, then| {
        when.method(GET).path("/api/repos/42/unavailable-commits");
        then.status(200)
            .header("content-type", "text/csv")
            .body("commit_hash,status\naaaaaaa1,in_distribution\n");
    });

    run_poll_cycle(&state).await.unwrap();
    let after_first = state.metadata.get_status(commit.id).await.unwrap().unwrap();
    run_poll_cycle(&state).await.unwrap();
    let after_second = state.metadata.get_status(commit.id).await.unwrap().unwrap();

    assert_eq!(after_first.status, "in_distribution");
    assert_eq!(after_second.status, "in_distribution");
}

#[tokio::test]
async fn failing_repo_is_skipped_not_fatal() {
    let remote = MockServer::start();
    let (_temp, state) = test_state(&remote.base_url()).await;

    seed_user_with_account(&state.metadata, "alice").await;
    let broken = state
        .metadata
        .create_repo("broken", "org/broken", Some("13"))
        .await
        .unwrap();
    let healthy = seed_repo(&state.metadata, "42").await;
    let commit = seed_commit(&state.metadata, healthy.id, "merged-1", "aaaaaaa1").await;
    let _ = broken;

    remote.mock(|when, then| {
        when.method(GET).path("/api/repos/13/unavailable-commits");
        then.status(500).body("boom");
    });
    remote.mock(|when, then| {
        when.method(GET).path("/api/repos/42/unavailable-commits");
        then.status(200)
            .json_body(json!([{ "commit_hash": "aaaaaaa1", "status": "too_easy" }]));
    });

    let stats = run_poll_cycle(&state).await.unwrap();
    assert_eq!(stats.errors, 1);
    assert_eq!(stats.repos, 1);

    let cached = state.metadata.get_status(commit.id).await.unwrap().unwrap();
    assert_eq!(cached.status, "too_easy");
}

#[tokio::test]
async fn no_active_account_skips_cycle() {
    let remote = MockServer::start();
    let (_temp, state) = test_state(&remote.base_url()).await;
    seed_repo(&state.metadata, "42").await;

    let stats = run_poll_cycle(&state).await.unwrap();
    assert_eq!(stats.repos, 0);
    assert_eq!(stats.errors, 0);
}
