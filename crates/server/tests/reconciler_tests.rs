mod common;

use common::{seed_commit, seed_repo, seed_user_with_account, test_state};
use corral_server::reconciler::run_reconcile_cycle;
use httpmock::Method::GET;
use httpmock::MockServer;
use serde_json::json;

#[tokio::test]
async fn repeated_cycles_never_duplicate_rows() {
    let remote = MockServer::start();
    let (_temp, state) = test_state(&remote.base_url()).await;

    let (user, _account) = seed_user_with_account(&state.metadata, "alice").await;
    let repo = seed_repo(&state.metadata, "42").await;
    seed_commit(&state.metadata, repo.id, "merged-1", "aaaaaaa1").await;

    remote.mock(|when, then| {
        when.method(GET).path("/api/my-reservations");
        then.status(200).json_body(json!([
            {
                "id": "rsv-1",
                "repo_id": "42",
                "commit_hash": "aaaaaaa1",
                "reserved_at": "2026-08-01T00:00:00Z",
            },
        ]));
    });

    let first = run_reconcile_cycle(&state).await.unwrap();
    assert_eq!(first.synced, 1);
    assert_eq!(first.updated, 0);

    let second = run_reconcile_cycle(&state).await.unwrap();
    assert_eq!(second.synced, 0);
    assert_eq!(second.updated, 1);

    let rows = state
        .metadata
        .list_for_user(user.id, None, 10, 0)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].remote_reservation_id.as_deref(), Some("rsv-1"));
    assert_eq!(rows[0].status, "reserved");
}

#[tokio::test]
async fn released_remote_reservation_syncs_as_released() {
    let remote = MockServer::start();
    let (_temp, state) = test_state(&remote.base_url()).await;

    let (user, _account) = seed_user_with_account(&state.metadata, "alice").await;
    let repo = seed_repo(&state.metadata, "42").await;
    seed_commit(&state.metadata, repo.id, "merged-1", "aaaaaaa1").await;

    remote.mock(|when, then| {
        when.method(GET).path("/api/my-reservations");
        then.status(200).json_body(json!([
            {
                "id": "rsv-1",
                "repo_id": "42",
                "commit_hash": "aaaaaaa1",
                "reserved_at": "2026-08-01T00:00:00Z",
                "released_at": "2026-08-02T00:00:00Z",
            },
        ]));
    });

    run_reconcile_cycle(&state).await.unwrap();

    let rows = state
        .metadata
        .list_for_user(user.id, None, 10, 0)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, "released");
    assert!(rows[0].released_at.is_some());
}

#[tokio::test]
async fn unknown_repos_and_commits_are_skipped() {
    let remote = MockServer::start();
    let (_temp, state) = test_state(&remote.base_url()).await;

    let (user, _account) = seed_user_with_account(&state.metadata, "alice").await;
    let repo = seed_repo(&state.metadata, "42").await;
    seed_commit(&state.metadata, repo.id, "merged-1", "aaaaaaa1").await;

    remote.mock(|when, then| {
        when.method(GET).path("/api/my-reservations");
        then.status(200).json_body(json!([
            // Repo this instance does not track.
            {
                "id": "rsv-1",
                "repo_id": "999",
                "commit_hash": "aaaaaaa1",
                "reserved_at": "2026-08-01T00:00:00Z",
            },
            // Known repo, commit not ingested locally.
            {
                "id": "rsv-2",
                "repo_id": "42",
                "commit_hash": "fffffff0",
                "reserved_at": "2026-08-01T00:00:00Z",
            },
        ]));
    });

    let stats = run_reconcile_cycle(&state).await.unwrap();
    assert_eq!(stats.synced, 0);
    assert_eq!(stats.errors, 0);

    let rows = state
        .metadata
        .list_for_user(user.id, None, 10, 0)
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn account_failure_audited_and_cycle_continues() {
    let remote = MockServer::start();
    let (_temp, state) = test_state(&remote.base_url()).await;

    // Two users; the failing account must not block the second.
    let bad_remote = MockServer::start();
    let bad_user = state.metadata.create_user("alice", true, false).await.unwrap();
    state
        .metadata
        .create_account(bad_user.id, "broken", "bad-token", Some(&bad_remote.base_url()))
        .await
        .unwrap();

    let (good_user, _good_account) = seed_user_with_account(&state.metadata, "bob").await;
    let repo = seed_repo(&state.metadata, "42").await;
    seed_commit(&state.metadata, repo.id, "merged-1", "aaaaaaa1").await;

    remote.mock(|when, then| {
        when.method(GET).path("/api/my-reservations");
        then.status(200).json_body(json!([
            {
                "id": "rsv-9",
                "repo_id": "42",
                "commit_hash": "aaaaaaa1",
                "reserved_at": "2026-08-01T00:00:00Z",
            },
        ]));
    });
    bad_remote.mock(|when, then| {
        when.method(GET).path("/api/my-reservations");
        then.status(401).body("bad token");
    });

    let stats = run_reconcile_cycle(&state).await.unwrap();
    assert_eq!(stats.errors, 1);
    assert!(stats.synced >= 1);

    let audit = state
        .metadata
        .list_audit_for_user(bad_user.id, 10)
        .await
        .unwrap();
    assert!(audit.iter().any(|e| e.action == "sync" && e.outcome == "failure"));

    let rows = state
        .metadata
        .list_for_user(good_user.id, None, 10, 0)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
}
