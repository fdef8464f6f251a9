//! Test fixtures: a temp-file SQLite store, an app state pointed at a mock
//! remote, and seed helpers for users/accounts/repos/commits.

use corral_core::config::AppConfig;
use corral_metadata::models::{AccountRow, CommitRow, RepoRow, UserRow};
use corral_metadata::repos::commits::NewCommit;
use corral_metadata::{MetadataStore, SqliteStore};
use corral_server::AppState;
use std::sync::Arc;
use tempfile::TempDir;

/// Build an `AppState` whose remote default base URL points at `remote_url`
/// (typically an httpmock server). Background jobs are disabled.
pub async fn test_state(remote_url: &str) -> (TempDir, AppState) {
    let temp = tempfile::tempdir().unwrap();
    let db_path = temp.path().join("corral.db");
    let metadata: Arc<dyn MetadataStore> = Arc::new(SqliteStore::new(&db_path).await.unwrap());

    let mut config = AppConfig::for_testing();
    config.remote.default_base_url = remote_url.to_string();

    let state = AppState::new(config, metadata);
    (temp, state)
}

/// One approved user with one active account.
#[allow(dead_code)]
pub async fn seed_user_with_account(
    metadata: &Arc<dyn MetadataStore>,
    username: &str,
) -> (UserRow, AccountRow) {
    let user = metadata.create_user(username, true, false).await.unwrap();
    let account = metadata
        .create_account(user.id, &format!("{username}-main"), "test-token", None)
        .await
        .unwrap();
    (user, account)
}

#[allow(dead_code)]
pub async fn seed_admin(metadata: &Arc<dyn MetadataStore>, username: &str) -> UserRow {
    metadata.create_user(username, true, true).await.unwrap()
}

#[allow(dead_code)]
pub async fn seed_repo(metadata: &Arc<dyn MetadataStore>, remote_repo_id: &str) -> RepoRow {
    metadata
        .create_repo("demo", "org/demo", Some(remote_repo_id))
        .await
        .unwrap()
}

/// Insert a commit linking `base -> merged` with fixed display scores.
#[allow(dead_code)]
pub async fn seed_commit(
    metadata: &Arc<dyn MetadataStore>,
    repo_id: i64,
    merged: &str,
    base: &str,
) -> CommitRow {
    metadata
        .insert_commit(&NewCommit {
            repo_id,
            merged_commit: merged.to_string(),
            base_commit: base.to_string(),
            source_sha: None,
            file_changes: 2,
            additions: 120,
            deletions: 10,
            habitat_score: 150,
            difficulty_score: Some(60.0),
            suitability_score: Some(0.7),
        })
        .await
        .unwrap()
}
