//! Metadata store trait and the SQLite implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::repos::{
    AccountRepo, AuditRepo, CommitRepo, RepoRepo, ReservationRepo, StatusCacheRepo, UserRepo,
};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore:
    UserRepo
    + AccountRepo
    + RepoRepo
    + CommitRepo
    + StatusCacheRepo
    + ReservationRepo
    + AuditRepo
    + Send
    + Sync
{
    /// Run database migrations.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Create a new SQLite store and run migrations.
    pub async fn new(path: impl AsRef<Path>) -> MetadataResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| MetadataError::Internal(format!("create {}: {e}", parent.display())))?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // SQLite permits limited write concurrency; a single connection avoids
            // persistent "database is locked" failures under axum concurrency.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

mod sqlite_impl {
    use super::*;
    use crate::models::*;
    use crate::repos::commits::NewCommit;
    use crate::repos::reservations::{NewReservation, SyncedReservation};
    use std::collections::HashMap;
    use time::OffsetDateTime;

    // SQLite caps bound parameters around 999 per statement.
    const BATCH_SIZE: usize = 900;

    #[async_trait]
    impl UserRepo for SqliteStore {
        async fn create_user(
            &self,
            username: &str,
            is_approved: bool,
            is_admin: bool,
        ) -> MetadataResult<UserRow> {
            let now = OffsetDateTime::now_utc();
            let result = sqlx::query(
                "INSERT INTO users (username, is_approved, is_admin, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(username)
            .bind(is_approved)
            .bind(is_admin)
            .bind(now)
            .execute(&self.pool)
            .await?;

            let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = ?")
                .bind(result.last_insert_rowid())
                .fetch_one(&self.pool)
                .await?;
            Ok(row)
        }

        async fn get_user(&self, user_id: i64) -> MetadataResult<Option<UserRow>> {
            let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = ?")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn list_approved_users(&self) -> MetadataResult<Vec<UserRow>> {
            let rows =
                sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE is_approved = 1 ORDER BY id")
                    .fetch_all(&self.pool)
                    .await?;
            Ok(rows)
        }
    }

    #[async_trait]
    impl AccountRepo for SqliteStore {
        async fn create_account(
            &self,
            user_id: i64,
            account_name: &str,
            api_token: &str,
            api_url: Option<&str>,
        ) -> MetadataResult<AccountRow> {
            let now = OffsetDateTime::now_utc();
            let result = sqlx::query(
                r#"
                INSERT INTO accounts (user_id, account_name, api_token, api_url, is_active, created_at, updated_at)
                VALUES (?, ?, ?, ?, 1, ?, ?)
                "#,
            )
            .bind(user_id)
            .bind(account_name)
            .bind(api_token)
            .bind(api_url)
            .bind(now)
            .bind(now)
            .execute(&self.pool)
            .await?;

            let row = sqlx::query_as::<_, AccountRow>("SELECT * FROM accounts WHERE id = ?")
                .bind(result.last_insert_rowid())
                .fetch_one(&self.pool)
                .await?;
            Ok(row)
        }

        async fn get_account(&self, account_id: i64) -> MetadataResult<Option<AccountRow>> {
            let row = sqlx::query_as::<_, AccountRow>("SELECT * FROM accounts WHERE id = ?")
                .bind(account_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn list_active_accounts_for_user(
            &self,
            user_id: i64,
        ) -> MetadataResult<Vec<AccountRow>> {
            let rows = sqlx::query_as::<_, AccountRow>(
                "SELECT * FROM accounts WHERE user_id = ? AND is_active = 1 ORDER BY id",
            )
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn first_active_account(&self) -> MetadataResult<Option<AccountRow>> {
            let row = sqlx::query_as::<_, AccountRow>(
                "SELECT * FROM accounts WHERE is_active = 1 ORDER BY id LIMIT 1",
            )
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn touch_last_used(
            &self,
            account_id: i64,
            used_at: OffsetDateTime,
        ) -> MetadataResult<()> {
            sqlx::query("UPDATE accounts SET last_used_at = ?, updated_at = ? WHERE id = ?")
                .bind(used_at)
                .bind(used_at)
                .bind(account_id)
                .execute(&self.pool)
                .await?;
            Ok(())
        }
    }

    #[async_trait]
    impl RepoRepo for SqliteStore {
        async fn create_repo(
            &self,
            repo_name: &str,
            full_name: &str,
            remote_repo_id: Option<&str>,
        ) -> MetadataResult<RepoRow> {
            let now = OffsetDateTime::now_utc();
            let result = sqlx::query(
                "INSERT INTO repos (repo_name, full_name, remote_repo_id, is_active, created_at) VALUES (?, ?, ?, 1, ?)",
            )
            .bind(repo_name)
            .bind(full_name)
            .bind(remote_repo_id)
            .bind(now)
            .execute(&self.pool)
            .await?;

            let row = sqlx::query_as::<_, RepoRow>("SELECT * FROM repos WHERE id = ?")
                .bind(result.last_insert_rowid())
                .fetch_one(&self.pool)
                .await?;
            Ok(row)
        }

        async fn get_repo(&self, repo_id: i64) -> MetadataResult<Option<RepoRow>> {
            let row = sqlx::query_as::<_, RepoRow>("SELECT * FROM repos WHERE id = ?")
                .bind(repo_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn list_linked_repos(&self) -> MetadataResult<Vec<RepoRow>> {
            let rows = sqlx::query_as::<_, RepoRow>(
                "SELECT * FROM repos WHERE is_active = 1 AND remote_repo_id IS NOT NULL ORDER BY id",
            )
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }
    }

    #[async_trait]
    impl CommitRepo for SqliteStore {
        async fn insert_commit(&self, commit: &NewCommit) -> MetadataResult<CommitRow> {
            let result = sqlx::query(
                r#"
                INSERT INTO commits (
                    repo_id, merged_commit, base_commit, source_sha,
                    file_changes, additions, deletions,
                    habitat_score, difficulty_score, suitability_score
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(commit.repo_id)
            .bind(&commit.merged_commit)
            .bind(&commit.base_commit)
            .bind(&commit.source_sha)
            .bind(commit.file_changes)
            .bind(commit.additions)
            .bind(commit.deletions)
            .bind(commit.habitat_score)
            .bind(commit.difficulty_score)
            .bind(commit.suitability_score)
            .execute(&self.pool)
            .await?;

            let row = sqlx::query_as::<_, CommitRow>("SELECT * FROM commits WHERE id = ?")
                .bind(result.last_insert_rowid())
                .fetch_one(&self.pool)
                .await?;
            Ok(row)
        }

        async fn get_commit(&self, commit_id: i64) -> MetadataResult<Option<CommitRow>> {
            let row = sqlx::query_as::<_, CommitRow>("SELECT * FROM commits WHERE id = ?")
                .bind(commit_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn find_by_repo_and_base(
            &self,
            repo_id: i64,
            base_commit: &str,
        ) -> MetadataResult<Option<CommitRow>> {
            let row = sqlx::query_as::<_, CommitRow>(
                "SELECT * FROM commits WHERE repo_id = ? AND base_commit = ?",
            )
            .bind(repo_id)
            .bind(base_commit)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn list_hashes_for_repo(&self, repo_id: i64) -> MetadataResult<Vec<CommitHashRow>> {
            let rows = sqlx::query_as::<_, CommitHashRow>(
                "SELECT id, base_commit FROM commits WHERE repo_id = ?",
            )
            .bind(repo_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn find_by_base_prefix(&self, prefix: &str) -> MetadataResult<Vec<CommitRow>> {
            // Hashes are hex, so the prefix never carries LIKE metacharacters.
            let rows = sqlx::query_as::<_, CommitRow>(
                "SELECT * FROM commits WHERE base_commit LIKE ? ORDER BY id",
            )
            .bind(format!("{prefix}%"))
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn list_by_base_in(
            &self,
            hashes: &[String],
            repo_id: Option<i64>,
        ) -> MetadataResult<Vec<CommitRow>> {
            if hashes.is_empty() {
                return Ok(Vec::new());
            }

            let mut result = Vec::with_capacity(hashes.len());
            for batch in hashes.chunks(BATCH_SIZE) {
                let placeholders: Vec<&str> = batch.iter().map(|_| "?").collect();
                let query = match repo_id {
                    Some(_) => format!(
                        "SELECT * FROM commits WHERE repo_id = ? AND base_commit IN ({})",
                        placeholders.join(", ")
                    ),
                    None => format!(
                        "SELECT * FROM commits WHERE base_commit IN ({})",
                        placeholders.join(", ")
                    ),
                };

                let mut query_builder = sqlx::query_as::<_, CommitRow>(&query);
                if let Some(id) = repo_id {
                    query_builder = query_builder.bind(id);
                }
                for hash in batch {
                    query_builder = query_builder.bind(hash);
                }

                result.extend(query_builder.fetch_all(&self.pool).await?);
            }
            Ok(result)
        }

        async fn list_root_hashes(&self, repo_id: i64) -> MetadataResult<Vec<String>> {
            let rows: Vec<(String,)> = sqlx::query_as(
                r#"
                SELECT base_commit FROM commits
                WHERE repo_id = ?
                  AND base_commit NOT IN (
                    SELECT merged_commit FROM commits WHERE repo_id = ?
                  )
                ORDER BY id
                "#,
            )
            .bind(repo_id)
            .bind(repo_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows.into_iter().map(|(h,)| h).collect())
        }

        async fn set_unsuitable(
            &self,
            commit_id: i64,
            is_unsuitable: bool,
            reason: Option<&str>,
        ) -> MetadataResult<()> {
            let result = sqlx::query(
                "UPDATE commits SET is_unsuitable = ?, unsuitable_reason = ? WHERE id = ?",
            )
            .bind(is_unsuitable)
            .bind(reason)
            .bind(commit_id)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!("commit {commit_id} not found")));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl StatusCacheRepo for SqliteStore {
        async fn upsert_status(
            &self,
            commit_id: i64,
            status: corral_core::CommitStatus,
            expires_at: Option<OffsetDateTime>,
            checked_at: OffsetDateTime,
        ) -> MetadataResult<()> {
            sqlx::query(
                r#"
                INSERT INTO commit_status_cache (commit_id, status, expires_at, checked_at)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(commit_id) DO UPDATE SET
                    status = excluded.status,
                    expires_at = excluded.expires_at,
                    checked_at = excluded.checked_at
                "#,
            )
            .bind(commit_id)
            .bind(status.as_str())
            .bind(expires_at)
            .bind(checked_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn mark_available(
            &self,
            commit_ids: &[i64],
            checked_at: OffsetDateTime,
        ) -> MetadataResult<u64> {
            if commit_ids.is_empty() {
                return Ok(0);
            }

            let mut changed = 0u64;
            for batch in commit_ids.chunks(BATCH_SIZE) {
                let placeholders: Vec<&str> = batch.iter().map(|_| "?").collect();
                let query = format!(
                    "UPDATE commit_status_cache
                     SET status = 'available', expires_at = NULL, checked_at = ?
                     WHERE status != 'available' AND commit_id IN ({})",
                    placeholders.join(", ")
                );

                let mut query_builder = sqlx::query(&query).bind(checked_at);
                for id in batch {
                    query_builder = query_builder.bind(id);
                }

                changed += query_builder.execute(&self.pool).await?.rows_affected();
            }
            Ok(changed)
        }

        async fn get_status(&self, commit_id: i64) -> MetadataResult<Option<StatusCacheRow>> {
            let row = sqlx::query_as::<_, StatusCacheRow>(
                "SELECT * FROM commit_status_cache WHERE commit_id = ?",
            )
            .bind(commit_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn get_statuses_batch(
            &self,
            commit_ids: &[i64],
        ) -> MetadataResult<HashMap<i64, StatusCacheRow>> {
            if commit_ids.is_empty() {
                return Ok(HashMap::new());
            }

            let mut result = HashMap::with_capacity(commit_ids.len());
            for batch in commit_ids.chunks(BATCH_SIZE) {
                let placeholders: Vec<&str> = batch.iter().map(|_| "?").collect();
                let query = format!(
                    "SELECT * FROM commit_status_cache WHERE commit_id IN ({})",
                    placeholders.join(", ")
                );

                let mut query_builder = sqlx::query_as::<_, StatusCacheRow>(&query);
                for id in batch {
                    query_builder = query_builder.bind(id);
                }

                let rows: Vec<StatusCacheRow> = query_builder.fetch_all(&self.pool).await?;
                for row in rows {
                    result.insert(row.commit_id, row);
                }
            }
            Ok(result)
        }
    }

    #[async_trait]
    impl ReservationRepo for SqliteStore {
        async fn create_reserved(
            &self,
            reservation: &NewReservation,
        ) -> MetadataResult<ReservationRow> {
            let now = OffsetDateTime::now_utc();
            let result = sqlx::query(
                r#"
                INSERT INTO reservations (
                    user_id, account_id, commit_id, remote_reservation_id,
                    status, priority, reserved_at, expires_at, created_at, updated_at
                ) VALUES (?, ?, ?, ?, 'reserved', ?, ?, ?, ?, ?)
                "#,
            )
            .bind(reservation.user_id)
            .bind(reservation.account_id)
            .bind(reservation.commit_id)
            .bind(&reservation.remote_reservation_id)
            .bind(reservation.priority)
            .bind(reservation.reserved_at)
            .bind(reservation.expires_at)
            .bind(now)
            .bind(now)
            .execute(&self.pool)
            .await?;

            let row = sqlx::query_as::<_, ReservationRow>("SELECT * FROM reservations WHERE id = ?")
                .bind(result.last_insert_rowid())
                .fetch_one(&self.pool)
                .await?;
            Ok(row)
        }

        async fn get_reservation(
            &self,
            reservation_id: i64,
        ) -> MetadataResult<Option<ReservationRow>> {
            let row = sqlx::query_as::<_, ReservationRow>("SELECT * FROM reservations WHERE id = ?")
                .bind(reservation_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn find_live_for_commit(
            &self,
            commit_id: i64,
        ) -> MetadataResult<Option<ReservationRow>> {
            let row = sqlx::query_as::<_, ReservationRow>(
                "SELECT * FROM reservations WHERE commit_id = ? AND status = 'reserved'",
            )
            .bind(commit_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn mark_released(
            &self,
            reservation_id: i64,
            released_at: OffsetDateTime,
        ) -> MetadataResult<()> {
            let result = sqlx::query(
                r#"
                UPDATE reservations
                SET status = 'released',
                    released_at = COALESCE(released_at, ?),
                    updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(released_at)
            .bind(released_at)
            .bind(reservation_id)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!(
                    "reservation {reservation_id} not found"
                )));
            }
            Ok(())
        }

        async fn upsert_synced(&self, synced: &SyncedReservation) -> MetadataResult<bool> {
            let now = OffsetDateTime::now_utc();
            let mut tx = self.pool.begin().await?;

            let existing: Option<(i64,)> = sqlx::query_as(
                "SELECT id FROM reservations
                 WHERE user_id = ? AND commit_id = ? AND remote_reservation_id = ?",
            )
            .bind(synced.user_id)
            .bind(synced.commit_id)
            .bind(&synced.remote_reservation_id)
            .fetch_optional(&mut *tx)
            .await?;

            let inserted = match existing {
                Some((id,)) => {
                    sqlx::query(
                        "UPDATE reservations
                         SET status = ?, expires_at = ?, released_at = ?, updated_at = ?
                         WHERE id = ?",
                    )
                    .bind(synced.status)
                    .bind(synced.expires_at)
                    .bind(synced.released_at)
                    .bind(now)
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                    false
                }
                None => {
                    sqlx::query(
                        r#"
                        INSERT INTO reservations (
                            user_id, account_id, commit_id, remote_reservation_id,
                            status, priority, reserved_at, expires_at, released_at,
                            created_at, updated_at
                        ) VALUES (?, ?, ?, ?, ?, 0, ?, ?, ?, ?, ?)
                        "#,
                    )
                    .bind(synced.user_id)
                    .bind(synced.account_id)
                    .bind(synced.commit_id)
                    .bind(&synced.remote_reservation_id)
                    .bind(synced.status)
                    .bind(synced.reserved_at)
                    .bind(synced.expires_at)
                    .bind(synced.released_at)
                    .bind(now)
                    .bind(now)
                    .execute(&mut *tx)
                    .await?;
                    true
                }
            };

            tx.commit().await?;
            Ok(inserted)
        }

        async fn list_for_user(
            &self,
            user_id: i64,
            status: Option<&str>,
            limit: u32,
            offset: u32,
        ) -> MetadataResult<Vec<ReservationRow>> {
            let rows = match status {
                Some(status) => {
                    sqlx::query_as::<_, ReservationRow>(
                        "SELECT * FROM reservations WHERE user_id = ? AND status = ?
                         ORDER BY reserved_at DESC LIMIT ? OFFSET ?",
                    )
                    .bind(user_id)
                    .bind(status)
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(&self.pool)
                    .await?
                }
                None => {
                    sqlx::query_as::<_, ReservationRow>(
                        "SELECT * FROM reservations WHERE user_id = ?
                         ORDER BY reserved_at DESC LIMIT ? OFFSET ?",
                    )
                    .bind(user_id)
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(&self.pool)
                    .await?
                }
            };
            Ok(rows)
        }
    }

    #[async_trait]
    impl AuditRepo for SqliteStore {
        async fn append_audit(&self, entry: &NewAuditEntry) -> MetadataResult<i64> {
            let metadata = match &entry.metadata {
                Some(value) => Some(
                    serde_json::to_string(value)
                        .map_err(|e| MetadataError::Internal(format!("audit metadata: {e}")))?,
                ),
                None => None,
            };
            let outcome = if entry.success { "success" } else { "failure" };

            let result = sqlx::query(
                r#"
                INSERT INTO reservation_audit_log (
                    reservation_id, user_id, account_id, commit_id,
                    action, outcome, error_message, metadata, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(entry.reservation_id)
            .bind(entry.user_id)
            .bind(entry.account_id)
            .bind(entry.commit_id)
            .bind(entry.action.as_str())
            .bind(outcome)
            .bind(&entry.error_message)
            .bind(&metadata)
            .bind(OffsetDateTime::now_utc())
            .execute(&self.pool)
            .await?;

            Ok(result.last_insert_rowid())
        }

        async fn list_audit_for_user(
            &self,
            user_id: i64,
            limit: u32,
        ) -> MetadataResult<Vec<AuditLogRow>> {
            let rows = sqlx::query_as::<_, AuditLogRow>(
                "SELECT * FROM reservation_audit_log WHERE user_id = ?
                 ORDER BY created_at DESC, id DESC LIMIT ?",
            )
            .bind(user_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AuditAction, NewAuditEntry};
    use crate::repos::commits::NewCommit;
    use crate::repos::reservations::{NewReservation, SyncedReservation};
    use corral_core::CommitStatus;
    use time::OffsetDateTime;

    async fn test_store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::new(dir.path().join("test.db")).await.unwrap();
        (dir, store)
    }

    fn commit(repo_id: i64, merged: &str, base: &str) -> NewCommit {
        NewCommit {
            repo_id,
            merged_commit: merged.to_string(),
            base_commit: base.to_string(),
            habitat_score: 100,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn migrate_is_idempotent() {
        let (_dir, store) = test_store().await;
        store.migrate().await.unwrap();
        store.migrate().await.unwrap();
        store.health_check().await.unwrap();
    }

    #[tokio::test]
    async fn create_and_get_user() {
        let (_dir, store) = test_store().await;
        let user = store.create_user("alice", true, false).await.unwrap();
        assert!(user.is_approved);
        assert!(!user.is_admin);

        let fetched = store.get_user(user.id).await.unwrap().unwrap();
        assert_eq!(fetched.username, "alice");
    }

    #[tokio::test]
    async fn first_active_account_is_lowest_id() {
        let (_dir, store) = test_store().await;
        let user = store.create_user("alice", true, false).await.unwrap();
        let first = store
            .create_account(user.id, "one", "tok-1", None)
            .await
            .unwrap();
        store
            .create_account(user.id, "two", "tok-2", None)
            .await
            .unwrap();

        let designated = store.first_active_account().await.unwrap().unwrap();
        assert_eq!(designated.id, first.id);
    }

    #[tokio::test]
    async fn second_live_reservation_for_commit_is_rejected() {
        let (_dir, store) = test_store().await;
        let user = store.create_user("alice", true, false).await.unwrap();
        let account = store
            .create_account(user.id, "one", "tok", None)
            .await
            .unwrap();
        let repo = store.create_repo("r", "o/r", Some("42")).await.unwrap();
        let c = store
            .insert_commit(&commit(repo.id, "aaa111", "bbb222"))
            .await
            .unwrap();

        let now = OffsetDateTime::now_utc();
        let new = NewReservation {
            user_id: user.id,
            account_id: account.id,
            commit_id: c.id,
            remote_reservation_id: Some("r-1".to_string()),
            priority: 50,
            reserved_at: now,
            expires_at: None,
        };
        let first = store.create_reserved(&new).await.unwrap();
        assert_eq!(first.status, "reserved");

        let err = store.create_reserved(&new).await.unwrap_err();
        assert!(err.is_unique_violation());

        // Releasing the live row frees the commit for a new claim.
        store.mark_released(first.id, now).await.unwrap();
        store.create_reserved(&new).await.unwrap();
    }

    #[tokio::test]
    async fn mark_released_preserves_first_release_time() {
        let (_dir, store) = test_store().await;
        let user = store.create_user("alice", true, false).await.unwrap();
        let account = store
            .create_account(user.id, "one", "tok", None)
            .await
            .unwrap();
        let repo = store.create_repo("r", "o/r", Some("42")).await.unwrap();
        let c = store
            .insert_commit(&commit(repo.id, "aaa111", "bbb222"))
            .await
            .unwrap();

        let t1 = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let t2 = OffsetDateTime::from_unix_timestamp(1_700_000_100).unwrap();
        let row = store
            .create_reserved(&NewReservation {
                user_id: user.id,
                account_id: account.id,
                commit_id: c.id,
                remote_reservation_id: None,
                priority: 0,
                reserved_at: t1,
                expires_at: None,
            })
            .await
            .unwrap();

        store.mark_released(row.id, t1).await.unwrap();
        store.mark_released(row.id, t2).await.unwrap();

        let fetched = store.get_reservation(row.id).await.unwrap().unwrap();
        assert_eq!(fetched.released_at, Some(t1));
    }

    #[tokio::test]
    async fn upsert_synced_never_duplicates() {
        let (_dir, store) = test_store().await;
        let user = store.create_user("alice", true, false).await.unwrap();
        let account = store
            .create_account(user.id, "one", "tok", None)
            .await
            .unwrap();
        let repo = store.create_repo("r", "o/r", Some("42")).await.unwrap();
        let c = store
            .insert_commit(&commit(repo.id, "aaa111", "bbb222"))
            .await
            .unwrap();

        let now = OffsetDateTime::now_utc();
        let synced = SyncedReservation {
            user_id: user.id,
            account_id: account.id,
            commit_id: c.id,
            remote_reservation_id: "remote-9".to_string(),
            status: "reserved",
            reserved_at: now,
            expires_at: None,
            released_at: None,
        };

        assert!(store.upsert_synced(&synced).await.unwrap());
        assert!(!store.upsert_synced(&synced).await.unwrap());

        let rows = store
            .list_for_user(user.id, None, 10, 0)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn mark_available_only_flips_existing_rows() {
        let (_dir, store) = test_store().await;
        let repo = store.create_repo("r", "o/r", Some("42")).await.unwrap();
        let c1 = store
            .insert_commit(&commit(repo.id, "m1", "b1"))
            .await
            .unwrap();
        let c2 = store
            .insert_commit(&commit(repo.id, "m2", "b2"))
            .await
            .unwrap();
        let c3 = store
            .insert_commit(&commit(repo.id, "m3", "b3"))
            .await
            .unwrap();

        let now = OffsetDateTime::now_utc();
        store
            .upsert_status(c1.id, CommitStatus::PaidOut, None, now)
            .await
            .unwrap();
        store
            .upsert_status(c2.id, CommitStatus::Available, None, now)
            .await
            .unwrap();

        let changed = store
            .mark_available(&[c1.id, c2.id, c3.id], now)
            .await
            .unwrap();
        assert_eq!(changed, 1);

        let row = store.get_status(c1.id).await.unwrap().unwrap();
        assert_eq!(row.status, "available");
        assert!(row.expires_at.is_none());
        // Absent rows already mean available; none is created.
        assert!(store.get_status(c3.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn root_hashes_exclude_merged_targets() {
        let (_dir, store) = test_store().await;
        let repo = store.create_repo("r", "o/r", Some("42")).await.unwrap();
        // chain: b1 <- m1(=b2's base ancestor) , b2 merged from m1
        store
            .insert_commit(&commit(repo.id, "m1", "b1"))
            .await
            .unwrap();
        store
            .insert_commit(&commit(repo.id, "m2", "m1"))
            .await
            .unwrap();

        let roots = store.list_root_hashes(repo.id).await.unwrap();
        assert_eq!(roots, vec!["b1".to_string()]);
    }

    #[tokio::test]
    async fn audit_entries_list_newest_first() {
        let (_dir, store) = test_store().await;
        let user = store.create_user("alice", true, false).await.unwrap();

        for i in 0..3 {
            store
                .append_audit(&NewAuditEntry {
                    reservation_id: None,
                    user_id: user.id,
                    account_id: None,
                    commit_id: None,
                    action: AuditAction::Reserve,
                    success: true,
                    error_message: None,
                    metadata: Some(serde_json::json!({ "n": i })),
                })
                .await
                .unwrap();
        }

        let rows = store.list_audit_for_user(user.id, 2).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].id > rows[1].id);
    }
}
