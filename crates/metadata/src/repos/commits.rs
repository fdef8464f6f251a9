//! Commit repository.
//!
//! Commits are owned by the ingestion pipeline; the engine reads them and
//! only ever writes the unsuitable flag.

use crate::error::MetadataResult;
use crate::models::{CommitHashRow, CommitRow};
use async_trait::async_trait;

/// Fields the ingestion pipeline supplies for a new commit.
#[derive(Debug, Clone, Default)]
pub struct NewCommit {
    pub repo_id: i64,
    pub merged_commit: String,
    pub base_commit: String,
    pub source_sha: Option<String>,
    pub file_changes: i64,
    pub additions: i64,
    pub deletions: i64,
    pub habitat_score: i64,
    pub difficulty_score: Option<f64>,
    pub suitability_score: Option<f64>,
}

#[async_trait]
pub trait CommitRepo: Send + Sync {
    async fn insert_commit(&self, commit: &NewCommit) -> MetadataResult<CommitRow>;

    async fn get_commit(&self, commit_id: i64) -> MetadataResult<Option<CommitRow>>;

    async fn find_by_repo_and_base(
        &self,
        repo_id: i64,
        base_commit: &str,
    ) -> MetadataResult<Option<CommitRow>>;

    /// (id, base hash) projection of every commit in a repository, for
    /// matching against an availability feed.
    async fn list_hashes_for_repo(&self, repo_id: i64) -> MetadataResult<Vec<CommitHashRow>>;

    /// Commits whose base hash starts with `prefix`.
    async fn find_by_base_prefix(&self, prefix: &str) -> MetadataResult<Vec<CommitRow>>;

    /// Commits whose base hash is in `hashes`, optionally restricted to one
    /// repository. Batched internally to bound statement size.
    async fn list_by_base_in(
        &self,
        hashes: &[String],
        repo_id: Option<i64>,
    ) -> MetadataResult<Vec<CommitRow>>;

    /// Base hashes of a repository that never appear as another commit's
    /// merged hash: the local roots of the commit chain graph.
    async fn list_root_hashes(&self, repo_id: i64) -> MetadataResult<Vec<String>>;

    async fn set_unsuitable(
        &self,
        commit_id: i64,
        is_unsuitable: bool,
        reason: Option<&str>,
    ) -> MetadataResult<()>;
}
