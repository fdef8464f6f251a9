//! Tracked repository repository.

use crate::error::MetadataResult;
use crate::models::RepoRow;
use async_trait::async_trait;

#[async_trait]
pub trait RepoRepo: Send + Sync {
    async fn create_repo(
        &self,
        repo_name: &str,
        full_name: &str,
        remote_repo_id: Option<&str>,
    ) -> MetadataResult<RepoRow>;

    async fn get_repo(&self, repo_id: i64) -> MetadataResult<Option<RepoRow>>;

    /// Active repositories that carry a remote identifier, i.e. the set the
    /// poller and reconciler operate on.
    async fn list_linked_repos(&self) -> MetadataResult<Vec<RepoRow>>;
}
