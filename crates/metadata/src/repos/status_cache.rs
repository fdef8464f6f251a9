//! Commit availability cache repository.

use crate::error::MetadataResult;
use crate::models::StatusCacheRow;
use async_trait::async_trait;
use corral_core::CommitStatus;
use std::collections::HashMap;
use time::OffsetDateTime;

#[async_trait]
pub trait StatusCacheRepo: Send + Sync {
    /// Idempotent upsert of one commit's cached status. Repeated application
    /// of the same feed row converges on the same cache row.
    async fn upsert_status(
        &self,
        commit_id: i64,
        status: CommitStatus,
        expires_at: Option<OffsetDateTime>,
        checked_at: OffsetDateTime,
    ) -> MetadataResult<()>;

    /// Flip existing non-available rows back to `available`, clearing the
    /// expiry. Only touches rows that exist; absence already means
    /// available. Returns the number of rows changed.
    async fn mark_available(
        &self,
        commit_ids: &[i64],
        checked_at: OffsetDateTime,
    ) -> MetadataResult<u64>;

    async fn get_status(&self, commit_id: i64) -> MetadataResult<Option<StatusCacheRow>>;

    /// Batched status lookup for chain display.
    async fn get_statuses_batch(
        &self,
        commit_ids: &[i64],
    ) -> MetadataResult<HashMap<i64, StatusCacheRow>>;
}
