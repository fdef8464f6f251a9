//! Reservation audit log repository. Append-only.

use crate::error::MetadataResult;
use crate::models::{AuditLogRow, NewAuditEntry};
use async_trait::async_trait;

#[async_trait]
pub trait AuditRepo: Send + Sync {
    /// Append an audit entry and return its id.
    async fn append_audit(&self, entry: &NewAuditEntry) -> MetadataResult<i64>;

    async fn list_audit_for_user(
        &self,
        user_id: i64,
        limit: u32,
    ) -> MetadataResult<Vec<AuditLogRow>>;
}
