//! Reservation repository.

use crate::error::MetadataResult;
use crate::models::ReservationRow;
use async_trait::async_trait;
use time::OffsetDateTime;

/// Fields for a reservation created by a successful remote claim.
#[derive(Debug, Clone)]
pub struct NewReservation {
    pub user_id: i64,
    pub account_id: i64,
    pub commit_id: i64,
    pub remote_reservation_id: Option<String>,
    pub priority: i64,
    pub reserved_at: OffsetDateTime,
    pub expires_at: Option<OffsetDateTime>,
}

/// A remote reservation as seen by the reconciler, keyed by
/// (user_id, commit_id, remote_reservation_id).
#[derive(Debug, Clone)]
pub struct SyncedReservation {
    pub user_id: i64,
    pub account_id: i64,
    pub commit_id: i64,
    pub remote_reservation_id: String,
    pub status: &'static str,
    pub reserved_at: OffsetDateTime,
    pub expires_at: Option<OffsetDateTime>,
    pub released_at: Option<OffsetDateTime>,
}

#[async_trait]
pub trait ReservationRepo: Send + Sync {
    /// Insert a `reserved` row. Fails with a unique violation when a live
    /// reservation already exists for the commit; that index, not this
    /// call's precondition check, is the authoritative double-claim guard.
    async fn create_reserved(&self, reservation: &NewReservation)
        -> MetadataResult<ReservationRow>;

    async fn get_reservation(&self, reservation_id: i64)
        -> MetadataResult<Option<ReservationRow>>;

    /// The live (`reserved`) row for a commit, if any.
    async fn find_live_for_commit(&self, commit_id: i64)
        -> MetadataResult<Option<ReservationRow>>;

    /// Transition a row to `released`. Idempotent: releasing an already
    /// released row leaves its original released_at untouched.
    async fn mark_released(
        &self,
        reservation_id: i64,
        released_at: OffsetDateTime,
    ) -> MetadataResult<()>;

    /// Idempotent upsert used by the reconciler, keyed by
    /// (user_id, commit_id, remote_reservation_id). Returns true when a new
    /// row was inserted, false when an existing row was updated. A reused
    /// remote id after a release/reclaim pair produces a fresh row; a
    /// resync of the same remote id never duplicates.
    async fn upsert_synced(&self, synced: &SyncedReservation) -> MetadataResult<bool>;

    async fn list_for_user(
        &self,
        user_id: i64,
        status: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> MetadataResult<Vec<ReservationRow>>;
}
