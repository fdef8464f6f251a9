//! Database models mapping to the metadata schema.

use sqlx::FromRow;
use time::OffsetDateTime;

// =============================================================================
// Users and remote accounts
// =============================================================================

/// Local user record.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub is_approved: bool,
    pub is_admin: bool,
    pub created_at: OffsetDateTime,
}

/// A credential set against the remote claim service.
///
/// A user may hold several accounts; each is a distinct remote identity
/// with its own claim quota.
#[derive(Debug, Clone, FromRow)]
pub struct AccountRow {
    pub id: i64,
    pub user_id: i64,
    pub account_name: String,
    pub api_token: String,
    /// Remote base URL; falls back to the configured default when absent.
    pub api_url: Option<String>,
    pub is_active: bool,
    pub last_used_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

// =============================================================================
// Repositories and commits (owned by the ingestion pipeline)
// =============================================================================

/// Tracked source repository.
#[derive(Debug, Clone, FromRow)]
pub struct RepoRow {
    pub id: i64,
    pub repo_name: String,
    pub full_name: String,
    /// Identifier of this repository on the remote claim service.
    /// Repositories without one are skipped by the poller.
    pub remote_repo_id: Option<String>,
    pub is_active: bool,
    pub created_at: OffsetDateTime,
}

/// Commit record. Identity is (repo_id, base_commit).
#[derive(Debug, Clone, FromRow)]
pub struct CommitRow {
    pub id: i64,
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
    pub is_unsuitable: bool,
    pub unsuitable_reason: Option<String>,
    pub commit_date: Option<OffsetDateTime>,
}

/// Lightweight (id, base hash) projection used by the poller, which only
/// needs to match feed hashes against local commits.
#[derive(Debug, Clone, FromRow)]
pub struct CommitHashRow {
    pub id: i64,
    pub base_commit: String,
}

// =============================================================================
// Availability cache
// =============================================================================

/// Cached remote availability of one commit. Global, one row per commit;
/// a missing row means `available`.
#[derive(Debug, Clone, FromRow)]
pub struct StatusCacheRow {
    pub commit_id: i64,
    pub status: String,
    pub expires_at: Option<OffsetDateTime>,
    pub checked_at: OffsetDateTime,
}

// =============================================================================
// Reservations
// =============================================================================

/// Reservation lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationStatus {
    Reserved,
    Released,
    Failed,
    Expired,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reserved => "reserved",
            Self::Released => "released",
            Self::Failed => "failed",
            Self::Expired => "expired",
        }
    }
}

/// Local reservation record. Rows are never hard-deleted; release,
/// transfer, expiry, and sync all mutate status in place so the history
/// stays auditable.
#[derive(Debug, Clone, FromRow)]
pub struct ReservationRow {
    pub id: i64,
    pub user_id: i64,
    pub account_id: i64,
    pub commit_id: i64,
    /// Identifier on the remote claim service; null until a remote claim
    /// succeeds, and null for rows created before sync learned the id.
    pub remote_reservation_id: Option<String>,
    pub status: String,
    pub priority: i64,
    pub reserved_at: OffsetDateTime,
    pub expires_at: Option<OffsetDateTime>,
    pub released_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

// =============================================================================
// Audit log
// =============================================================================

/// Audit actions recorded by the lifecycle coordinator and reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Reserve,
    Cancel,
    Expire,
    Sync,
    Error,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reserve => "reserve",
            Self::Cancel => "cancel",
            Self::Expire => "expire",
            Self::Sync => "sync",
            Self::Error => "error",
        }
    }
}

/// Append-only audit record. `outcome` is "success" or "failure".
#[derive(Debug, Clone, FromRow)]
pub struct AuditLogRow {
    pub id: i64,
    pub reservation_id: Option<i64>,
    pub user_id: i64,
    pub account_id: Option<i64>,
    pub commit_id: Option<i64>,
    pub action: String,
    pub outcome: String,
    pub error_message: Option<String>,
    /// Free-form JSON context (remote ids, batch positions, etc.).
    pub metadata: Option<String>,
    pub created_at: OffsetDateTime,
}

/// New audit entry, before the store assigns an id and timestamp.
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub reservation_id: Option<i64>,
    pub user_id: i64,
    pub account_id: Option<i64>,
    pub commit_id: Option<i64>,
    pub action: AuditAction,
    pub success: bool,
    pub error_message: Option<String>,
    pub metadata: Option<serde_json::Value>,
}
