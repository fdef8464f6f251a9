//! Reservation lifecycle: claim, release, transfer, gift, bulk claim.
//!
//! Every operation is one remote call plus local writes. The ordering
//! invariant throughout: a successful remote claim is recorded as a local
//! reservation row before anything that may fail afterwards (audit writes,
//! last-used bookkeeping), so remote truth is never lost.

use corral_core::priority;
use corral_metadata::models::{AccountRow, AuditAction, CommitRow, NewAuditEntry, ReservationRow};
use corral_metadata::repos::NewReservation;
use corral_metadata::{MetadataError, MetadataStore};
use corral_remote::{RemoteClaimClient, RemoteError};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use time::OffsetDateTime;

/// Lifecycle operation rejections.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("commit is already reserved")]
    AlreadyReserved,

    #[error("account {0} not found")]
    AccountNotFound(i64),

    #[error("account {0} is not active")]
    AccountInactive(i64),

    #[error("account {0} does not belong to the caller")]
    AccountNotOwned(i64),

    #[error("commit {0} not found")]
    CommitNotFound(i64),

    #[error("reservation {0} not found")]
    ReservationNotFound(i64),

    #[error("repository {0} is not linked to the remote service")]
    RepoNotLinked(i64),

    #[error("cannot gift a reservation to yourself")]
    SelfGift,

    /// Remote rejection, body carried verbatim for display.
    #[error("remote claim service: {0}")]
    Remote(String),

    #[error(transparent)]
    Store(#[from] MetadataError),
}

/// Outcome of one commit in a bulk claim.
#[derive(Debug, Serialize)]
pub struct BulkOutcome {
    pub commit_id: i64,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reservation_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate result of a bulk claim.
#[derive(Debug, Serialize)]
pub struct BulkSummary {
    pub requested: usize,
    pub reserved: usize,
    pub failed: usize,
    pub outcomes: Vec<BulkOutcome>,
}

/// Coordinates reservation state across the remote service and the local
/// store.
pub struct LifecycleCoordinator {
    metadata: Arc<dyn MetadataStore>,
    http: reqwest::Client,
    default_base_url: String,
    timeout: std::time::Duration,
}

impl LifecycleCoordinator {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        http: reqwest::Client,
        remote: &corral_core::config::RemoteConfig,
    ) -> Self {
        Self {
            metadata,
            http,
            default_base_url: remote.default_base_url.clone(),
            timeout: remote.timeout(),
        }
    }

    fn client_for(&self, account: &AccountRow) -> Result<RemoteClaimClient, LifecycleError> {
        let base_url = account
            .api_url
            .as_deref()
            .unwrap_or(&self.default_base_url);
        RemoteClaimClient::new(self.http.clone(), base_url, &account.api_token, self.timeout)
            .map_err(|e| LifecycleError::Remote(e.to_string()))
    }

    /// Look up an account and verify it belongs to `user_id` and is active.
    async fn owned_active_account(
        &self,
        user_id: i64,
        account_id: i64,
    ) -> Result<AccountRow, LifecycleError> {
        let account = self
            .metadata
            .get_account(account_id)
            .await?
            .ok_or(LifecycleError::AccountNotFound(account_id))?;
        if account.user_id != user_id {
            return Err(LifecycleError::AccountNotOwned(account_id));
        }
        if !account.is_active {
            return Err(LifecycleError::AccountInactive(account_id));
        }
        Ok(account)
    }

    /// Claim a commit on the remote service and record the reservation.
    pub async fn claim(
        &self,
        user_id: i64,
        account_id: i64,
        commit_id: i64,
    ) -> Result<ReservationRow, LifecycleError> {
        let account = self.owned_active_account(user_id, account_id).await?;
        let commit = self
            .metadata
            .get_commit(commit_id)
            .await?
            .ok_or(LifecycleError::CommitNotFound(commit_id))?;
        let repo = self
            .metadata
            .get_repo(commit.repo_id)
            .await?
            .ok_or(LifecycleError::RepoNotLinked(commit.repo_id))?;
        let remote_repo_id = repo
            .remote_repo_id
            .as_deref()
            .ok_or(LifecycleError::RepoNotLinked(repo.id))?;

        // Advisory precheck; the partial unique index is the real guard.
        if self.metadata.find_live_for_commit(commit_id).await?.is_some() {
            return Err(LifecycleError::AlreadyReserved);
        }

        let client = self.client_for(&account)?;
        let claimed = match client.claim(remote_repo_id, &commit.base_commit).await {
            Ok(response) => response,
            Err(err) => {
                let message = remote_error_text(&err);
                self.audit_failure(user_id, &account, commit_id, AuditAction::Reserve, &message)
                    .await;
                return Err(LifecycleError::Remote(message));
            }
        };

        let now = OffsetDateTime::now_utc();
        let reservation = NewReservation {
            user_id,
            account_id: account.id,
            commit_id,
            remote_reservation_id: Some(claimed.reservation_id.clone()),
            priority: i64::from(score_commit(&commit)),
            reserved_at: now,
            expires_at: claimed.expires_at,
        };

        let row = match self.metadata.create_reserved(&reservation).await {
            Ok(row) => row,
            Err(err) if err.is_unique_violation() => {
                // Lost the race after the remote claim succeeded. Undo the
                // remote side so the commit is not held by a dangling claim.
                if let Err(release_err) = client.release(&claimed.reservation_id).await {
                    tracing::warn!(
                        remote_reservation_id = %claimed.reservation_id,
                        error = %release_err,
                        "failed to undo remote claim after local double-claim rejection"
                    );
                }
                return Err(LifecycleError::AlreadyReserved);
            }
            Err(err) => return Err(err.into()),
        };

        self.audit_success(
            user_id,
            &account,
            Some(row.id),
            commit_id,
            AuditAction::Reserve,
            serde_json::json!({ "remote_reservation_id": claimed.reservation_id }),
        )
        .await;

        if let Err(err) = self.metadata.touch_last_used(account.id, now).await {
            tracing::warn!(account_id = account.id, error = %err, "failed to update last_used_at");
        }

        Ok(row)
    }

    /// Release a reservation. The remote release is best effort; the local
    /// row always transitions to `released`.
    pub async fn release(
        &self,
        user_id: i64,
        reservation_id: i64,
    ) -> Result<ReservationRow, LifecycleError> {
        let reservation = self
            .metadata
            .get_reservation(reservation_id)
            .await?
            .ok_or(LifecycleError::ReservationNotFound(reservation_id))?;
        if reservation.user_id != user_id {
            return Err(LifecycleError::ReservationNotFound(reservation_id));
        }

        self.release_remote_best_effort(&reservation).await;

        let now = OffsetDateTime::now_utc();
        self.metadata.mark_released(reservation.id, now).await?;

        let account = self.metadata.get_account(reservation.account_id).await?;
        if let Some(account) = &account {
            self.audit_success(
                user_id,
                account,
                Some(reservation.id),
                reservation.commit_id,
                AuditAction::Cancel,
                serde_json::json!({}),
            )
            .await;
        }

        let updated = self
            .metadata
            .get_reservation(reservation.id)
            .await?
            .ok_or(LifecycleError::ReservationNotFound(reservation.id))?;
        Ok(updated)
    }

    /// Move a reservation to another of the caller's accounts. Releases the
    /// old reservation, then claims on the target; a failed re-claim is
    /// surfaced, never silently retried.
    pub async fn transfer(
        &self,
        user_id: i64,
        reservation_id: i64,
        target_account_id: i64,
    ) -> Result<ReservationRow, LifecycleError> {
        // Target validated up front so a bad target does not release anything.
        self.owned_active_account(user_id, target_account_id).await?;

        let released = self.release(user_id, reservation_id).await?;
        self.claim(user_id, target_account_id, released.commit_id)
            .await
    }

    /// Hand a reservation over to another user. Same release-then-claim
    /// shape as a transfer; the new reservation belongs to the receiver.
    pub async fn gift(
        &self,
        user_id: i64,
        reservation_id: i64,
        receiver_user_id: i64,
        receiver_account_id: i64,
    ) -> Result<ReservationRow, LifecycleError> {
        if receiver_user_id == user_id {
            return Err(LifecycleError::SelfGift);
        }
        self.owned_active_account(receiver_user_id, receiver_account_id)
            .await?;

        let released = self.release(user_id, reservation_id).await?;
        self.claim(receiver_user_id, receiver_account_id, released.commit_id)
            .await
    }

    /// Claim a batch of commits, strictly sequentially. One failure never
    /// aborts the batch; each commit gets its own outcome.
    pub async fn bulk_claim(
        &self,
        user_id: i64,
        account_id: i64,
        commit_ids: &[i64],
    ) -> Result<BulkSummary, LifecycleError> {
        // Validate once so a bad account fails the whole request up front.
        self.owned_active_account(user_id, account_id).await?;

        let mut outcomes = Vec::with_capacity(commit_ids.len());
        let mut reserved = 0usize;
        let mut failed = 0usize;

        for &commit_id in commit_ids {
            match self.claim(user_id, account_id, commit_id).await {
                Ok(row) => {
                    reserved += 1;
                    outcomes.push(BulkOutcome {
                        commit_id,
                        status: "reserved",
                        reservation_id: Some(row.id),
                        error: None,
                    });
                }
                Err(err) => {
                    failed += 1;
                    tracing::debug!(commit_id, error = %err, "bulk claim item failed");
                    outcomes.push(BulkOutcome {
                        commit_id,
                        status: "failed",
                        reservation_id: None,
                        error: Some(err.to_string()),
                    });
                }
            }
        }

        Ok(BulkSummary {
            requested: commit_ids.len(),
            reserved,
            failed,
            outcomes,
        })
    }

    async fn release_remote_best_effort(&self, reservation: &ReservationRow) {
        let Some(remote_id) = reservation.remote_reservation_id.as_deref() else {
            return;
        };
        let account = match self.metadata.get_account(reservation.account_id).await {
            Ok(Some(account)) => account,
            Ok(None) => {
                tracing::warn!(
                    account_id = reservation.account_id,
                    "reservation account missing, skipping remote release"
                );
                return;
            }
            Err(err) => {
                tracing::warn!(error = %err, "account lookup failed, skipping remote release");
                return;
            }
        };
        let client = match self.client_for(&account) {
            Ok(client) => client,
            Err(err) => {
                tracing::warn!(error = %err, "remote client construction failed");
                return;
            }
        };
        if let Err(err) = client.release(remote_id).await {
            tracing::warn!(
                reservation_id = reservation.id,
                remote_reservation_id = %remote_id,
                error = %err,
                "remote release failed, releasing locally anyway"
            );
        }
    }

    /// Audit writes never fail an operation; a failed write is logged and
    /// the operation's result stands.
    async fn audit_success(
        &self,
        user_id: i64,
        account: &AccountRow,
        reservation_id: Option<i64>,
        commit_id: i64,
        action: AuditAction,
        metadata: serde_json::Value,
    ) {
        let entry = NewAuditEntry {
            reservation_id,
            user_id,
            account_id: Some(account.id),
            commit_id: Some(commit_id),
            action,
            success: true,
            error_message: None,
            metadata: Some(metadata),
        };
        if let Err(err) = self.metadata.append_audit(&entry).await {
            tracing::error!(user_id, commit_id, error = %err, "audit write failed");
        }
    }

    async fn audit_failure(
        &self,
        user_id: i64,
        account: &AccountRow,
        commit_id: i64,
        action: AuditAction,
        message: &str,
    ) {
        let entry = NewAuditEntry {
            reservation_id: None,
            user_id,
            account_id: Some(account.id),
            commit_id: Some(commit_id),
            action,
            success: false,
            error_message: Some(message.to_string()),
            metadata: None,
        };
        if let Err(err) = self.metadata.append_audit(&entry).await {
            tracing::error!(user_id, commit_id, error = %err, "audit write failed");
        }
    }
}

fn score_commit(commit: &CommitRow) -> u8 {
    priority::score(
        commit.habitat_score as f64,
        commit.suitability_score,
        commit.difficulty_score,
        commit.file_changes,
        commit.additions,
    )
}

/// The remote's own message for status rejections, generic text otherwise.
fn remote_error_text(err: &RemoteError) -> String {
    match err {
        RemoteError::Status { body, status } if !body.is_empty() => {
            format!("{} ({})", body, status)
        }
        other => other.to_string(),
    }
}
