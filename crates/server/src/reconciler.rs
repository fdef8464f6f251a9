//! Reservation reconciler: remote reservations -> local rows.
//!
//! Read-only toward the remote service. For every approved user's active
//! accounts the reconciler lists the account's remote reservations and
//! upserts them locally keyed by (user_id, commit_id, remote_reservation_id),
//! so re-running a cycle never duplicates rows.

use crate::state::AppState;
use corral_metadata::MetadataResult;
use corral_metadata::models::{AccountRow, AuditAction, NewAuditEntry, UserRow};
use corral_metadata::repos::SyncedReservation;
use serde::Serialize;
use std::collections::HashMap;

/// Counters for one reconcile cycle.
#[derive(Debug, Default, Serialize)]
pub struct ReconcileStats {
    pub accounts: usize,
    pub synced: usize,
    pub updated: usize,
    pub errors: usize,
}

/// Run one reconcile cycle over all approved users.
///
/// Account-level failures are audited and skipped; a single bad token never
/// aborts the cycle.
pub async fn run_reconcile_cycle(state: &AppState) -> MetadataResult<ReconcileStats> {
    let mut stats = ReconcileStats::default();

    // remote repo id -> local repo id, prefetched once per cycle.
    let repo_ids: HashMap<String, i64> = state
        .metadata
        .list_linked_repos()
        .await?
        .into_iter()
        .filter_map(|repo| repo.remote_repo_id.map(|remote| (remote, repo.id)))
        .collect();

    let users = state.metadata.list_approved_users().await?;
    for user in &users {
        let accounts = state.metadata.list_active_accounts_for_user(user.id).await?;
        for account in &accounts {
            stats.accounts += 1;
            if let Err(message) = reconcile_account(state, user, account, &repo_ids, &mut stats).await
            {
                stats.errors += 1;
                tracing::warn!(
                    user_id = user.id,
                    account_id = account.id,
                    error = %message,
                    "account reconcile failed"
                );
                audit_sync_failure(state, user.id, account.id, &message).await;
            }
        }
    }

    tracing::info!(
        accounts = stats.accounts,
        synced = stats.synced,
        updated = stats.updated,
        errors = stats.errors,
        "reservation reconcile cycle finished"
    );
    Ok(stats)
}

async fn reconcile_account(
    state: &AppState,
    user: &UserRow,
    account: &AccountRow,
    repo_ids: &HashMap<String, i64>,
    stats: &mut ReconcileStats,
) -> Result<(), String> {
    let client = state.remote_client(account).map_err(|e| e.to_string())?;
    let remote_reservations = client
        .list_my_reservations()
        .await
        .map_err(|e| e.to_string())?;

    for remote in remote_reservations {
        let Some(&repo_id) = repo_ids.get(&remote.repo_id) else {
            // Reservation against a repo this instance does not track.
            continue;
        };
        let commit = state
            .metadata
            .find_by_repo_and_base(repo_id, &remote.commit_hash)
            .await
            .map_err(|e| e.to_string())?;
        let Some(commit) = commit else {
            continue;
        };

        let status = if remote.released_at.is_some() {
            "released"
        } else {
            "reserved"
        };
        let synced = SyncedReservation {
            user_id: user.id,
            account_id: account.id,
            commit_id: commit.id,
            remote_reservation_id: remote.id.clone(),
            status,
            reserved_at: remote.reserved_at,
            expires_at: remote.expires_at,
            released_at: remote.released_at,
        };

        match state.metadata.upsert_synced(&synced).await {
            Ok(true) => stats.synced += 1,
            Ok(false) => stats.updated += 1,
            // A live local reservation by someone else holds the commit's
            // unique slot. Audited, not fatal.
            Err(err) if err.is_unique_violation() => {
                stats.errors += 1;
                tracing::warn!(
                    commit_id = commit.id,
                    remote_reservation_id = %remote.id,
                    "remote reservation conflicts with a live local one"
                );
                audit_sync_failure(
                    state,
                    user.id,
                    account.id,
                    &format!("commit {} already has a live local reservation", commit.id),
                )
                .await;
            }
            Err(err) => return Err(err.to_string()),
        }
    }

    Ok(())
}

async fn audit_sync_failure(state: &AppState, user_id: i64, account_id: i64, message: &str) {
    let entry = NewAuditEntry {
        reservation_id: None,
        user_id,
        account_id: Some(account_id),
        commit_id: None,
        action: AuditAction::Sync,
        success: false,
        error_message: Some(message.to_string()),
        metadata: None,
    };
    if let Err(err) = state.metadata.append_audit(&entry).await {
        tracing::error!(user_id, account_id, error = %err, "sync audit write failed");
    }
}
