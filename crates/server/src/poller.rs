//! Availability poller: remote unavailability feeds -> local status cache.

use crate::state::AppState;
use corral_metadata::MetadataResult;
use serde::Serialize;
use time::OffsetDateTime;

/// Counters for one poll cycle.
#[derive(Debug, Default, Serialize)]
pub struct PollStats {
    pub repos: usize,
    pub rows_updated: u64,
    pub errors: usize,
}

/// Run one availability poll cycle.
///
/// Availability is global, so a single designated account (the lowest-id
/// active one) fetches every repository's feed. For each linked repo the
/// cycle upserts the cached status of commits named by the feed, then flips
/// cached rows of commits the feed no longer names back to `available`.
/// Running the same cycle twice against the same feed is a no-op the second
/// time. A failing repo is logged and skipped; the cycle continues.
pub async fn run_poll_cycle(state: &AppState) -> MetadataResult<PollStats> {
    let mut stats = PollStats::default();

    let Some(account) = state.metadata.first_active_account().await? else {
        tracing::warn!("no active account available, skipping availability poll");
        return Ok(stats);
    };

    let repos = state.metadata.list_linked_repos().await?;
    let batch_size = state.config.sync.batch_size;

    for repo in repos {
        let Some(remote_repo_id) = repo.remote_repo_id.as_deref() else {
            continue;
        };

        let client = match state.remote_client(&account) {
            Ok(client) => client,
            Err(err) => {
                tracing::error!(repo_id = repo.id, error = %err, "remote client construction failed");
                stats.errors += 1;
                continue;
            }
        };

        let feed = match client.list_unavailable(remote_repo_id).await {
            Ok(feed) => feed,
            Err(err) => {
                tracing::warn!(
                    repo_id = repo.id,
                    repo = %repo.full_name,
                    error = %err,
                    "feed fetch failed, skipping repo"
                );
                stats.errors += 1;
                continue;
            }
        };

        match apply_feed(state, repo.id, &feed, batch_size).await {
            Ok(updated) => {
                stats.repos += 1;
                stats.rows_updated += updated;
                tracing::debug!(repo_id = repo.id, updated, "availability feed applied");
            }
            Err(err) => {
                tracing::error!(repo_id = repo.id, error = %err, "feed application failed");
                stats.errors += 1;
            }
        }
    }

    tracing::info!(
        repos = stats.repos,
        rows_updated = stats.rows_updated,
        errors = stats.errors,
        "availability poll cycle finished"
    );
    Ok(stats)
}

async fn apply_feed(
    state: &AppState,
    repo_id: i64,
    feed: &corral_remote::UnavailableFeed,
    batch_size: usize,
) -> MetadataResult<u64> {
    let now = OffsetDateTime::now_utc();
    let hashes = state.metadata.list_hashes_for_repo(repo_id).await?;

    let mut updated = 0u64;
    let mut absent = Vec::new();
    for row in &hashes {
        match feed.get(&row.base_commit) {
            Some(entry) => {
                state
                    .metadata
                    .upsert_status(row.id, entry.status, entry.expires_at, now)
                    .await?;
                updated += 1;
            }
            None => absent.push(row.id),
        }
    }

    // Commits the feed stopped naming are available again. Only cached rows
    // are touched; absence of a row already means available.
    for chunk in absent.chunks(batch_size.max(1)) {
        updated += state.metadata.mark_available(chunk, now).await?;
    }

    Ok(updated)
}
