//! Parsing of the remote unavailability feed.
//!
//! The remote serves the feed either as CSV (`hash,status[,expires_at]`,
//! line 1 optionally a header) or as a JSON array of objects carrying the
//! same fields. Either way it is reduced to a typed map keyed by commit
//! hash; a commit absent from the map is available.

use crate::{RemoteError, RemoteResult};
use corral_core::CommitStatus;
use serde::Deserialize;
use std::collections::HashMap;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// One feed row, already mapped into the local status vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub status: CommitStatus,
    pub expires_at: Option<OffsetDateTime>,
}

/// Unavailability feed for one repository, keyed by full commit hash.
pub type UnavailableFeed = HashMap<String, FeedEntry>;

#[derive(Debug, Deserialize)]
struct JsonFeedRow {
    commit_hash: String,
    status: String,
    #[serde(default)]
    expires_at: Option<String>,
}

pub fn parse_json(body: &str) -> RemoteResult<UnavailableFeed> {
    let rows: Vec<JsonFeedRow> = serde_json::from_str(body).map_err(|e| RemoteError::Status {
        status: reqwest::StatusCode::OK,
        body: format!("unparseable JSON feed: {e}"),
    })?;

    let mut feed = UnavailableFeed::with_capacity(rows.len());
    for row in rows {
        feed.insert(
            row.commit_hash,
            FeedEntry {
                status: CommitStatus::from_remote(&row.status),
                expires_at: parse_expiry(row.expires_at.as_deref()),
            },
        );
    }
    Ok(feed)
}

/// CSV parsing is total: malformed rows are skipped, not fatal, so one bad
/// line never takes down a poll cycle.
pub fn parse_csv(body: &str) -> UnavailableFeed {
    let mut feed = UnavailableFeed::new();
    for (idx, line) in body.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if idx == 0 && line.to_ascii_lowercase().starts_with("commit_hash") {
            continue;
        }

        let mut fields = line.split(',');
        let (hash, status) = match (fields.next(), fields.next()) {
            (Some(hash), Some(status)) if !hash.trim().is_empty() => {
                (hash.trim().to_string(), status.trim())
            }
            _ => {
                tracing::debug!(line = idx + 1, "skipping malformed feed row");
                continue;
            }
        };
        let expires_at = parse_expiry(fields.next().map(str::trim));

        feed.insert(
            hash,
            FeedEntry {
                status: CommitStatus::from_remote(status),
                expires_at,
            },
        );
    }
    feed
}

fn parse_expiry(raw: Option<&str>) -> Option<OffsetDateTime> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    OffsetDateTime::parse(raw, &Rfc3339).ok()
}
