//! Sync scheduler: periodic poll and reconcile cycles plus on-demand
//! triggers for the admin surface.
//!
//! An explicit value constructed at startup and carried in `AppState`; no
//! global singleton. Overlapping runs of the same job are skipped, not
//! queued.

use crate::poller::{self, PollStats};
use crate::reconciler::{self, ReconcileStats};
use crate::state::AppState;
use corral_core::config::SyncConfig;
use corral_metadata::MetadataResult;
use serde::Serialize;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct JobState {
    running: bool,
    last_run_at: Option<OffsetDateTime>,
    last_outcome: Option<String>,
}

/// Reported run-state of one job.
#[derive(Debug, Serialize)]
pub struct JobStatus {
    pub enabled: bool,
    pub interval_secs: u64,
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_outcome: Option<String>,
}

/// Scheduler status for operators.
#[derive(Debug, Serialize)]
pub struct SyncStatus {
    pub poll: JobStatus,
    pub reconcile: JobStatus,
}

pub struct SyncScheduler {
    sync: SyncConfig,
    poll: Mutex<JobState>,
    reconcile: Mutex<JobState>,
}

impl SyncScheduler {
    pub fn new(sync: SyncConfig) -> Self {
        Self {
            sync,
            poll: Mutex::new(JobState::default()),
            reconcile: Mutex::new(JobState::default()),
        }
    }

    /// Spawn one timer loop per enabled job. The loops run for the life of
    /// the process.
    pub fn start(self: &Arc<Self>, state: AppState) {
        if self.sync.poll_enabled {
            let scheduler = Arc::clone(self);
            let state = state.clone();
            let interval = self.sync.poll_interval();
            tokio::spawn(async move {
                tracing::info!(interval_secs = interval.as_secs(), "availability poller scheduled");
                loop {
                    tokio::time::sleep(interval).await;
                    if let Err(err) = scheduler.trigger_poll(&state).await {
                        tracing::error!(error = %err, "scheduled poll cycle failed");
                    }
                }
            });
        } else {
            tracing::info!("availability poller disabled");
        }

        if self.sync.reconcile_enabled {
            let scheduler = Arc::clone(self);
            let interval = self.sync.reconcile_interval();
            tokio::spawn(async move {
                tracing::info!(
                    interval_secs = interval.as_secs(),
                    "reservation reconciler scheduled"
                );
                loop {
                    tokio::time::sleep(interval).await;
                    if let Err(err) = scheduler.trigger_reconcile(&state).await {
                        tracing::error!(error = %err, "scheduled reconcile cycle failed");
                    }
                }
            });
        } else {
            tracing::info!("reservation reconciler disabled");
        }
    }

    /// Run a poll cycle now. Returns `None` when one is already running.
    pub async fn trigger_poll(&self, state: &AppState) -> MetadataResult<Option<PollStats>> {
        {
            let mut job = self.poll.lock().await;
            if job.running {
                tracing::debug!("poll cycle already running, skipping");
                return Ok(None);
            }
            job.running = true;
        }

        let result = poller::run_poll_cycle(state).await;
        let mut job = self.poll.lock().await;
        job.running = false;
        job.last_run_at = Some(OffsetDateTime::now_utc());
        match result {
            Ok(stats) => {
                job.last_outcome = Some(format!(
                    "ok: {} repos, {} rows, {} errors",
                    stats.repos, stats.rows_updated, stats.errors
                ));
                Ok(Some(stats))
            }
            Err(err) => {
                job.last_outcome = Some(format!("failed: {err}"));
                Err(err)
            }
        }
    }

    /// Run a reconcile cycle now. Returns `None` when one is already running.
    pub async fn trigger_reconcile(
        &self,
        state: &AppState,
    ) -> MetadataResult<Option<ReconcileStats>> {
        {
            let mut job = self.reconcile.lock().await;
            if job.running {
                tracing::debug!("reconcile cycle already running, skipping");
                return Ok(None);
            }
            job.running = true;
        }

        let result = reconciler::run_reconcile_cycle(state).await;
        let mut job = self.reconcile.lock().await;
        job.running = false;
        job.last_run_at = Some(OffsetDateTime::now_utc());
        match result {
            Ok(stats) => {
                job.last_outcome = Some(format!(
                    "ok: {} accounts, {} synced, {} updated, {} errors",
                    stats.accounts, stats.synced, stats.updated, stats.errors
                ));
                Ok(Some(stats))
            }
            Err(err) => {
                job.last_outcome = Some(format!("failed: {err}"));
                Err(err)
            }
        }
    }

    pub async fn status(&self) -> SyncStatus {
        let poll = self.poll.lock().await;
        let reconcile = self.reconcile.lock().await;
        SyncStatus {
            poll: JobStatus {
                enabled: self.sync.poll_enabled,
                interval_secs: self.sync.poll_interval().as_secs(),
                running: poll.running,
                last_run_at: poll.last_run_at.map(format_ts),
                last_outcome: poll.last_outcome.clone(),
            },
            reconcile: JobStatus {
                enabled: self.sync.reconcile_enabled,
                interval_secs: self.sync.reconcile_interval().as_secs(),
                running: reconcile.running,
                last_run_at: reconcile.last_run_at.map(format_ts),
                last_outcome: reconcile.last_outcome.clone(),
            },
        }
    }
}

fn format_ts(ts: OffsetDateTime) -> String {
    ts.format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| ts.to_string())
}
