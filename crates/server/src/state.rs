//! Application state shared across handlers and engine components.

use crate::scheduler::SyncScheduler;
use corral_core::config::AppConfig;
use corral_metadata::MetadataStore;
use corral_metadata::models::AccountRow;
use corral_remote::{RemoteClaimClient, RemoteResult};
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Metadata store.
    pub metadata: Arc<dyn MetadataStore>,
    /// Shared outbound HTTP client; pools connections across all accounts.
    pub http: reqwest::Client,
    /// Sync scheduler, exposed through the admin surface.
    pub scheduler: Arc<SyncScheduler>,
}

impl AppState {
    pub fn new(config: AppConfig, metadata: Arc<dyn MetadataStore>) -> Self {
        let scheduler = Arc::new(SyncScheduler::new(config.sync.clone()));
        Self {
            config: Arc::new(config),
            metadata,
            http: reqwest::Client::new(),
            scheduler,
        }
    }

    /// Remote client for one account. The account's `api_url` wins over the
    /// configured default.
    pub fn remote_client(&self, account: &AccountRow) -> RemoteResult<RemoteClaimClient> {
        let base_url = account
            .api_url
            .as_deref()
            .unwrap_or(&self.config.remote.default_base_url);
        RemoteClaimClient::new(
            self.http.clone(),
            base_url,
            &account.api_token,
            self.config.remote.timeout(),
        )
    }
}
