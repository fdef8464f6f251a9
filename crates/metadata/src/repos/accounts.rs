//! Remote account repository.

use crate::error::MetadataResult;
use crate::models::AccountRow;
use async_trait::async_trait;
use time::OffsetDateTime;

#[async_trait]
pub trait AccountRepo: Send + Sync {
    async fn create_account(
        &self,
        user_id: i64,
        account_name: &str,
        api_token: &str,
        api_url: Option<&str>,
    ) -> MetadataResult<AccountRow>;

    async fn get_account(&self, account_id: i64) -> MetadataResult<Option<AccountRow>>;

    async fn list_active_accounts_for_user(&self, user_id: i64)
        -> MetadataResult<Vec<AccountRow>>;

    /// The designated polling account: availability is global, so one
    /// identity suffices. Lowest-id active account wins.
    async fn first_active_account(&self) -> MetadataResult<Option<AccountRow>>;

    async fn touch_last_used(
        &self,
        account_id: i64,
        used_at: OffsetDateTime,
    ) -> MetadataResult<()>;
}
