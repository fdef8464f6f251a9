//! User repository.

use crate::error::MetadataResult;
use crate::models::UserRow;
use async_trait::async_trait;

#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Create a user and return the stored row.
    async fn create_user(
        &self,
        username: &str,
        is_approved: bool,
        is_admin: bool,
    ) -> MetadataResult<UserRow>;

    async fn get_user(&self, user_id: i64) -> MetadataResult<Option<UserRow>>;

    /// Users eligible for reservation sync.
    async fn list_approved_users(&self) -> MetadataResult<Vec<UserRow>>;
}
