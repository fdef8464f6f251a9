//! Handler helpers shared across endpoints.

use crate::error::ApiError;
use crate::state::AppState;
use axum::http::HeaderMap;

/// Header carrying the authenticated user id, set by the fronting proxy.
pub const USER_HEADER: &str = "x-corral-user";

/// Resolve the caller's user id from the proxy header.
pub fn require_user(headers: &HeaderMap) -> Result<i64, ApiError> {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i64>().ok())
        .ok_or_else(|| ApiError::Unauthorized(format!("missing or invalid {USER_HEADER} header")))
}

/// Resolve the caller and verify admin rights against the store.
pub async fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<i64, ApiError> {
    let user_id = require_user(headers)?;
    let user = state
        .metadata
        .get_user(user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized(format!("unknown user {user_id}")))?;
    if !user.is_admin {
        return Err(ApiError::Forbidden("admin rights required".to_string()));
    }
    Ok(user_id)
}
