//! Admin sync endpoints.

use crate::error::ApiResult;
use crate::handlers::common::require_admin;
use crate::scheduler::SyncStatus;
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use serde::Serialize;

pub async fn sync_status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<SyncStatus>> {
    require_admin(&state, &headers).await?;
    Ok(Json(state.scheduler.status().await))
}

#[derive(Debug, Serialize)]
pub struct TriggerResponse<T: Serialize> {
    pub triggered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<T>,
}

pub async fn trigger_poll(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<TriggerResponse<crate::poller::PollStats>>> {
    require_admin(&state, &headers).await?;
    let stats = state.scheduler.trigger_poll(&state).await?;
    Ok(Json(TriggerResponse {
        triggered: stats.is_some(),
        stats,
    }))
}

pub async fn trigger_reconcile(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<TriggerResponse<crate::reconciler::ReconcileStats>>> {
    require_admin(&state, &headers).await?;
    let stats = state.scheduler.trigger_reconcile(&state).await?;
    Ok(Json(TriggerResponse {
        triggered: stats.is_some(),
        stats,
    }))
}
