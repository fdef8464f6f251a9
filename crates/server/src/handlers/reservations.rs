//! Reservation endpoints.

use crate::error::ApiResult;
use crate::handlers::common::require_user;
use crate::lifecycle::{BulkSummary, LifecycleCoordinator};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use corral_metadata::models::ReservationRow;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

fn coordinator(state: &AppState) -> LifecycleCoordinator {
    LifecycleCoordinator::new(
        state.metadata.clone(),
        state.http.clone(),
        &state.config.remote,
    )
}

#[derive(Debug, Serialize)]
pub struct ReservationResponse {
    pub id: i64,
    pub account_id: i64,
    pub commit_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_reservation_id: Option<String>,
    pub status: String,
    pub priority: i64,
    pub reserved_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub released_at: Option<String>,
}

impl From<ReservationRow> for ReservationResponse {
    fn from(row: ReservationRow) -> Self {
        Self {
            id: row.id,
            account_id: row.account_id,
            commit_id: row.commit_id,
            remote_reservation_id: row.remote_reservation_id,
            status: row.status,
            priority: row.priority,
            reserved_at: format_ts(row.reserved_at),
            expires_at: row.expires_at.map(format_ts),
            released_at: row.released_at.map(format_ts),
        }
    }
}

fn format_ts(ts: OffsetDateTime) -> String {
    ts.format(&Rfc3339).unwrap_or_else(|_| ts.to_string())
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ListReservationsResponse {
    pub reservations: Vec<ReservationResponse>,
}

pub async fn list_reservations(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<ListReservationsResponse>> {
    let user_id = require_user(&headers)?;
    let limit = query.limit.unwrap_or(50).min(500);
    let rows = state
        .metadata
        .list_for_user(
            user_id,
            query.status.as_deref(),
            limit,
            query.offset.unwrap_or(0),
        )
        .await?;
    Ok(Json(ListReservationsResponse {
        reservations: rows.into_iter().map(Into::into).collect(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct ClaimRequest {
    pub account_id: i64,
    pub commit_id: i64,
}

pub async fn claim_reservation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ClaimRequest>,
) -> ApiResult<(StatusCode, Json<ReservationResponse>)> {
    let user_id = require_user(&headers)?;
    let row = coordinator(&state)
        .claim(user_id, request.account_id, request.commit_id)
        .await?;
    Ok((StatusCode::CREATED, Json(row.into())))
}

pub async fn release_reservation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(reservation_id): Path<i64>,
) -> ApiResult<Json<ReservationResponse>> {
    let user_id = require_user(&headers)?;
    let row = coordinator(&state).release(user_id, reservation_id).await?;
    Ok(Json(row.into()))
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub account_id: i64,
}

pub async fn transfer_reservation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(reservation_id): Path<i64>,
    Json(request): Json<TransferRequest>,
) -> ApiResult<Json<ReservationResponse>> {
    let user_id = require_user(&headers)?;
    let row = coordinator(&state)
        .transfer(user_id, reservation_id, request.account_id)
        .await?;
    Ok(Json(row.into()))
}

#[derive(Debug, Deserialize)]
pub struct GiftRequest {
    pub receiver_user_id: i64,
    pub receiver_account_id: i64,
}

pub async fn gift_reservation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(reservation_id): Path<i64>,
    Json(request): Json<GiftRequest>,
) -> ApiResult<Json<ReservationResponse>> {
    let user_id = require_user(&headers)?;
    let row = coordinator(&state)
        .gift(
            user_id,
            reservation_id,
            request.receiver_user_id,
            request.receiver_account_id,
        )
        .await?;
    Ok(Json(row.into()))
}

#[derive(Debug, Deserialize)]
pub struct BulkClaimRequest {
    pub account_id: i64,
    pub commit_ids: Vec<i64>,
}

pub async fn bulk_claim(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<BulkClaimRequest>,
) -> ApiResult<Json<BulkSummary>> {
    let user_id = require_user(&headers)?;
    let summary = coordinator(&state)
        .bulk_claim(user_id, request.account_id, &request.commit_ids)
        .await?;
    Ok(Json(summary))
}
