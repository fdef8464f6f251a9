//! Chain reconstruction endpoint.

use crate::chain::{self, ChainSeed, ChainTree};
use crate::error::ApiResult;
use crate::handlers::common::require_user;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ChainQuery {
    pub base: Option<String>,
    pub repo_id: Option<i64>,
    pub max_depth: Option<u32>,
}

pub async fn get_chain(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ChainQuery>,
) -> ApiResult<Json<ChainTree>> {
    require_user(&headers)?;
    let seed = ChainSeed {
        base_prefix: query.base,
        repo_id: query.repo_id,
        max_depth: query.max_depth,
    };
    let tree = chain::build_chain(state.metadata.as_ref(), &seed).await?;
    Ok(Json(tree))
}
