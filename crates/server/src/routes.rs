//! Route configuration.

use crate::handlers;
use crate::state::AppState;
use axum::Router;
use axum::routing::{delete, get, post};
use tower_http::trace::TraceLayer;

/// Create the application router.
///
/// Identity arrives as the `x-corral-user` header set by the fronting auth
/// proxy; this service does not authenticate.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check (intentionally unauthenticated for load balancers)
        .route("/health", get(handlers::health_check))
        // Reservations
        .route(
            "/v1/reservations",
            get(handlers::list_reservations).post(handlers::claim_reservation),
        )
        .route(
            "/v1/reservations/{reservation_id}",
            delete(handlers::release_reservation),
        )
        .route(
            "/v1/reservations/{reservation_id}/transfer",
            post(handlers::transfer_reservation),
        )
        .route(
            "/v1/reservations/{reservation_id}/gift",
            post(handlers::gift_reservation),
        )
        .route("/v1/reservations/bulk", post(handlers::bulk_claim))
        // Chain reconstruction
        .route("/v1/chains", get(handlers::get_chain))
        // Admin sync surface
        .route("/v1/admin/sync", get(handlers::sync_status))
        .route("/v1/admin/sync/poll", post(handlers::trigger_poll))
        .route("/v1/admin/sync/reconcile", post(handlers::trigger_reconcile))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
