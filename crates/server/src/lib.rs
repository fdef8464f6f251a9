//! Reservation engine and HTTP control plane.
//!
//! This crate hosts:
//! - The availability poller (remote unavailability feed -> status cache)
//! - The reservation reconciler (remote reservations -> local rows)
//! - The reservation lifecycle coordinator (claim/release/transfer/gift)
//! - The commit chain reconstructor
//! - The sync scheduler and the thin axum API over all of the above

pub mod chain;
pub mod error;
pub mod handlers;
pub mod lifecycle;
pub mod poller;
pub mod reconciler;
pub mod routes;
pub mod scheduler;
pub mod state;

pub use error::ApiError;
pub use lifecycle::LifecycleCoordinator;
pub use routes::create_router;
pub use scheduler::SyncScheduler;
pub use state::AppState;
