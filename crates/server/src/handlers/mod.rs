//! HTTP request handlers.

pub mod admin;
pub mod chains;
pub mod common;
pub mod health;
pub mod reservations;

pub use admin::{sync_status, trigger_poll, trigger_reconcile};
pub use chains::get_chain;
pub use health::health_check;
pub use reservations::{
    bulk_claim, claim_reservation, gift_reservation, list_reservations, release_reservation,
    transfer_reservation,
};
