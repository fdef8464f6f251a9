//! Repository traits for metadata operations.

pub mod accounts;
pub mod audit;
pub mod commits;
pub mod git_repos;
pub mod reservations;
pub mod status_cache;
pub mod users;

pub use accounts::AccountRepo;
pub use audit::AuditRepo;
pub use commits::CommitRepo;
pub use git_repos::RepoRepo;
pub use reservations::{NewReservation, ReservationRepo, SyncedReservation};
pub use status_cache::StatusCacheRepo;
pub use users::UserRepo;
