//! Corral metadata store: users, accounts, repos, commits, the commit
//! availability cache, reservations, and the reservation audit log.

pub mod error;
pub mod models;
pub mod repos;
pub mod store;

pub use error::{MetadataError, MetadataResult};
pub use store::{MetadataStore, SqliteStore};
