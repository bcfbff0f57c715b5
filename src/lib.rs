//! Integrity checks, backups and schema-upgrade locking for a shared MySQL store.

pub mod audit;
pub mod backup;
pub mod config;
pub mod coordinator;
pub mod credentials;
pub mod errors;
pub mod process;
pub mod schedule;
pub mod schema_lock;
pub mod store;
pub mod utils;
pub mod version;

#[cfg(test)]
pub(crate) mod testkit;

pub use coordinator::{BackupPaths, DbCoordinator};
pub use errors::{AppError, Result};
