//! Boundary to the shared relational store and its key-value settings.

pub mod mysql;

use async_trait::async_trait;

use crate::config::DatabaseParams;
use crate::errors::Result;

pub use mysql::MySqlStore;

/// One result row, holding the requested columns in request order.
pub type TextRow = Vec<Option<String>>;

/// Query execution against the active store.
///
/// Statements without bind values go over the text protocol, so administrative
/// statements (`CHECK TABLE`, `LOCK TABLES`, `SHOW PROCESSLIST`) are allowed.
#[async_trait]
pub trait Store: Send + Sync {
    /// Whether the underlying connection is alive.
    async fn is_connected(&self) -> bool;

    /// Runs `sql` and returns the named `columns` of every row.
    async fn query_rows(&self, sql: &str, columns: &[&str]) -> Result<Vec<TextRow>>;

    /// Runs a statement that produces no rows, returning the affected row count.
    async fn execute(&self, sql: &str, binds: &[&str]) -> Result<u64>;

    /// Connection parameters of the active store.
    fn params(&self) -> &DatabaseParams;
}

/// Key-value settings, optionally scoped to a host.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Returns the host-scoped value if present, otherwise the global one.
    async fn get_setting(&self, key: &str) -> Option<String>;

    async fn get_num_setting(&self, key: &str, default: i64) -> i64 {
        self.get_setting(key)
            .await
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Replaces the value of `key` for this host.
    async fn save_setting_on_host(&self, key: &str, value: &str) -> Result<()>;
}
