//! Exclusive access for schema upgrades.
//!
//! The lock is a `LOCK TABLE ... WRITE` on a marker table, held by the store
//! session that issued it. It ends with that session and does not block other
//! connections opened by the same process.

use tracing::error;

use crate::store::Store;

/// Marker table used as the upgrade lock; also the only table of a fresh store.
pub const SCHEMA_LOCK_TABLE: &str = "schemalock";

pub struct SchemaLock<'a> {
    store: &'a dyn Store,
}

impl<'a> SchemaLock<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Creates the marker table if needed and write-locks it.
    /// False means exclusivity was not obtained.
    pub async fn acquire(&self) -> bool {
        let create = format!(
            "CREATE TABLE IF NOT EXISTS {0} ( {0} int(1));",
            SCHEMA_LOCK_TABLE
        );
        if let Err(e) = self.store.execute(&create, &[]).await {
            error!("Unable to create {} table: {}", SCHEMA_LOCK_TABLE, e);
            return false;
        }

        let lock = format!("LOCK TABLE {} WRITE;", SCHEMA_LOCK_TABLE);
        if let Err(e) = self.store.execute(&lock, &[]).await {
            error!("Unable to acquire database upgrade lock: {}", e);
            return false;
        }
        true
    }

    /// Releases every table lock held by the session.
    pub async fn release(&self) {
        if let Err(e) = self.store.execute("UNLOCK TABLES;", &[]).await {
            error!("Unable to release database upgrade lock: {}", e);
        }
    }
}
