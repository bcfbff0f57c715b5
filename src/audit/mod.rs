//! Table listing, emptiness detection, and check/repair of MyISAM tables.
//!
//! Check and repair are not serialized here. Only one maintenance process may
//! run them at a time, and a table left half-repaired by a server crash must be
//! repaired again before anything else touches it.

pub mod processlist;
pub mod status;

use tracing::{error, info, warn};

use crate::schema_lock::SCHEMA_LOCK_TABLE;
use crate::store::Store;
pub use processlist::count_clients;
pub use status::{MessageKind, STATUS_COLUMNS, TableStatusRow, reduce_status_rows};

/// Storage engine whose tables are checked and repaired.
pub const CHECKED_ENGINE: &str = "MyISAM";
pub const DEFAULT_CHECK_OPTIONS: &str = "QUICK";

/// Fully qualified base tables (`` `schema`.`table` ``) of the active
/// database, optionally restricted to the given storage engines.
///
/// Connection or query failures are logged and yield an empty list.
pub async fn list_tables(store: &dyn Store, engines: &[&str]) -> Vec<String> {
    if !store.is_connected().await {
        warn!("Not connected to the database, unable to list tables");
        return Vec::new();
    }

    let mut sql = String::from(
        "SELECT CONCAT('`', INFORMATION_SCHEMA.TABLES.TABLE_SCHEMA, \
         '`.`', INFORMATION_SCHEMA.TABLES.TABLE_NAME, '`') AS `TABLE_NAME` \
         FROM INFORMATION_SCHEMA.TABLES \
         WHERE INFORMATION_SCHEMA.TABLES.TABLE_SCHEMA = DATABASE() \
         AND INFORMATION_SCHEMA.TABLES.TABLE_TYPE = 'BASE TABLE'",
    );
    if !engines.is_empty() {
        let quoted: Vec<String> = engines
            .iter()
            .map(|engine| format!("'{}'", engine.replace('\'', "''")))
            .collect();
        sql.push_str(&format!(
            " AND INFORMATION_SCHEMA.TABLES.ENGINE IN ({})",
            quoted.join(", ")
        ));
    }

    match store.query_rows(&sql, &["TABLE_NAME"]).await {
        Ok(rows) => rows
            .into_iter()
            .filter_map(|row| row.into_iter().next().flatten())
            .collect(),
        Err(e) => {
            error!("Finding tables failed: {}", e);
            Vec::new()
        }
    }
}

/// True for a freshly initialized store: no tables, or only the schema lock marker.
pub fn is_empty_table_list(tables: &[String]) -> bool {
    let marker = format!(".`{}`", SCHEMA_LOCK_TABLE);
    match tables {
        [] => true,
        [only] => only.ends_with(&marker),
        _ => false,
    }
}

pub async fn is_empty_store(store: &dyn Store) -> bool {
    is_empty_table_list(&list_tables(store, &[]).await)
}

/// Checks every MyISAM table in one `CHECK TABLE` batch.
///
/// Returns false if any table is not OK; with `repair`, those tables are
/// repaired and the repair result is returned instead.
pub async fn check_tables(store: &dyn Store, repair: bool, options: &str) -> bool {
    if !store.is_connected().await {
        return false;
    }

    let all_tables = list_tables(store, &[CHECKED_ENGINE]).await;
    if all_tables.is_empty() {
        return true;
    }

    info!("Checking database tables.");
    let sql = format!("CHECK TABLE {} {};", all_tables.join(", "), options);
    let rows = match store.query_rows(&sql, &STATUS_COLUMNS).await {
        Ok(rows) => rows,
        Err(e) => {
            error!("Checking tables failed: {}", e);
            return false;
        }
    };

    let bad_tables = reduce_status_rows(rows.into_iter().map(TableStatusRow::from_text_row));
    if bad_tables.is_empty() {
        return true;
    }

    warn!("Found crashed database table(s): {}", bad_tables.join(", "));
    if repair {
        repair_tables(store, &bad_tables).await
    } else {
        false
    }
}

/// Repairs exactly `tables` in one `REPAIR TABLE` batch; true if all end up OK.
pub async fn repair_tables(store: &dyn Store, tables: &[String]) -> bool {
    if !store.is_connected().await {
        return false;
    }
    if tables.is_empty() {
        return true;
    }

    let all_tables = tables.join(", ");
    info!("Repairing database tables: {}", all_tables);

    let sql = format!("REPAIR TABLE {};", all_tables);
    let rows = match store.query_rows(&sql, &STATUS_COLUMNS).await {
        Ok(rows) => rows,
        Err(e) => {
            error!("Repairing tables failed: {}", e);
            return false;
        }
    };

    let bad_tables = reduce_status_rows(rows.into_iter().map(TableStatusRow::from_text_row));
    if !bad_tables.is_empty() {
        error!("Unable to repair crashed table(s): {}", bad_tables.join(", "));
        return false;
    }
    true
}
