use tracing::{debug, error};

use crate::store::Store;

/// Connections a typical client process holds against the store.
const CONNECTIONS_PER_CLIENT: usize = 4;

/// Estimates how many client programs are using the active database.
///
/// Counts server sessions attached to it and divides by the usual connections
/// per client, rounding up so a client still starting up is counted.
pub async fn count_clients(store: &dyn Store) -> usize {
    if !store.is_connected().await {
        debug!("count_clients(): Not connected to DB");
        return 0;
    }

    let rows = match store.query_rows("SHOW PROCESSLIST;", &["db"]).await {
        Ok(rows) => rows,
        Err(e) => {
            error!("Counting clients failed: {}", e);
            return 0;
        }
    };

    let db_name = &store.params().name;
    let sessions = rows
        .iter()
        .filter(|row| row.first().and_then(Option::as_deref) == Some(db_name.as_str()))
        .count();

    let count = sessions.div_ceil(CONNECTIONS_PER_CLIENT);
    debug!("count_clients() found {}", count);
    count
}
