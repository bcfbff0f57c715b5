use tracing::{error, info};

use crate::store::Store;

pub async fn check_db_connection(store: &dyn Store) -> bool {
    let params = store.params();
    if store.is_connected().await {
        info!("✅ Successfully connected to {}@{}/{}", params.user, params.host, params.name);
        true
    } else {
        error!("❌ Failed to connect to {}@{}/{}", params.user, params.host, params.name);
        false
    }
}
