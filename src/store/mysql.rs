// dbkeeper/src/store/mysql.rs
use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlRow};
use sqlx::{Connection, Executor, MySqlConnection, Row};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{SettingsStore, Store, TextRow};
use crate::config::DatabaseParams;
use crate::errors::{AppError, Result};

/// `Store` and `SettingsStore` over a single MySQL session.
///
/// One connection rather than a pool: `LOCK TABLES` and `UNLOCK TABLES` only
/// pair up when issued on the same session.
pub struct MySqlStore {
    conn: Mutex<MySqlConnection>,
    params: DatabaseParams,
    host_name: String,
}

impl MySqlStore {
    pub async fn connect(params: &DatabaseParams, host_name: &str) -> Result<Self> {
        let mut options = MySqlConnectOptions::new()
            .host(&params.host)
            .username(&params.user)
            .database(&params.name);
        if !params.password.is_empty() {
            options = options.password(&params.password);
        }
        if params.port > 0 {
            options = options.port(params.port);
        }

        let conn = MySqlConnection::connect_with(&options).await.map_err(|e| {
            AppError::ConnectionUnavailable(format!(
                "{}@{}/{}: {}",
                params.user, params.host, params.name, e
            ))
        })?;
        debug!(host = %params.host, database = %params.name, "Connected to store");

        Ok(Self {
            conn: Mutex::new(conn),
            params: params.clone(),
            host_name: host_name.to_string(),
        })
    }
}

/// Reads a column as text, accepting binary-collated columns as lossy UTF-8.
fn column_text(row: &MySqlRow, column: &str) -> Result<Option<String>> {
    match row.try_get::<Option<String>, _>(column) {
        Ok(value) => Ok(value),
        Err(_) => {
            let bytes: Option<Vec<u8>> = row.try_get(column)?;
            Ok(bytes.map(|b| String::from_utf8_lossy(&b).into_owned()))
        }
    }
}

#[async_trait]
impl Store for MySqlStore {
    async fn is_connected(&self) -> bool {
        let mut conn = self.conn.lock().await;
        conn.ping().await.is_ok()
    }

    async fn query_rows(&self, sql: &str, columns: &[&str]) -> Result<Vec<TextRow>> {
        let mut conn = self.conn.lock().await;
        let rows = (&mut *conn)
            .fetch_all(sql)
            .await
            .map_err(|e| AppError::query(format!("Query failed: {}", sql), e))?;

        rows.iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|column| column_text(row, column))
                    .collect::<Result<TextRow>>()
            })
            .collect()
    }

    async fn execute(&self, sql: &str, binds: &[&str]) -> Result<u64> {
        let mut conn = self.conn.lock().await;
        let result = if binds.is_empty() {
            (&mut *conn).execute(sql).await
        } else {
            let mut query = sqlx::query(sql);
            for value in binds {
                query = query.bind(*value);
            }
            query.execute(&mut *conn).await
        };

        result
            .map(|done| done.rows_affected())
            .map_err(|e| AppError::query(format!("Statement failed: {}", sql), e))
    }

    fn params(&self) -> &DatabaseParams {
        &self.params
    }
}

#[async_trait]
impl SettingsStore for MySqlStore {
    async fn get_setting(&self, key: &str) -> Option<String> {
        let mut conn = self.conn.lock().await;
        // Host-scoped rows sort ahead of the global (NULL hostname) row
        let row = sqlx::query(
            "SELECT data FROM settings \
             WHERE value = ? AND (hostname = ? OR hostname IS NULL) \
             ORDER BY hostname IS NULL LIMIT 1",
        )
        .bind(key)
        .bind(&self.host_name)
        .fetch_optional(&mut *conn)
        .await;

        match row {
            Ok(Some(row)) => column_text(&row, "data").ok().flatten(),
            Ok(None) => None,
            Err(e) => {
                warn!(setting = key, error = %e, "Unable to read setting");
                None
            }
        }
    }

    async fn save_setting_on_host(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.conn.lock().await;
        sqlx::query("DELETE FROM settings WHERE value = ? AND hostname = ?")
            .bind(key)
            .bind(&self.host_name)
            .execute(&mut *conn)
            .await
            .map_err(|e| AppError::query(format!("Clearing setting {}", key), e))?;

        sqlx::query("INSERT INTO settings (value, data, hostname) VALUES (?, ?, ?)")
            .bind(key)
            .bind(value)
            .bind(&self.host_name)
            .execute(&mut *conn)
            .await
            .map_err(|e| AppError::query(format!("Saving setting {}", key), e))?;

        debug!(setting = key, host = %self.host_name, "Saved setting");
        Ok(())
    }
}
