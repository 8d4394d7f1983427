use crate::domain_port::{SettingsStore, SettingsStoreError};
use sqlx::{Row, SqlitePool};

pub struct SqliteSettingsStore {
    pool: SqlitePool,
}

impl SqliteSettingsStore {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteSettingsStore { pool }
    }
}

#[async_trait::async_trait]
impl SettingsStore for SqliteSettingsStore {
    async fn load_all(&self) -> Result<Vec<(String, String)>, SettingsStoreError> {
        let rows = sqlx::query("SELECT key, value FROM settings")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| SettingsStoreError::Store(e.to_string()))?;
        Ok(rows
            .iter()
            .map(|row| (row.get("key"), row.get("value")))
            .collect())
    }

    async fn save(&self, key: &str, value: &str) -> Result<(), SettingsStoreError> {
        sqlx::query(
            "INSERT INTO settings (key, value) VALUES (?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|e| SettingsStoreError::Store(e.to_string()))?;
        Ok(())
    }
}
