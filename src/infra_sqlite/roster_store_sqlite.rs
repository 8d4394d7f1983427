use crate::domain_model::UserId;
use crate::domain_port::{RosterList, RosterStore, RosterStoreError};
use chrono::Utc;
use sqlx::{Row, SqlitePool};

pub struct SqliteRosterStore {
    pool: SqlitePool,
}

impl SqliteRosterStore {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteRosterStore { pool }
    }
}

fn table(list: RosterList) -> &'static str {
    match list {
        RosterList::Whitelist => "whitelist",
        RosterList::Blacklist => "blacklist",
    }
}

#[async_trait::async_trait]
impl RosterStore for SqliteRosterStore {
    async fn add(&self, list: RosterList, user_id: UserId) -> Result<(), RosterStoreError> {
        sqlx::query(&format!(
            "INSERT OR IGNORE INTO {} (user_id, created_at) VALUES (?, ?)",
            table(list)
        ))
        .bind(user_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| RosterStoreError::Store(e.to_string()))?;
        Ok(())
    }

    async fn remove(&self, list: RosterList, user_id: UserId) -> Result<(), RosterStoreError> {
        sqlx::query(&format!("DELETE FROM {} WHERE user_id = ?", table(list)))
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| RosterStoreError::Store(e.to_string()))?;
        Ok(())
    }

    async fn contains(&self, list: RosterList, user_id: UserId) -> Result<bool, RosterStoreError> {
        let count: i64 = sqlx::query(&format!(
            "SELECT COUNT(1) AS n FROM {} WHERE user_id = ?",
            table(list)
        ))
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RosterStoreError::Store(e.to_string()))?
        .get("n");
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra_sqlite::migrate;
    use sqlx::sqlite::SqlitePoolOptions;

    #[tokio::test]
    async fn lists_are_independent() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        migrate(&pool).await.unwrap();
        let store = SqliteRosterStore::new(pool);
        let user = UserId(5);

        store.add(RosterList::Blacklist, user).await.unwrap();
        assert!(store.contains(RosterList::Blacklist, user).await.unwrap());
        assert!(!store.contains(RosterList::Whitelist, user).await.unwrap());

        // Re-adding is idempotent; removal clears membership.
        store.add(RosterList::Blacklist, user).await.unwrap();
        store.remove(RosterList::Blacklist, user).await.unwrap();
        assert!(!store.contains(RosterList::Blacklist, user).await.unwrap());
    }
}
