use crate::domain_model::{
    ChatId, Language, PromptToken, RecordKey, VerificationRecord, VerificationStatus,
};
use crate::domain_port::{RecordStore, RecordStoreError};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

const ACTIVE_STATUSES: &str = "('awaiting_language', 'awaiting_verification')";
const PRUNABLE_STATUSES: &str = "('approved', 'rejected', 'expired')";

pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteRecordStore { pool }
    }
}

fn record_from_row(row: &SqliteRow) -> Result<VerificationRecord, RecordStoreError> {
    let status_raw: String = row.get("status");
    let status = VerificationStatus::parse(&status_raw)
        .ok_or_else(|| RecordStoreError::Store(format!("unknown status: {status_raw}")))?;
    let language = row
        .get::<Option<String>, _>("language")
        .map(|code| {
            Language::parse(&code)
                .ok_or_else(|| RecordStoreError::Store(format!("unknown language: {code}")))
        })
        .transpose()?;

    Ok(VerificationRecord {
        chat_id: row.get("chat_id"),
        user_id: row.get("user_id"),
        status,
        language,
        attempts_used: row.get::<i64, _>("attempts_used") as u32,
        max_attempts: row.get::<i64, _>("max_attempts") as u32,
        token: PromptToken(row.get("token")),
        challenge_issued_at: row.get("challenge_issued_at"),
        deadline: row.get("deadline"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        version: row.get("version"),
    })
}

#[async_trait::async_trait]
impl RecordStore for SqliteRecordStore {
    async fn get(&self, key: RecordKey) -> Result<Option<VerificationRecord>, RecordStoreError> {
        let row = sqlx::query("SELECT * FROM join_requests WHERE user_id = ? AND chat_id = ?")
            .bind(key.user_id)
            .bind(key.chat_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RecordStoreError::Store(e.to_string()))?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn put(
        &self,
        record: &VerificationRecord,
    ) -> Result<VerificationRecord, RecordStoreError> {
        let key = record.key();
        let mut stored = record.clone();
        stored.version = record.version + 1;

        if record.version == 0 {
            sqlx::query(
                r#"
INSERT INTO join_requests (
    user_id, chat_id, status, language, attempts_used, max_attempts,
    token, challenge_issued_at, deadline, created_at, updated_at, version
)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#,
            )
            .bind(record.user_id)
            .bind(record.chat_id)
            .bind(record.status.as_str())
            .bind(record.language.map(|l| l.code()))
            .bind(record.attempts_used as i64)
            .bind(record.max_attempts as i64)
            .bind(record.token.as_str())
            .bind(record.challenge_issued_at)
            .bind(record.deadline)
            .bind(record.created_at)
            .bind(record.updated_at)
            .bind(stored.version)
            .execute(&self.pool)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    RecordStoreError::Conflict { key }
                }
                _ => RecordStoreError::Store(e.to_string()),
            })?;
            return Ok(stored);
        }

        let result = sqlx::query(
            r#"
UPDATE join_requests
SET status = ?, language = ?, attempts_used = ?, max_attempts = ?,
    token = ?, challenge_issued_at = ?, deadline = ?, created_at = ?,
    updated_at = ?, version = ?
WHERE user_id = ? AND chat_id = ? AND version = ?
"#,
        )
        .bind(record.status.as_str())
        .bind(record.language.map(|l| l.code()))
        .bind(record.attempts_used as i64)
        .bind(record.max_attempts as i64)
        .bind(record.token.as_str())
        .bind(record.challenge_issued_at)
        .bind(record.deadline)
        .bind(record.created_at)
        .bind(record.updated_at)
        .bind(stored.version)
        .bind(record.user_id)
        .bind(record.chat_id)
        .bind(record.version)
        .execute(&self.pool)
        .await
        .map_err(|e| RecordStoreError::Store(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RecordStoreError::Conflict { key });
        }
        Ok(stored)
    }

    async fn delete(&self, key: RecordKey) -> Result<(), RecordStoreError> {
        sqlx::query("DELETE FROM join_requests WHERE user_id = ? AND chat_id = ?")
            .bind(key.user_id)
            .bind(key.chat_id)
            .execute(&self.pool)
            .await
            .map_err(|e| RecordStoreError::Store(e.to_string()))?;
        Ok(())
    }

    async fn list_due(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<VerificationRecord>, RecordStoreError> {
        let rows = sqlx::query(&format!(
            "SELECT * FROM join_requests \
             WHERE status IN {ACTIVE_STATUSES} AND deadline <= ? \
             ORDER BY deadline LIMIT ?"
        ))
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RecordStoreError::Store(e.to_string()))?;

        rows.iter().map(record_from_row).collect()
    }

    async fn count_by_status(
        &self,
        chat_id: Option<ChatId>,
    ) -> Result<Vec<(VerificationStatus, u64)>, RecordStoreError> {
        let rows = match chat_id {
            Some(chat) => {
                sqlx::query(
                    "SELECT status, COUNT(*) AS n FROM join_requests \
                     WHERE chat_id = ? GROUP BY status ORDER BY status",
                )
                .bind(chat)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    "SELECT status, COUNT(*) AS n FROM join_requests \
                     GROUP BY status ORDER BY status",
                )
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(|e| RecordStoreError::Store(e.to_string()))?;

        let mut counts = Vec::with_capacity(rows.len());
        for row in &rows {
            let status_raw: String = row.get("status");
            let status = VerificationStatus::parse(&status_raw)
                .ok_or_else(|| RecordStoreError::Store(format!("unknown status: {status_raw}")))?;
            counts.push((status, row.get::<i64, _>("n") as u64));
        }
        Ok(counts)
    }

    async fn prune_terminal_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, RecordStoreError> {
        // pending_review rows stay: they are an admin work queue.
        let result = sqlx::query(&format!(
            "DELETE FROM join_requests \
             WHERE status IN {PRUNABLE_STATUSES} AND updated_at < ?"
        ))
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(|e| RecordStoreError::Store(e.to_string()))?;
        Ok(result.rows_affected())
    }
}
