use crate::domain_model::{ChatId, RecordKey, VerificationRecord, VerificationStatus};
use chrono::{DateTime, Utc};

/// Durable map from (chat, user) to the verification record, shared across
/// restarts and concurrent handlers.
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    async fn get(&self, key: RecordKey) -> Result<Option<VerificationRecord>, RecordStoreError>;

    /// Compare-and-swap upsert. The write wins only if the stored row still
    /// carries `record.version`; the returned record carries the bumped
    /// version. A lost race surfaces as `Conflict` and nothing is persisted.
    async fn put(&self, record: &VerificationRecord) -> Result<VerificationRecord, RecordStoreError>;

    async fn delete(&self, key: RecordKey) -> Result<(), RecordStoreError>;

    /// Non-terminal records whose deadline has passed, ordered by deadline.
    async fn list_due(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<VerificationRecord>, RecordStoreError>;

    async fn count_by_status(
        &self,
        chat_id: Option<ChatId>,
    ) -> Result<Vec<(VerificationStatus, u64)>, RecordStoreError>;

    /// Drop terminal records last updated before `cutoff`. Returns how many
    /// rows were removed.
    async fn prune_terminal_before(&self, cutoff: DateTime<Utc>) -> Result<u64, RecordStoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RecordStoreError {
    #[error("concurrent update lost for {key}")]
    Conflict { key: RecordKey },
    #[error("infra error: {0}")]
    Store(String),
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}
