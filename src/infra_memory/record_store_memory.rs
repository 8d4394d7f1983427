use crate::domain_model::{ChatId, RecordKey, VerificationRecord, VerificationStatus};
use crate::domain_port::{RecordStore, RecordStoreError};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// In-process record store for tests and the "memory" backend. Honors the
/// same compare-and-swap contract as the SQLite store.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    rows: DashMap<RecordKey, VerificationRecord>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get(&self, key: RecordKey) -> Result<Option<VerificationRecord>, RecordStoreError> {
        Ok(self.rows.get(&key).map(|r| r.value().clone()))
    }

    async fn put(
        &self,
        record: &VerificationRecord,
    ) -> Result<VerificationRecord, RecordStoreError> {
        let key = record.key();
        match self.rows.entry(key) {
            Entry::Occupied(mut entry) => {
                if entry.get().version != record.version {
                    return Err(RecordStoreError::Conflict { key });
                }
                let mut stored = record.clone();
                stored.version = record.version + 1;
                entry.insert(stored.clone());
                Ok(stored)
            }
            Entry::Vacant(entry) => {
                if record.version != 0 {
                    return Err(RecordStoreError::Conflict { key });
                }
                let mut stored = record.clone();
                stored.version = 1;
                entry.insert(stored.clone());
                Ok(stored)
            }
        }
    }

    async fn delete(&self, key: RecordKey) -> Result<(), RecordStoreError> {
        self.rows.remove(&key);
        Ok(())
    }

    async fn list_due(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<VerificationRecord>, RecordStoreError> {
        let mut due: Vec<VerificationRecord> = self
            .rows
            .iter()
            .filter(|r| !r.value().is_terminal() && r.value().deadline <= now)
            .map(|r| r.value().clone())
            .collect();
        due.sort_by_key(|r| r.deadline);
        due.truncate(limit as usize);
        Ok(due)
    }

    async fn count_by_status(
        &self,
        chat_id: Option<ChatId>,
    ) -> Result<Vec<(VerificationStatus, u64)>, RecordStoreError> {
        let mut counts = Vec::new();
        for status in VerificationStatus::ALL {
            let n = self
                .rows
                .iter()
                .filter(|r| r.value().status == status)
                .filter(|r| chat_id.is_none_or(|c| r.value().chat_id == c))
                .count() as u64;
            if n > 0 {
                counts.push((status, n));
            }
        }
        Ok(counts)
    }

    async fn prune_terminal_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, RecordStoreError> {
        let before = self.rows.len() as u64;
        self.rows.retain(|_, r| {
            !(r.updated_at < cutoff
                && matches!(
                    r.status,
                    VerificationStatus::Approved
                        | VerificationStatus::Rejected
                        | VerificationStatus::Expired
                ))
        });
        Ok(before - self.rows.len() as u64)
    }
}
