use crate::application_port::VerificationService;
use crate::domain_port::RecordStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const DUE_BATCH: u32 = 256;

/// Timer integration: one loop over the deadline-ordered store index stands
/// in for per-user timers. Each due record is handed back to the engine,
/// which re-validates phase and token under the key lock, so a record that
/// moved on since the read is a silent no-op. Because the index is durable,
/// deadlines survive restarts. The same pass evicts terminal records past
/// the retention window.
pub struct Sweeper {
    records: Arc<dyn RecordStore>,
    verification: Arc<dyn VerificationService>,
    poll_interval: Duration,
    retention: Duration,
    cancellation_token: CancellationToken,
}

impl Sweeper {
    pub fn new(
        records: Arc<dyn RecordStore>,
        verification: Arc<dyn VerificationService>,
        poll_interval: Duration,
        retention: Duration,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            records,
            verification,
            poll_interval,
            retention,
            cancellation_token,
        }
    }

    pub async fn tick_once(&self) -> anyhow::Result<()> {
        let now = Utc::now();
        let due = self.records.list_due(now, DUE_BATCH).await?;
        for record in &due {
            let Some(phase) = record.phase() else {
                continue;
            };
            if let Err(e) = self
                .verification
                .on_deadline(record.chat_id, record.user_id, phase, record.token.as_str())
                .await
            {
                warn!(key = %record.key(), error = %e, "deadline handling failed");
            }
        }
        if !due.is_empty() {
            debug!(count = due.len(), "processed due deadlines");
        }

        let cutoff = now - chrono::Duration::seconds(self.retention.as_secs() as i64);
        let removed = self.records.prune_terminal_before(cutoff).await?;
        if removed > 0 {
            debug!(removed, "pruned terminal records");
        }
        Ok(())
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        loop {
            tokio::select! {
                biased;
                _ = self.cancellation_token.cancelled() => {
                    tracing::info!("Sweeper shutting down...");
                    break;
                }
                _ = tokio::time::sleep(self.poll_interval) => {
                    if let Err(e) = self.tick_once().await {
                        tracing::error!("Sweeper error: {:#?}", e);
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::{
        FakeJoinGateway, RuntimeSettings, VerificationEngine,
    };
    use crate::application_port::{EventOutcome, VerificationService};
    use crate::domain_model::{ChatId, UserId, VerificationPolicy, VerificationStatus};
    use crate::infra_memory::{MemoryRecordStore, MemoryRosterStore, MemorySettingsStore};
    use crate::domain_port::RecordStore;

    const CHAT: ChatId = ChatId(-1001);
    const USER: UserId = UserId(42);

    async fn setup() -> (Sweeper, Arc<MemoryRecordStore>, Arc<VerificationEngine>) {
        let records = Arc::new(MemoryRecordStore::new());
        let settings = Arc::new(
            RuntimeSettings::load(
                VerificationPolicy::default(),
                Arc::new(MemorySettingsStore::new()),
            )
            .await
            .unwrap(),
        );
        let engine = Arc::new(VerificationEngine::new(
            records.clone(),
            Arc::new(MemoryRosterStore::new()),
            Arc::new(FakeJoinGateway::new()),
            settings,
        ));
        let sweeper = Sweeper::new(
            records.clone(),
            engine.clone(),
            Duration::from_secs(10),
            Duration::from_secs(7 * 24 * 3600),
            CancellationToken::new(),
        );
        (sweeper, records, engine)
    }

    #[tokio::test]
    async fn overdue_records_are_expired_and_fresh_ones_left_alone() {
        let (sweeper, records, engine) = setup().await;
        assert_eq!(
            engine.on_join_request(CHAT, USER).await.unwrap(),
            EventOutcome::LanguagePromptSent
        );
        engine.on_join_request(CHAT, UserId(43)).await.unwrap();

        // Backdate one record past its deadline.
        let key = crate::domain_model::RecordKey::new(CHAT, USER);
        let mut record = records.get(key).await.unwrap().unwrap();
        record.deadline = Utc::now() - chrono::Duration::seconds(1);
        records.put(&record).await.unwrap();

        sweeper.tick_once().await.unwrap();

        let swept = records.get(key).await.unwrap().unwrap();
        assert_eq!(swept.status, VerificationStatus::Expired);
        let untouched = records
            .get(crate::domain_model::RecordKey::new(CHAT, UserId(43)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(untouched.status, VerificationStatus::AwaitingLanguage);
    }

    #[tokio::test]
    async fn retention_pass_prunes_old_terminal_records() {
        let (sweeper, records, engine) = setup().await;
        engine.on_join_request(CHAT, USER).await.unwrap();

        let key = crate::domain_model::RecordKey::new(CHAT, USER);
        let mut record = records.get(key).await.unwrap().unwrap();
        record.status = VerificationStatus::Rejected;
        record.updated_at = Utc::now() - chrono::Duration::days(30);
        records.put(&record).await.unwrap();

        sweeper.tick_once().await.unwrap();
        assert!(records.get(key).await.unwrap().is_none());
    }
}
