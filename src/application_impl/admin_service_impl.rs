use crate::application_impl::RuntimeSettings;
use crate::application_port::{AdminError, AdminService, JoinGateway};
use crate::domain_model::{
    ChatId, FailureAction, RecordKey, UserId, VerificationRecord, VerificationStatus,
};
use crate::domain_port::{RecordStore, RosterList, RosterStore};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

/// Admin control surface: manual overrides, roster curation and policy
/// mutation. Every call authenticates against the configured admin id list.
pub struct RealAdminService {
    admin_ids: HashSet<UserId>,
    records: Arc<dyn RecordStore>,
    roster: Arc<dyn RosterStore>,
    gateway: Arc<dyn JoinGateway>,
    settings: Arc<RuntimeSettings>,
}

impl RealAdminService {
    pub fn new(
        admin_ids: HashSet<UserId>,
        records: Arc<dyn RecordStore>,
        roster: Arc<dyn RosterStore>,
        gateway: Arc<dyn JoinGateway>,
        settings: Arc<RuntimeSettings>,
    ) -> Self {
        Self {
            admin_ids,
            records,
            roster,
            gateway,
            settings,
        }
    }

    fn authorize(&self, caller: UserId) -> Result<(), AdminError> {
        if self.admin_ids.contains(&caller) {
            Ok(())
        } else {
            Err(AdminError::NotAdmin)
        }
    }

    /// Force the record for (chat, user) into a terminal status, creating it
    /// if the user never entered the pipeline.
    async fn override_status(
        &self,
        user_id: UserId,
        chat_id: ChatId,
        status: VerificationStatus,
    ) -> Result<(), AdminError> {
        let key = RecordKey::new(chat_id, user_id);
        let now = Utc::now();
        let policy = self.settings.policy();
        let mut record = match self.records.get(key).await? {
            Some(existing) => existing,
            None => VerificationRecord::new_join(key, policy.max_attempts, policy.lang_timeout, now),
        };
        record.status = status;
        record.updated_at = now;
        self.records.put(&record).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl AdminService for RealAdminService {
    async fn approve(
        &self,
        caller: UserId,
        user_id: UserId,
        chat_id: ChatId,
    ) -> Result<(), AdminError> {
        self.authorize(caller)?;
        if !self.roster.contains(RosterList::Whitelist, user_id).await? {
            return Err(AdminError::NotWhitelisted);
        }
        self.gateway
            .approve_join(chat_id, user_id)
            .await
            .map_err(|e| AdminError::InternalError(anyhow::Error::new(e)))?;
        self.override_status(user_id, chat_id, VerificationStatus::Approved)
            .await?;
        info!(%caller, %user_id, %chat_id, "manual approval");
        Ok(())
    }

    async fn reject(
        &self,
        caller: UserId,
        user_id: UserId,
        chat_id: ChatId,
    ) -> Result<(), AdminError> {
        self.authorize(caller)?;
        self.gateway
            .decline_join(chat_id, user_id)
            .await
            .map_err(|e| AdminError::InternalError(anyhow::Error::new(e)))?;
        self.override_status(user_id, chat_id, VerificationStatus::Rejected)
            .await?;
        info!(%caller, %user_id, %chat_id, "manual rejection");
        Ok(())
    }

    async fn whitelist_add(&self, caller: UserId, user_id: UserId) -> Result<(), AdminError> {
        self.authorize(caller)?;
        self.roster.add(RosterList::Whitelist, user_id).await?;
        Ok(())
    }

    async fn whitelist_remove(&self, caller: UserId, user_id: UserId) -> Result<(), AdminError> {
        self.authorize(caller)?;
        self.roster.remove(RosterList::Whitelist, user_id).await?;
        Ok(())
    }

    async fn blacklist_add(&self, caller: UserId, user_id: UserId) -> Result<(), AdminError> {
        self.authorize(caller)?;
        self.roster.add(RosterList::Blacklist, user_id).await?;
        Ok(())
    }

    async fn blacklist_remove(&self, caller: UserId, user_id: UserId) -> Result<(), AdminError> {
        self.authorize(caller)?;
        self.roster.remove(RosterList::Blacklist, user_id).await?;
        Ok(())
    }

    async fn set_max_attempts(&self, caller: UserId, value: u32) -> Result<(), AdminError> {
        self.authorize(caller)?;
        self.settings.set_max_attempts(value).await?;
        info!(%caller, value, "max attempts updated");
        Ok(())
    }

    async fn set_verify_timeout(&self, caller: UserId, secs: u64) -> Result<(), AdminError> {
        self.authorize(caller)?;
        self.settings.set_verify_timeout(secs).await?;
        info!(%caller, secs, "verification timeout updated");
        Ok(())
    }

    async fn set_lang_timeout(&self, caller: UserId, secs: u64) -> Result<(), AdminError> {
        self.authorize(caller)?;
        self.settings.set_lang_timeout(secs).await?;
        info!(%caller, secs, "language timeout updated");
        Ok(())
    }

    async fn set_failure_action(
        &self,
        caller: UserId,
        action: FailureAction,
    ) -> Result<(), AdminError> {
        self.authorize(caller)?;
        self.settings.set_failure_action(action).await?;
        info!(%caller, %action, "failure action updated");
        Ok(())
    }

    async fn status(
        &self,
        caller: UserId,
        chat_id: Option<ChatId>,
    ) -> Result<Vec<(VerificationStatus, u64)>, AdminError> {
        self.authorize(caller)?;
        Ok(self.records.count_by_status(chat_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::{FakeJoinGateway, SentDirective};
    use crate::domain_model::VerificationPolicy;
    use crate::infra_memory::{MemoryRecordStore, MemoryRosterStore, MemorySettingsStore};

    const ADMIN: UserId = UserId(1);
    const OUTSIDER: UserId = UserId(2);
    const TARGET: UserId = UserId(77);
    const CHAT: ChatId = ChatId(-1001);

    async fn service() -> (RealAdminService, Arc<MemoryRecordStore>, Arc<FakeJoinGateway>) {
        let records = Arc::new(MemoryRecordStore::new());
        let roster = Arc::new(MemoryRosterStore::new());
        let gateway = Arc::new(FakeJoinGateway::new());
        let settings = Arc::new(
            RuntimeSettings::load(
                VerificationPolicy::default(),
                Arc::new(MemorySettingsStore::new()),
            )
            .await
            .unwrap(),
        );
        let service = RealAdminService::new(
            HashSet::from([ADMIN]),
            records.clone(),
            roster,
            gateway.clone(),
            settings,
        );
        (service, records, gateway)
    }

    #[tokio::test]
    async fn non_admin_is_denied() {
        let (service, records, gateway) = service().await;
        assert!(matches!(
            service.reject(OUTSIDER, TARGET, CHAT).await,
            Err(AdminError::NotAdmin)
        ));
        assert!(matches!(
            service.set_max_attempts(OUTSIDER, 5).await,
            Err(AdminError::NotAdmin)
        ));
        assert!(records.get(RecordKey::new(CHAT, TARGET)).await.unwrap().is_none());
        assert!(gateway.sent().is_empty());
    }

    #[tokio::test]
    async fn approve_requires_whitelist() {
        let (service, records, gateway) = service().await;
        assert!(matches!(
            service.approve(ADMIN, TARGET, CHAT).await,
            Err(AdminError::NotWhitelisted)
        ));
        assert!(records.get(RecordKey::new(CHAT, TARGET)).await.unwrap().is_none());
        assert!(gateway.sent().is_empty());
    }

    #[tokio::test]
    async fn whitelisted_approve_overrides_any_phase() {
        let (service, records, gateway) = service().await;
        service.whitelist_add(ADMIN, TARGET).await.unwrap();
        service.approve(ADMIN, TARGET, CHAT).await.unwrap();

        let record = records
            .get(RecordKey::new(CHAT, TARGET))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, VerificationStatus::Approved);
        assert_eq!(
            gateway.sent(),
            vec![SentDirective::Approve {
                chat_id: CHAT,
                user_id: TARGET
            }]
        );
    }

    #[tokio::test]
    async fn reject_needs_no_whitelist() {
        let (service, records, _gateway) = service().await;
        service.reject(ADMIN, TARGET, CHAT).await.unwrap();
        let record = records
            .get(RecordKey::new(CHAT, TARGET))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, VerificationStatus::Rejected);
    }
}
