use crate::domain_model::UserId;
use crate::domain_port::{RosterList, RosterStore, RosterStoreError};
use dashmap::DashSet;

#[derive(Debug, Default)]
pub struct MemoryRosterStore {
    entries: DashSet<(RosterList, UserId)>,
}

impl MemoryRosterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl RosterStore for MemoryRosterStore {
    async fn add(&self, list: RosterList, user_id: UserId) -> Result<(), RosterStoreError> {
        self.entries.insert((list, user_id));
        Ok(())
    }

    async fn remove(&self, list: RosterList, user_id: UserId) -> Result<(), RosterStoreError> {
        self.entries.remove(&(list, user_id));
        Ok(())
    }

    async fn contains(&self, list: RosterList, user_id: UserId) -> Result<bool, RosterStoreError> {
        Ok(self.entries.contains(&(list, user_id)))
    }
}
