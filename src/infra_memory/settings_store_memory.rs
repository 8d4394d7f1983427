use crate::domain_port::{SettingsStore, SettingsStoreError};
use dashmap::DashMap;

#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    values: DashMap<String, String>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn load_all(&self) -> Result<Vec<(String, String)>, SettingsStoreError> {
        Ok(self
            .values
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect())
    }

    async fn save(&self, key: &str, value: &str) -> Result<(), SettingsStoreError> {
        self.values.insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}
