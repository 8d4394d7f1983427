/// Persisted runtime policy overrides, so admin settings changes survive a
/// restart. Values are stored as strings keyed by setting name.
#[async_trait::async_trait]
pub trait SettingsStore: Send + Sync {
    async fn load_all(&self) -> Result<Vec<(String, String)>, SettingsStoreError>;
    async fn save(&self, key: &str, value: &str) -> Result<(), SettingsStoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsStoreError {
    #[error("infra error: {0}")]
    Store(String),
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}
