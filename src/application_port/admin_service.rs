use crate::domain_model::{ChatId, FailureAction, UserId, VerificationStatus};
use crate::domain_port::{RecordStoreError, RosterStoreError, SettingsStoreError};

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("caller is not an admin")]
    NotAdmin,
    #[error("user is not whitelisted for manual approval")]
    NotWhitelisted,
    #[error("invalid value: {0}")]
    InvalidValue(String),
    #[error("storage rejected the command: {0}")]
    Store(String),
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<RecordStoreError> for AdminError {
    fn from(err: RecordStoreError) -> Self {
        match err {
            RecordStoreError::Conflict { key } => {
                AdminError::Store(format!("concurrent update lost for {key}"))
            }
            RecordStoreError::Store(e) => AdminError::Store(e),
            RecordStoreError::InternalError(e) => AdminError::InternalError(e),
        }
    }
}

impl From<RosterStoreError> for AdminError {
    fn from(err: RosterStoreError) -> Self {
        match err {
            RosterStoreError::Store(e) => AdminError::Store(e),
            RosterStoreError::InternalError(e) => AdminError::InternalError(e),
        }
    }
}

impl From<SettingsStoreError> for AdminError {
    fn from(err: SettingsStoreError) -> Self {
        match err {
            SettingsStoreError::Store(e) => AdminError::Store(e),
            SettingsStoreError::InternalError(e) => AdminError::InternalError(e),
        }
    }
}

/// Manual overrides and settings mutation. Every operation authenticates the
/// caller against the configured admin list first; a denied command changes
/// no state.
#[async_trait::async_trait]
pub trait AdminService: Send + Sync {
    /// Manual approval. Only valid for whitelisted users (an explicit
    /// admin-verified bypass); sets the record terminal regardless of phase.
    async fn approve(&self, caller: UserId, user_id: UserId, chat_id: ChatId)
    -> Result<(), AdminError>;

    async fn reject(&self, caller: UserId, user_id: UserId, chat_id: ChatId)
    -> Result<(), AdminError>;

    async fn whitelist_add(&self, caller: UserId, user_id: UserId) -> Result<(), AdminError>;
    async fn whitelist_remove(&self, caller: UserId, user_id: UserId) -> Result<(), AdminError>;
    async fn blacklist_add(&self, caller: UserId, user_id: UserId) -> Result<(), AdminError>;
    async fn blacklist_remove(&self, caller: UserId, user_id: UserId) -> Result<(), AdminError>;

    /// Policy mutation; applies to records created or re-prompted afterwards.
    async fn set_max_attempts(&self, caller: UserId, value: u32) -> Result<(), AdminError>;
    async fn set_verify_timeout(&self, caller: UserId, secs: u64) -> Result<(), AdminError>;
    async fn set_lang_timeout(&self, caller: UserId, secs: u64) -> Result<(), AdminError>;
    async fn set_failure_action(
        &self,
        caller: UserId,
        action: FailureAction,
    ) -> Result<(), AdminError>;

    /// Aggregate record counts by status, optionally scoped to one chat.
    async fn status(
        &self,
        caller: UserId,
        chat_id: Option<ChatId>,
    ) -> Result<Vec<(VerificationStatus, u64)>, AdminError>;
}
