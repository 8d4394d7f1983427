use crate::domain_model::UserId;

/// Which admin-curated list a user sits on. Whitelisted users are eligible
/// for manual approval; blacklisted users never enter the pipeline.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum RosterList {
    Whitelist,
    Blacklist,
}

impl RosterList {
    pub fn as_str(&self) -> &'static str {
        match self {
            RosterList::Whitelist => "whitelist",
            RosterList::Blacklist => "blacklist",
        }
    }
}

#[async_trait::async_trait]
pub trait RosterStore: Send + Sync {
    async fn add(&self, list: RosterList, user_id: UserId) -> Result<(), RosterStoreError>;
    async fn remove(&self, list: RosterList, user_id: UserId) -> Result<(), RosterStoreError>;
    async fn contains(&self, list: RosterList, user_id: UserId) -> Result<bool, RosterStoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RosterStoreError {
    #[error("infra error: {0}")]
    Store(String),
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}
