use crate::application_port::AdminError;
use crate::domain_model::{FailureAction, VerificationPolicy};
use crate::domain_port::{SettingsStore, SettingsStoreError};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::warn;

const KEY_MAX_ATTEMPTS: &str = "max_attempts";
const KEY_VERIFY_TIMEOUT: &str = "verify_timeout";
const KEY_LANG_TIMEOUT: &str = "lang_timeout";
const KEY_FAILURE_ACTION: &str = "failure_action";

/// Process-wide verification policy with a thread-safe mutation interface.
///
/// Injected into the engine at construction; mutations persist through the
/// settings store first and only then become visible, so a storage failure
/// retains the prior value. Changes apply to records created or re-prompted
/// afterwards, never to an in-flight deadline.
pub struct RuntimeSettings {
    policy: RwLock<VerificationPolicy>,
    store: Arc<dyn SettingsStore>,
}

impl RuntimeSettings {
    /// Start from configured defaults, overlaid with any persisted overrides.
    pub async fn load(
        defaults: VerificationPolicy,
        store: Arc<dyn SettingsStore>,
    ) -> Result<Self, SettingsStoreError> {
        let mut policy = defaults;
        for (key, value) in store.load_all().await? {
            match key.as_str() {
                KEY_MAX_ATTEMPTS => match value.parse::<u32>() {
                    Ok(n) if n >= 1 => policy.max_attempts = n,
                    _ => warn!(%value, "ignoring persisted max_attempts"),
                },
                KEY_VERIFY_TIMEOUT => match value.parse::<u64>() {
                    Ok(s) if s >= 1 => policy.verify_timeout = Duration::from_secs(s),
                    _ => warn!(%value, "ignoring persisted verify_timeout"),
                },
                KEY_LANG_TIMEOUT => match value.parse::<u64>() {
                    Ok(s) if s >= 1 => policy.lang_timeout = Duration::from_secs(s),
                    _ => warn!(%value, "ignoring persisted lang_timeout"),
                },
                KEY_FAILURE_ACTION => match FailureAction::parse(&value) {
                    Some(action) => policy.failure_action = action,
                    None => warn!(%value, "ignoring persisted failure_action"),
                },
                other => warn!(key = %other, "unknown persisted setting"),
            }
        }
        Ok(Self {
            policy: RwLock::new(policy),
            store,
        })
    }

    /// Snapshot of the current effective policy.
    pub fn policy(&self) -> VerificationPolicy {
        *self.policy.read().unwrap_or_else(|e| e.into_inner())
    }

    pub async fn set_max_attempts(&self, value: u32) -> Result<(), AdminError> {
        if value == 0 {
            return Err(AdminError::InvalidValue(
                "max attempts must be at least 1".to_owned(),
            ));
        }
        self.store.save(KEY_MAX_ATTEMPTS, &value.to_string()).await?;
        self.policy
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .max_attempts = value;
        Ok(())
    }

    pub async fn set_verify_timeout(&self, secs: u64) -> Result<(), AdminError> {
        if secs == 0 {
            return Err(AdminError::InvalidValue(
                "timeout must be a positive number of seconds".to_owned(),
            ));
        }
        self.store.save(KEY_VERIFY_TIMEOUT, &secs.to_string()).await?;
        self.policy
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .verify_timeout = Duration::from_secs(secs);
        Ok(())
    }

    pub async fn set_lang_timeout(&self, secs: u64) -> Result<(), AdminError> {
        if secs == 0 {
            return Err(AdminError::InvalidValue(
                "timeout must be a positive number of seconds".to_owned(),
            ));
        }
        self.store.save(KEY_LANG_TIMEOUT, &secs.to_string()).await?;
        self.policy
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .lang_timeout = Duration::from_secs(secs);
        Ok(())
    }

    pub async fn set_failure_action(&self, action: FailureAction) -> Result<(), AdminError> {
        self.store.save(KEY_FAILURE_ACTION, action.as_str()).await?;
        self.policy
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .failure_action = action;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra_memory::MemorySettingsStore;

    #[tokio::test]
    async fn overrides_survive_reload() {
        let store = Arc::new(MemorySettingsStore::new());
        let settings = RuntimeSettings::load(VerificationPolicy::default(), store.clone())
            .await
            .unwrap();
        settings.set_max_attempts(5).await.unwrap();
        settings.set_verify_timeout(60).await.unwrap();
        settings.set_failure_action(FailureAction::Pending).await.unwrap();

        let reloaded = RuntimeSettings::load(VerificationPolicy::default(), store)
            .await
            .unwrap();
        let policy = reloaded.policy();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.verify_timeout, Duration::from_secs(60));
        assert_eq!(policy.failure_action, FailureAction::Pending);
    }

    #[tokio::test]
    async fn invalid_values_keep_prior_setting() {
        let store = Arc::new(MemorySettingsStore::new());
        let settings = RuntimeSettings::load(VerificationPolicy::default(), store)
            .await
            .unwrap();

        assert!(matches!(
            settings.set_max_attempts(0).await,
            Err(AdminError::InvalidValue(_))
        ));
        assert!(matches!(
            settings.set_verify_timeout(0).await,
            Err(AdminError::InvalidValue(_))
        ));
        let policy = settings.policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.verify_timeout, Duration::from_secs(120));
    }

    #[tokio::test]
    async fn garbage_persisted_rows_are_ignored() {
        let store = Arc::new(MemorySettingsStore::new());
        store.save(KEY_MAX_ATTEMPTS, "not-a-number").await.unwrap();
        store.save(KEY_FAILURE_ACTION, "explode").await.unwrap();
        let settings = RuntimeSettings::load(VerificationPolicy::default(), store)
            .await
            .unwrap();
        let policy = settings.policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.failure_action, FailureAction::Reject);
    }
}
