use crate::application_impl::{
    FakeJoinGateway, RealAdminService, RuntimeSettings, VerificationEngine,
};
use crate::application_port::{AdminService, JoinGateway, VerificationService};
use crate::domain_model::{FailureAction, UserId, VerificationPolicy};
use crate::domain_port::{RecordStore, RosterStore, SettingsStore};
use crate::infra_memory::{MemoryRecordStore, MemoryRosterStore, MemorySettingsStore};
use crate::infra_sqlite::{SqliteRecordStore, SqliteRosterStore, SqliteSettingsStore, connect};
use crate::server::{Sweeper, TelegramJoinGateway, schema};
use crate::settings::Settings;
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use teloxide::Bot;
use teloxide::dispatching::Dispatcher;
use teloxide::dptree;
use teloxide::error_handlers::LoggingErrorHandler;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

pub struct Server {
    pub verification: Arc<dyn VerificationService>,
    pub admin: Arc<dyn AdminService>,
    bot: Bot,
    sweeper_handle: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
    pool: Option<SqlitePool>,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let defaults = VerificationPolicy {
            max_attempts: settings.verification.max_attempts,
            verify_timeout: Duration::from_secs(settings.verification.verify_timeout_secs),
            lang_timeout: Duration::from_secs(settings.verification.lang_timeout_secs),
            failure_action: FailureAction::parse(&settings.verification.failure_action)
                .ok_or_else(|| {
                    anyhow::anyhow!(
                        "Unknown failure action: {}",
                        settings.verification.failure_action
                    )
                })?,
        };

        let records: Arc<dyn RecordStore>;
        let roster: Arc<dyn RosterStore>;
        let settings_store: Arc<dyn SettingsStore>;
        let pool = match settings.storage.backend.as_str() {
            "sqlite" => {
                let pool = connect(&settings.storage.path).await?;
                records = Arc::new(SqliteRecordStore::new(pool.clone()));
                roster = Arc::new(SqliteRosterStore::new(pool.clone()));
                settings_store = Arc::new(SqliteSettingsStore::new(pool.clone()));
                Some(pool)
            }
            "memory" => {
                records = Arc::new(MemoryRecordStore::new());
                roster = Arc::new(MemoryRosterStore::new());
                settings_store = Arc::new(MemorySettingsStore::new());
                None
            }
            other => return Err(anyhow::anyhow!("Unknown storage backend: {}", other)),
        };

        let runtime_settings = Arc::new(RuntimeSettings::load(defaults, settings_store).await?);

        let bot = Bot::new(settings.bot.token.clone());
        let gateway: Arc<dyn JoinGateway> = match settings.gateway.backend.as_str() {
            "telegram" => Arc::new(TelegramJoinGateway::new(bot.clone())),
            "fake" => Arc::new(FakeJoinGateway::new()),
            other => return Err(anyhow::anyhow!("Unknown gateway backend: {}", other)),
        };

        let verification: Arc<dyn VerificationService> = Arc::new(VerificationEngine::new(
            records.clone(),
            roster.clone(),
            gateway.clone(),
            runtime_settings.clone(),
        ));

        let admin_ids: HashSet<UserId> =
            settings.bot.admin_ids.iter().copied().map(UserId).collect();
        let admin: Arc<dyn AdminService> = Arc::new(RealAdminService::new(
            admin_ids,
            records.clone(),
            roster,
            gateway,
            runtime_settings,
        ));

        let cancel = CancellationToken::new();
        let sweeper = Sweeper::new(
            records,
            verification.clone(),
            Duration::from_secs(settings.sweep.interval_secs),
            Duration::from_secs(settings.sweep.retention_days * SECONDS_PER_DAY),
            cancel.clone(),
        );
        let sweeper_handle = tokio::spawn(async move {
            let _ = sweeper.run().await;
        });

        info!("server started");

        Ok(Self {
            verification,
            admin,
            bot,
            sweeper_handle: Mutex::new(Some(sweeper_handle)),
            cancel,
            pool,
        })
    }

    /// Long-poll the platform for updates until interrupted.
    pub async fn run(&self) {
        Dispatcher::builder(self.bot.clone(), schema())
            .dependencies(dptree::deps![self.verification.clone(), self.admin.clone()])
            .default_handler(|upd| async move {
                let _ = upd;
            })
            .error_handler(LoggingErrorHandler::with_custom_text("Dispatcher error"))
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");

        self.cancel.cancel();

        if let Ok(mut lock) = self.sweeper_handle.lock() {
            if let Some(handle) = lock.take() {
                let r = handle.await;
                info!("sweeper handle dropped: {:?}", r);
            }
        }
        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}
