use std::sync::Arc;
use std::time::Duration;

use vigil_core::config::JobConfig;
use vigil_core::error::Result;
use vigil_core::store::Store;
use vigil_core::BoxFuture;

use super::{build_scope, main_user_from_env, option_u64, MaintainJob};

const DEFAULT_RETENTION_SECS: u64 = 600;
const DEFAULT_BATCH_SIZE: u64 = 100;

/// Reaps instance tombstones once their retention has lapsed.
pub struct CleanDeletedInstancesJob {
    store: Arc<dyn Store>,
    main_user: String,
    interval: Duration,
    retention: Duration,
    batch_size: u32,
}

impl CleanDeletedInstancesJob {
    /// Create the job; configuration arrives through `init`.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            main_user: String::new(),
            interval: Duration::from_secs(60),
            retention: Duration::from_secs(DEFAULT_RETENTION_SECS),
            batch_size: DEFAULT_BATCH_SIZE as u32,
        }
    }
}

impl MaintainJob for CleanDeletedInstancesJob {
    fn name(&self) -> &'static str {
        "clean_deleted_instances"
    }

    fn init(&mut self, cfg: &JobConfig) -> Result<()> {
        self.main_user = main_user_from_env();
        self.interval = cfg.interval();
        self.retention = Duration::from_secs(option_u64(
            &cfg.option,
            "retention_secs",
            DEFAULT_RETENTION_SECS,
        )?);
        self.batch_size = option_u64(&cfg.option, "batch_size", DEFAULT_BATCH_SIZE)? as u32;
        Ok(())
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn execute(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let scope = build_scope(self.store.as_ref(), &self.main_user).await?;
            let reaped = self
                .store
                .clean_deleted_instances(&scope, self.retention, self.batch_size)
                .await?;
            if reaped > 0 {
                tracing::info!(rows = reaped, "reaped deleted instance rows");
            }
            Ok(())
        })
    }

    fn clear(&self) {}
}

/// Reaps client tombstones once their retention has lapsed.
pub struct CleanDeletedClientsJob {
    store: Arc<dyn Store>,
    main_user: String,
    interval: Duration,
    retention: Duration,
    batch_size: u32,
}

impl CleanDeletedClientsJob {
    /// Create the job; configuration arrives through `init`.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            main_user: String::new(),
            interval: Duration::from_secs(60),
            retention: Duration::from_secs(DEFAULT_RETENTION_SECS),
            batch_size: DEFAULT_BATCH_SIZE as u32,
        }
    }
}

impl MaintainJob for CleanDeletedClientsJob {
    fn name(&self) -> &'static str {
        "clean_deleted_clients"
    }

    fn init(&mut self, cfg: &JobConfig) -> Result<()> {
        self.main_user = main_user_from_env();
        self.interval = cfg.interval();
        self.retention = Duration::from_secs(option_u64(
            &cfg.option,
            "retention_secs",
            DEFAULT_RETENTION_SECS,
        )?);
        self.batch_size = option_u64(&cfg.option, "batch_size", DEFAULT_BATCH_SIZE)? as u32;
        Ok(())
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn execute(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let scope = build_scope(self.store.as_ref(), &self.main_user).await?;
            let reaped = self
                .store
                .clean_deleted_clients(&scope, self.retention, self.batch_size)
                .await?;
            if reaped > 0 {
                tracing::info!(rows = reaped, "reaped deleted client rows");
            }
            Ok(())
        })
    }

    fn clear(&self) {}
}
