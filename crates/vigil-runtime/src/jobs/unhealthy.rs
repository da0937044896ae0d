use std::sync::Arc;
use std::time::Duration;

use vigil_core::config::JobConfig;
use vigil_core::error::Result;
use vigil_core::store::Store;
use vigil_core::BoxFuture;

use super::{build_scope, main_user_from_env, option_u64, MaintainJob};

const DEFAULT_DELETE_TIMEOUT_SECS: u64 = 600;

/// Deletes instances that have stayed unhealthy past a configurable
/// timeout. Idempotent: rows already gone are simply not candidates.
pub struct DeleteUnhealthyInstanceJob {
    store: Arc<dyn Store>,
    main_user: String,
    interval: Duration,
    delete_timeout: Duration,
}

impl DeleteUnhealthyInstanceJob {
    /// Create the job; configuration arrives through `init`.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            main_user: String::new(),
            interval: Duration::from_secs(60),
            delete_timeout: Duration::from_secs(DEFAULT_DELETE_TIMEOUT_SECS),
        }
    }
}

impl MaintainJob for DeleteUnhealthyInstanceJob {
    fn name(&self) -> &'static str {
        "delete_unhealthy_instance"
    }

    fn init(&mut self, cfg: &JobConfig) -> Result<()> {
        self.main_user = main_user_from_env();
        self.interval = cfg.interval();
        self.delete_timeout = Duration::from_secs(option_u64(
            &cfg.option,
            "instance_delete_timeout_secs",
            DEFAULT_DELETE_TIMEOUT_SECS,
        )?);
        Ok(())
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn execute(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let rows = self.store.get_unhealthy_instances().await?;
            let now = chrono::Utc::now();
            let timeout = chrono::Duration::seconds(self.delete_timeout.as_secs() as i64);

            let ids: Vec<String> = rows
                .into_iter()
                .filter(|row| now - row.last_heartbeat >= timeout)
                .map(|row| row.id)
                .collect();
            if ids.is_empty() {
                tracing::debug!("no unhealthy instances past the delete timeout");
                return Ok(());
            }

            let scope = build_scope(self.store.as_ref(), &self.main_user).await?;
            self.store.batch_delete_instances(&scope, &ids).await?;
            tracing::info!(count = ids.len(), "deleted unhealthy instances");
            Ok(())
        })
    }

    fn clear(&self) {}
}
