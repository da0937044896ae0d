use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};

use vigil_core::config::JobConfig;
use vigil_core::error::Result;
use vigil_core::store::Store;
use vigil_core::BoxFuture;

use super::{build_scope, main_user_from_env, option_u64, MaintainJob};

const DEFAULT_SERVICE_DELETE_TIMEOUT_SECS: u64 = 1800;

/// Deletes auto-created services that have stayed empty for a quiet period.
///
/// The job remembers when each candidate was first seen empty; a service is
/// only deleted once it has been continuously empty for the whole period.
/// That memory is leader-only state: `clear` wipes it on every follower
/// tick so a freshly promoted leader starts observing from scratch.
pub struct DeleteEmptyAutoCreatedServiceJob {
    store: Arc<dyn Store>,
    main_user: String,
    interval: Duration,
    quiet_period: Duration,
    empty_since: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl DeleteEmptyAutoCreatedServiceJob {
    /// Create the job; configuration arrives through `init`.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            main_user: String::new(),
            interval: Duration::from_secs(60),
            quiet_period: Duration::from_secs(DEFAULT_SERVICE_DELETE_TIMEOUT_SECS),
            empty_since: Mutex::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    pub(crate) fn tracked(&self) -> usize {
        self.empty_since.lock().unwrap().len()
    }
}

impl MaintainJob for DeleteEmptyAutoCreatedServiceJob {
    fn name(&self) -> &'static str {
        "delete_empty_auto_created_service"
    }

    fn init(&mut self, cfg: &JobConfig) -> Result<()> {
        self.main_user = main_user_from_env();
        self.interval = cfg.interval();
        self.quiet_period = Duration::from_secs(option_u64(
            &cfg.option,
            "service_delete_timeout_secs",
            DEFAULT_SERVICE_DELETE_TIMEOUT_SECS,
        )?);
        Ok(())
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn execute(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let candidates = self.store.get_empty_auto_created_services().await?;
            let now = Utc::now();
            let quiet = chrono::Duration::seconds(self.quiet_period.as_secs() as i64);

            let expired: Vec<String> = {
                let mut empty_since = self.empty_since.lock().unwrap();

                // Services that regained instances stop being candidates.
                let candidate_ids: std::collections::HashSet<&str> =
                    candidates.iter().map(|s| s.id.as_str()).collect();
                empty_since.retain(|id, _| candidate_ids.contains(id.as_str()));

                candidates
                    .iter()
                    .filter(|service| {
                        let first_seen = *empty_since.entry(service.id.clone()).or_insert(now);
                        now - first_seen >= quiet
                    })
                    .map(|service| service.id.clone())
                    .collect()
            };
            if expired.is_empty() {
                return Ok(());
            }

            let scope = build_scope(self.store.as_ref(), &self.main_user).await?;
            self.store.batch_delete_services(&scope, &expired).await?;
            {
                let mut empty_since = self.empty_since.lock().unwrap();
                for id in &expired {
                    empty_since.remove(id);
                }
            }
            tracing::info!(count = expired.len(), "deleted empty auto-created services");
            Ok(())
        })
    }

    fn clear(&self) {
        self.empty_since.lock().unwrap().clear();
    }
}
