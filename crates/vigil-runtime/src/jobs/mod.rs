mod clean;
mod empty_service;
mod unhealthy;

pub use clean::{CleanDeletedClientsJob, CleanDeletedInstancesJob};
pub use empty_service::DeleteEmptyAutoCreatedServiceJob;
pub use unhealthy::DeleteUnhealthyInstanceJob;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use vigil_core::config::JobConfig;
use vigil_core::error::{Result, VigilError};
use vigil_core::store::{ELECTION_KEY_MAINTAIN_JOB_PREFIX, RequestScope, Store};
use vigil_core::BoxFuture;

/// Operator label recorded against every store mutation the maintenance
/// jobs perform.
pub const MAINTAIN_OPERATOR: &str = "maintain-job";

/// Environment variable naming the master account the jobs act as.
pub const MAIN_USER_ENV: &str = "POLARIS_MAIN_USER";

const DEFAULT_MAIN_USER: &str = "polaris";

/// A periodic housekeeping job. Exactly one cluster member executes any
/// given job; the others tick as followers.
pub trait MaintainJob: Send + Sync {
    /// Registered job name.
    fn name(&self) -> &'static str;

    /// Parse options and capture environment. Called once before the first
    /// tick; failures abort startup.
    fn init(&mut self, cfg: &JobConfig) -> Result<()>;

    /// Tick interval, valid after `init`.
    fn interval(&self) -> Duration;

    /// One leader-side execution. Errors are logged by the runner; the
    /// ticker survives them.
    fn execute(&self) -> BoxFuture<'_, Result<()>>;

    /// Release leader-only in-memory state. Called on every follower tick,
    /// not at shutdown.
    fn clear(&self);
}

/// Name of the master account, captured from the environment once at init.
pub(crate) fn main_user_from_env() -> String {
    std::env::var(MAIN_USER_ENV).unwrap_or_else(|_| DEFAULT_MAIN_USER.to_string())
}

/// Build the audited scope the jobs mutate the store under.
pub(crate) async fn build_scope(store: &dyn Store, main_user: &str) -> Result<RequestScope> {
    let user = store
        .get_user_by_name(main_user, "")
        .await?
        .ok_or_else(|| VigilError::NotFound(format!("master account {} not found", main_user)))?;
    Ok(RequestScope {
        token: user.token,
        operator: MAINTAIN_OPERATOR.to_string(),
    })
}

/// Read a u64 job option, falling back to `default` when absent.
pub(crate) fn option_u64(
    options: &HashMap<String, serde_json::Value>,
    key: &str,
    default: u64,
) -> Result<u64> {
    match options.get(key) {
        None => Ok(default),
        Some(value) => value.as_u64().ok_or_else(|| {
            VigilError::Config(format!("job option {} must be a non-negative integer", key))
        }),
    }
}

/// Runner for the configured maintenance jobs.
///
/// Each enabled job gets its own election campaign on
/// `MAINTAIN_JOB/<name>` and its own ticker. A tick is a no-op on
/// followers (beyond releasing leader-only state) and an execution on the
/// leader, so the cluster performs every job exactly once per interval.
pub struct MaintainJobs {
    jobs: HashMap<String, Box<dyn MaintainJob>>,
    started: HashMap<String, Arc<dyn MaintainJob>>,
    store: Arc<dyn Store>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl MaintainJobs {
    /// Create a runner with the builtin job catalog registered.
    pub fn new(store: Arc<dyn Store>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut runner = Self {
            jobs: HashMap::new(),
            started: HashMap::new(),
            store: store.clone(),
            shutdown_tx,
            shutdown_rx,
        };
        runner.register(Box::new(DeleteUnhealthyInstanceJob::new(store.clone())));
        runner.register(Box::new(DeleteEmptyAutoCreatedServiceJob::new(store.clone())));
        runner.register(Box::new(CleanDeletedInstancesJob::new(store.clone())));
        runner.register(Box::new(CleanDeletedClientsJob::new(store)));
        runner
    }

    /// Register an additional job. Must happen before `start`.
    pub fn register(&mut self, job: Box<dyn MaintainJob>) {
        self.jobs.insert(job.name().to_string(), job);
    }

    /// Names of the jobs currently running.
    pub fn started_jobs(&self) -> Vec<String> {
        self.started.keys().cloned().collect()
    }

    /// Initialize and launch every enabled job.
    ///
    /// Unknown names, duplicate names and init failures are configuration
    /// errors and abort startup.
    pub async fn start(&mut self, configs: &[JobConfig]) -> Result<()> {
        for cfg in configs {
            if !cfg.enable {
                tracing::info!(job = %cfg.name, "maintain job not enabled");
                continue;
            }
            let mut job = match self.jobs.remove(&cfg.name) {
                Some(job) => job,
                None if self.started.contains_key(&cfg.name) => {
                    return Err(VigilError::Config(format!(
                        "maintain job {} duplicated",
                        cfg.name
                    )));
                }
                None => {
                    return Err(VigilError::Config(format!(
                        "maintain job {} not exist",
                        cfg.name
                    )));
                }
            };
            job.init(cfg).map_err(|e| {
                tracing::error!(job = %cfg.name, error = %e, "maintain job failed to init");
                e
            })?;

            let election_key = format!("{}{}", ELECTION_KEY_MAINTAIN_JOB_PREFIX, cfg.name);
            self.store.start_leader_election(&election_key).await?;

            let job: Arc<dyn MaintainJob> = Arc::from(job);
            spawn_job_ticker(
                cfg.name.clone(),
                election_key,
                job.clone(),
                self.store.clone(),
                self.shutdown_rx.clone(),
            );
            self.started.insert(cfg.name.clone(), job);
        }
        Ok(())
    }

    /// Stop every ticker at its next tick boundary. In-flight executions
    /// run to completion; `clear` is not called here.
    pub fn stop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        self.started.clear();
    }
}

fn spawn_job_ticker(
    name: String,
    election_key: String,
    job: Arc<dyn MaintainJob>,
    store: Arc<dyn Store>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let interval = job.interval();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    if !store.is_leader(&election_key) {
                        tracing::info!(job = %name, "I am follower");
                        job.clear();
                        continue;
                    }
                    tracing::info!(job = %name, "I am leader, job start");
                    if let Err(e) = job.execute().await {
                        tracing::error!(job = %name, error = %e, "job execution failed");
                    }
                    tracing::info!(job = %name, "I am leader, job end");
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!(job = %name, "job ticker shutting down");
                        break;
                    }
                }
            }
        }
    });
}
