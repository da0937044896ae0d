use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::BoxFuture;

/// Election keys for maintenance jobs are `MAINTAIN_JOB/<job_name>`.
pub const ELECTION_KEY_MAINTAIN_JOB_PREFIX: &str = "MAINTAIN_JOB/";

/// Explicit per-request authorization scope threaded through store mutations
/// so they are audited. Replaces implicit context keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestScope {
    /// Account token authorizing the mutation.
    pub token: String,
    /// Operator label recorded against the mutation.
    pub operator: String,
}

/// A registry account.
#[derive(Debug, Clone)]
pub struct User {
    /// Row id.
    pub id: Uuid,
    /// Account name.
    pub name: String,
    /// Owning account name, empty for top-level accounts.
    pub owner: String,
    /// Access token.
    pub token: String,
}

/// A registered service instance as the maintenance jobs see it.
#[derive(Debug, Clone)]
pub struct InstanceRow {
    /// Instance id.
    pub id: String,
    /// Persisted health bit.
    pub healthy: bool,
    /// Last heartbeat the health scheduler persisted.
    pub last_heartbeat: DateTime<Utc>,
}

/// A registered service as the maintenance jobs see it.
#[derive(Debug, Clone)]
pub struct ServiceRow {
    /// Service id.
    pub id: String,
    /// Service name.
    pub name: String,
    /// Namespace the service lives in.
    pub namespace: String,
    /// Whether the service was auto-created on first registration.
    pub auto_created: bool,
    /// Last write to the service row.
    pub modify_time: DateTime<Utc>,
}

/// Persistence contract consumed by the liveness core.
///
/// The store provides atomic leader acquisition and must guarantee at most
/// one leader per election key across the cluster. `start_leader_election`
/// is idempotent and non-blocking; the campaign runs in the background and
/// `is_leader` answers from local state without suspending.
pub trait Store: Send + Sync {
    /// Join the campaign for `key`. Safe to call more than once.
    fn start_leader_election(&self, key: &str) -> BoxFuture<'_, Result<()>>;

    /// Whether this process currently holds leadership for `key`.
    fn is_leader(&self, key: &str) -> bool;

    /// Look up an account by name under `owner` (empty for top-level).
    fn get_user_by_name(&self, name: &str, owner: &str) -> BoxFuture<'_, Result<Option<User>>>;

    /// Instances whose persisted health bit is false, tombstones excluded.
    fn get_unhealthy_instances(&self) -> BoxFuture<'_, Result<Vec<InstanceRow>>>;

    /// Soft-delete instances. Missing ids are ignored.
    fn batch_delete_instances(
        &self,
        scope: &RequestScope,
        ids: &[String],
    ) -> BoxFuture<'_, Result<()>>;

    /// Auto-created services that currently have zero non-deleted instances.
    fn get_empty_auto_created_services(&self) -> BoxFuture<'_, Result<Vec<ServiceRow>>>;

    /// Soft-delete services. Missing ids are ignored.
    fn batch_delete_services(
        &self,
        scope: &RequestScope,
        ids: &[String],
    ) -> BoxFuture<'_, Result<()>>;

    /// Hard-delete up to `batch` instance tombstones older than `retention`.
    /// Returns the number of rows reaped.
    fn clean_deleted_instances(
        &self,
        scope: &RequestScope,
        retention: Duration,
        batch: u32,
    ) -> BoxFuture<'_, Result<u64>>;

    /// Hard-delete up to `batch` client tombstones older than `retention`.
    /// Returns the number of rows reaped.
    fn clean_deleted_clients(
        &self,
        scope: &RequestScope,
        retention: Duration,
        batch: u32,
    ) -> BoxFuture<'_, Result<u64>>;
}
