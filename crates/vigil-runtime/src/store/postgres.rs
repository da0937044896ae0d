use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use sqlx::Row;
use tokio::sync::watch;
use uuid::Uuid;

use vigil_core::error::Result;
use vigil_core::store::{InstanceRow, RequestScope, ServiceRow, Store, User};
use vigil_core::BoxFuture;

use crate::hash::fnv1a64;

/// Leader election tuning.
#[derive(Debug, Clone)]
pub struct ElectionConfig {
    /// How often a campaign checks leader health / refreshes its lease.
    pub check_interval: Duration,
    /// Lease duration; the leader must refresh before expiry.
    pub lease_duration: Duration,
}

impl Default for ElectionConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(5),
            lease_duration: Duration::from_secs(60),
        }
    }
}

struct Campaign {
    is_leader: Arc<AtomicBool>,
    shutdown_tx: watch::Sender<bool>,
}

/// PostgreSQL-backed store.
///
/// Leader election rides on advisory locks: each election key hashes to a
/// lock id, a background campaign per key tries the lock and maintains a
/// lease row in `vigil_leaders` for visibility, and `is_leader` answers
/// from a local flag without touching the database.
pub struct PgStore {
    pool: sqlx::PgPool,
    node_id: Uuid,
    election: ElectionConfig,
    campaigns: Mutex<HashMap<String, Campaign>>,
}

impl PgStore {
    /// Create a store over an existing pool.
    pub fn new(pool: sqlx::PgPool, election: ElectionConfig) -> Self {
        Self {
            pool,
            node_id: Uuid::new_v4(),
            election,
            campaigns: Mutex::new(HashMap::new()),
        }
    }

    /// Connect to `url` with default election tuning.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await?;
        Ok(Self::new(pool, ElectionConfig::default()))
    }

    /// Identity of this process in the leader table.
    pub fn node_id(&self) -> Uuid {
        self.node_id
    }

    /// Resign from every campaign. Each campaign releases its lock and
    /// lease on the way out.
    pub fn stop(&self) {
        let campaigns = self.campaigns.lock().expect("campaign lock poisoned");
        for campaign in campaigns.values() {
            let _ = campaign.shutdown_tx.send(true);
        }
    }

    fn advisory_lock_id(key: &str) -> i64 {
        fnv1a64(key) as i64
    }
}

struct CampaignRunner {
    pool: sqlx::PgPool,
    key: String,
    lock_id: i64,
    node_id: Uuid,
    config: ElectionConfig,
    is_leader: Arc<AtomicBool>,
}

impl CampaignRunner {
    async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.config.check_interval) => {
                    if self.is_leader.load(Ordering::SeqCst) {
                        if let Err(e) = self.refresh_lease().await {
                            tracing::warn!(key = %self.key, error = %e, "failed to refresh lease");
                        }
                    } else {
                        match self.leader_is_healthy().await {
                            Ok(true) => {}
                            Ok(false) => {
                                if let Err(e) = self.try_become_leader().await {
                                    tracing::warn!(key = %self.key, error = %e, "failed to acquire leadership");
                                }
                            }
                            Err(e) => {
                                tracing::warn!(key = %self.key, error = %e, "failed to check leader health");
                            }
                        }
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        if let Err(e) = self.release_leadership().await {
                            tracing::warn!(key = %self.key, error = %e, "failed to release leadership");
                        }
                        tracing::info!(key = %self.key, "election campaign shutting down");
                        break;
                    }
                }
            }
        }
    }

    async fn try_become_leader(&self) -> Result<()> {
        let result: Option<(bool,)> = sqlx::query_as("SELECT pg_try_advisory_lock($1) as acquired")
            .bind(self.lock_id)
            .fetch_optional(&self.pool)
            .await?;

        let acquired = result.map(|(v,)| v).unwrap_or(false);
        if !acquired {
            return Ok(());
        }

        let lease_until =
            Utc::now() + chrono::Duration::seconds(self.config.lease_duration.as_secs() as i64);

        sqlx::query(
            r#"
            INSERT INTO vigil_leaders (elect_key, node_id, acquired_at, lease_until)
            VALUES ($1, $2, NOW(), $3)
            ON CONFLICT (elect_key) DO UPDATE SET
                node_id = EXCLUDED.node_id,
                acquired_at = NOW(),
                lease_until = EXCLUDED.lease_until
            "#,
        )
        .bind(&self.key)
        .bind(self.node_id)
        .bind(lease_until)
        .execute(&self.pool)
        .await?;

        self.is_leader.store(true, Ordering::SeqCst);
        tracing::info!(key = %self.key, "became leader");
        Ok(())
    }

    async fn refresh_lease(&self) -> Result<()> {
        let lease_until =
            Utc::now() + chrono::Duration::seconds(self.config.lease_duration.as_secs() as i64);

        sqlx::query(
            r#"
            UPDATE vigil_leaders
            SET lease_until = $3
            WHERE elect_key = $1 AND node_id = $2
            "#,
        )
        .bind(&self.key)
        .bind(self.node_id)
        .bind(lease_until)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn leader_is_healthy(&self) -> Result<bool> {
        let result: Option<(chrono::DateTime<Utc>,)> =
            sqlx::query_as("SELECT lease_until FROM vigil_leaders WHERE elect_key = $1")
                .bind(&self.key)
                .fetch_optional(&self.pool)
                .await?;

        match result {
            Some((lease_until,)) => Ok(lease_until > Utc::now()),
            None => Ok(false),
        }
    }

    async fn release_leadership(&self) -> Result<()> {
        if !self.is_leader.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        sqlx::query("SELECT pg_advisory_unlock($1)")
            .bind(self.lock_id)
            .execute(&self.pool)
            .await?;

        sqlx::query("DELETE FROM vigil_leaders WHERE elect_key = $1 AND node_id = $2")
            .bind(&self.key)
            .bind(self.node_id)
            .execute(&self.pool)
            .await?;

        tracing::info!(key = %self.key, "released leadership");
        Ok(())
    }
}

impl Store for PgStore {
    fn start_leader_election(&self, key: &str) -> BoxFuture<'_, Result<()>> {
        let key = key.to_string();
        Box::pin(async move {
            let mut campaigns = self.campaigns.lock().expect("campaign lock poisoned");
            if campaigns.contains_key(&key) {
                return Ok(());
            }

            let is_leader = Arc::new(AtomicBool::new(false));
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            let runner = CampaignRunner {
                pool: self.pool.clone(),
                key: key.clone(),
                lock_id: Self::advisory_lock_id(&key),
                node_id: self.node_id,
                config: self.election.clone(),
                is_leader: is_leader.clone(),
            };
            tokio::spawn(runner.run(shutdown_rx));

            campaigns.insert(
                key,
                Campaign {
                    is_leader,
                    shutdown_tx,
                },
            );
            Ok(())
        })
    }

    fn is_leader(&self, key: &str) -> bool {
        let campaigns = self.campaigns.lock().expect("campaign lock poisoned");
        campaigns
            .get(key)
            .map(|c| c.is_leader.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    fn get_user_by_name(&self, name: &str, owner: &str) -> BoxFuture<'_, Result<Option<User>>> {
        let name = name.to_string();
        let owner = owner.to_string();
        Box::pin(async move {
            let row: Option<(Uuid, String, String, String)> = sqlx::query_as(
                r#"
                SELECT id, name, owner, token
                FROM vigil_users
                WHERE name = $1 AND owner = $2
                "#,
            )
            .bind(name)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await?;

            Ok(row.map(|(id, name, owner, token)| User {
                id,
                name,
                owner,
                token,
            }))
        })
    }

    fn get_unhealthy_instances(&self) -> BoxFuture<'_, Result<Vec<InstanceRow>>> {
        Box::pin(async move {
            let rows = sqlx::query(
                r#"
                SELECT id, healthy, last_heartbeat
                FROM vigil_instances
                WHERE healthy = FALSE AND deleted_at IS NULL
                "#,
            )
            .fetch_all(&self.pool)
            .await?;

            Ok(rows
                .into_iter()
                .map(|row| InstanceRow {
                    id: row.get("id"),
                    healthy: row.get("healthy"),
                    last_heartbeat: row.get("last_heartbeat"),
                })
                .collect())
        })
    }

    fn batch_delete_instances(
        &self,
        scope: &RequestScope,
        ids: &[String],
    ) -> BoxFuture<'_, Result<()>> {
        let operator = scope.operator.clone();
        let ids = ids.to_vec();
        Box::pin(async move {
            if ids.is_empty() {
                return Ok(());
            }
            sqlx::query(
                r#"
                UPDATE vigil_instances
                SET deleted_at = NOW(), deleted_by = $2
                WHERE id = ANY($1) AND deleted_at IS NULL
                "#,
            )
            .bind(&ids)
            .bind(operator)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
    }

    fn get_empty_auto_created_services(&self) -> BoxFuture<'_, Result<Vec<ServiceRow>>> {
        Box::pin(async move {
            let rows = sqlx::query(
                r#"
                SELECT s.id, s.name, s.namespace, s.auto_created, s.modify_time
                FROM vigil_services s
                WHERE s.auto_created = TRUE
                  AND s.deleted_at IS NULL
                  AND NOT EXISTS (
                      SELECT 1 FROM vigil_instances i
                      WHERE i.service_id = s.id AND i.deleted_at IS NULL
                  )
                "#,
            )
            .fetch_all(&self.pool)
            .await?;

            Ok(rows
                .into_iter()
                .map(|row| ServiceRow {
                    id: row.get("id"),
                    name: row.get("name"),
                    namespace: row.get("namespace"),
                    auto_created: row.get("auto_created"),
                    modify_time: row.get("modify_time"),
                })
                .collect())
        })
    }

    fn batch_delete_services(
        &self,
        scope: &RequestScope,
        ids: &[String],
    ) -> BoxFuture<'_, Result<()>> {
        let operator = scope.operator.clone();
        let ids = ids.to_vec();
        Box::pin(async move {
            if ids.is_empty() {
                return Ok(());
            }
            sqlx::query(
                r#"
                UPDATE vigil_services
                SET deleted_at = NOW(), deleted_by = $2
                WHERE id = ANY($1) AND deleted_at IS NULL
                "#,
            )
            .bind(&ids)
            .bind(operator)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
    }

    fn clean_deleted_instances(
        &self,
        scope: &RequestScope,
        retention: Duration,
        batch: u32,
    ) -> BoxFuture<'_, Result<u64>> {
        let operator = scope.operator.clone();
        Box::pin(async move {
            let result = sqlx::query(
                r#"
                DELETE FROM vigil_instances
                WHERE id IN (
                    SELECT id FROM vigil_instances
                    WHERE deleted_at IS NOT NULL
                      AND deleted_at < NOW() - make_interval(secs => $1)
                    LIMIT $2
                )
                "#,
            )
            .bind(retention.as_secs() as f64)
            .bind(batch as i64)
            .execute(&self.pool)
            .await?;

            let reaped = result.rows_affected();
            tracing::debug!(operator = %operator, rows = reaped, "cleaned instance tombstones");
            Ok(reaped)
        })
    }

    fn clean_deleted_clients(
        &self,
        scope: &RequestScope,
        retention: Duration,
        batch: u32,
    ) -> BoxFuture<'_, Result<u64>> {
        let operator = scope.operator.clone();
        Box::pin(async move {
            let result = sqlx::query(
                r#"
                DELETE FROM vigil_clients
                WHERE id IN (
                    SELECT id FROM vigil_clients
                    WHERE deleted_at IS NOT NULL
                      AND deleted_at < NOW() - make_interval(secs => $1)
                    LIMIT $2
                )
                "#,
            )
            .bind(retention.as_secs() as f64)
            .bind(batch as i64)
            .execute(&self.pool)
            .await?;

            let reaped = result.rows_affected();
            tracing::debug!(operator = %operator, rows = reaped, "cleaned client tombstones");
            Ok(reaped)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lazy_store() -> PgStore {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(1)
            .connect_lazy("postgres://localhost/nonexistent")
            .expect("Failed to create lazy pool");
        PgStore::new(pool, ElectionConfig::default())
    }

    #[test]
    fn test_election_config_default() {
        let config = ElectionConfig::default();
        assert_eq!(config.check_interval, Duration::from_secs(5));
        assert_eq!(config.lease_duration, Duration::from_secs(60));
    }

    #[test]
    fn test_lock_ids_are_stable_and_distinct() {
        let a = PgStore::advisory_lock_id("MAINTAIN_JOB/clean_deleted_instances");
        let b = PgStore::advisory_lock_id("MAINTAIN_JOB/clean_deleted_clients");
        assert_eq!(a, PgStore::advisory_lock_id("MAINTAIN_JOB/clean_deleted_instances"));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_campaign_is_idempotent_and_starts_as_follower() {
        let store = lazy_store();

        store.start_leader_election("MAINTAIN_JOB/demo").await.unwrap();
        store.start_leader_election("MAINTAIN_JOB/demo").await.unwrap();

        assert_eq!(store.campaigns.lock().unwrap().len(), 1);
        assert!(!store.is_leader("MAINTAIN_JOB/demo"));
        assert!(!store.is_leader("MAINTAIN_JOB/never-started"));
        store.stop();
    }
}
