use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use vigil_core::beat::{HeartbeatRecord, WriteBeatRecord};
use vigil_core::check::{
    CheckRequest, CheckResponse, HealthCheckKind, HealthChecker, QueryRequest, QueryResponse,
    ReportRequest,
};
use vigil_core::error::Result;
use vigil_core::BoxFuture;

use crate::cache::BeatRecordCache;

/// Heartbeat-based health checker.
///
/// Works over any beat record cache: a local cache for single-node setups,
/// or the routing cache so every key is evaluated against its owner's
/// authoritative record.
pub struct HeartbeatChecker {
    cache: Arc<dyn BeatRecordCache>,
    suspend_time_sec: AtomicI64,
}

impl HeartbeatChecker {
    /// Create a checker over `cache`.
    pub fn new(cache: Arc<dyn BeatRecordCache>) -> Self {
        Self {
            cache,
            suspend_time_sec: AtomicI64::new(0),
        }
    }

    /// The cache this checker evaluates against.
    pub fn cache(&self) -> &Arc<dyn BeatRecordCache> {
        &self.cache
    }

    fn now_sec() -> i64 {
        chrono::Utc::now().timestamp()
    }

    /// Whether evaluation is inside the suspend window: one expire duration
    /// after the recorded suspend time, transitions are paused so heartbeats
    /// can resettle.
    fn skip_check(&self, instance_id: &str, expire_duration_sec: i64) -> bool {
        let suspend_sec = self.suspend_time_sec();
        let now_sec = Self::now_sec();
        if suspend_sec > 0 && now_sec >= suspend_sec && now_sec - suspend_sec < expire_duration_sec
        {
            tracing::info!(
                instance_id = instance_id,
                suspend_sec = suspend_sec,
                now_sec = now_sec,
                expire_duration_sec = expire_duration_sec,
                "health check suspended"
            );
            return true;
        }
        false
    }

    #[cfg(test)]
    pub(crate) fn suspend_at(&self, sec: i64) {
        self.suspend_time_sec.store(sec, Ordering::SeqCst);
    }
}

impl HealthChecker for HeartbeatChecker {
    fn kind(&self) -> HealthCheckKind {
        HealthCheckKind::Heartbeat
    }

    fn report(&self, req: ReportRequest) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let record = HeartbeatRecord {
                server: req.local_host,
                cur_time_sec: req.cur_time_sec,
                count: req.count,
            };
            tracing::debug!(instance_id = %req.instance_id, record = %record, "heartbeat report");
            self.cache
                .put(vec![WriteBeatRecord {
                    key: req.instance_id,
                    record,
                }])
                .await;
            Ok(())
        })
    }

    fn query(&self, req: QueryRequest) -> BoxFuture<'_, Result<QueryResponse>> {
        Box::pin(async move {
            let mut ret = self.cache.get(vec![req.instance_id.clone()]).await;
            let read = ret.remove(&req.instance_id).unwrap_or_default();
            if !read.exist {
                return Ok(QueryResponse::default());
            }
            Ok(QueryResponse {
                server: read.record.server,
                last_heartbeat_sec: read.record.cur_time_sec,
                count: read.record.count,
                exists: true,
            })
        })
    }

    fn check(&self, req: CheckRequest) -> BoxFuture<'_, Result<CheckResponse>> {
        Box::pin(async move {
            let query = self
                .query(QueryRequest {
                    instance_id: req.instance_id.clone(),
                })
                .await?;
            let last_heartbeat_sec = query.last_heartbeat_sec;
            let mut resp = CheckResponse {
                last_heartbeat_sec,
                ..CheckResponse::default()
            };

            if self.skip_check(&req.instance_id, req.expire_duration_sec) {
                resp.stay_unchanged = true;
                return Ok(resp);
            }

            if req.cur_time_sec > last_heartbeat_sec
                && req.cur_time_sec - last_heartbeat_sec >= req.expire_duration_sec
            {
                resp.healthy = false;
                if req.healthy {
                    tracing::info!(
                        instance_id = %req.instance_id,
                        last_heartbeat_sec = last_heartbeat_sec,
                        cur_time_sec = req.cur_time_sec,
                        expire_duration_sec = req.expire_duration_sec,
                        "heartbeat expired"
                    );
                } else {
                    resp.stay_unchanged = true;
                }
                return Ok(resp);
            }

            resp.healthy = true;
            if !req.healthy {
                tracing::info!(
                    instance_id = %req.instance_id,
                    last_heartbeat_sec = last_heartbeat_sec,
                    cur_time_sec = req.cur_time_sec,
                    "heartbeat resumed"
                );
            } else {
                resp.stay_unchanged = true;
            }
            Ok(resp)
        })
    }

    fn delete(&self, instance_id: String) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.cache.del(vec![instance_id]).await;
            Ok(())
        })
    }

    fn suspend(&self) {
        let now_sec = Self::now_sec();
        tracing::info!(suspend_sec = now_sec, "suspend heartbeat checker");
        self.suspend_time_sec.store(now_sec, Ordering::SeqCst);
    }

    fn suspend_time_sec(&self) -> i64 {
        self.suspend_time_sec.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use crate::cache::LocalBeatRecordCache;

    use super::*;

    fn checker() -> HeartbeatChecker {
        HeartbeatChecker::new(Arc::new(LocalBeatRecordCache::new(8)))
    }

    async fn report(checker: &HeartbeatChecker, id: &str, sec: i64, count: i64) {
        checker
            .report(ReportRequest {
                instance_id: id.to_string(),
                local_host: "10.0.0.1".to_string(),
                cur_time_sec: sec,
                count,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_query_miss_is_zero_valued() {
        let checker = checker();
        let resp = checker
            .query(QueryRequest {
                instance_id: "nope".to_string(),
            })
            .await
            .unwrap();
        assert!(!resp.exists);
        assert_eq!(resp.last_heartbeat_sec, 0);
    }

    #[tokio::test]
    async fn test_expiry_transitions_to_unhealthy() {
        let checker = checker();
        report(&checker, "ins-1", 100, 1).await;

        let resp = checker
            .check(CheckRequest {
                instance_id: "ins-1".to_string(),
                cur_time_sec: 200,
                expire_duration_sec: 50,
                healthy: true,
            })
            .await
            .unwrap();

        assert!(!resp.healthy);
        assert_eq!(resp.last_heartbeat_sec, 100);
        assert!(!resp.stay_unchanged);
    }

    #[tokio::test]
    async fn test_already_unhealthy_stays_unchanged() {
        let checker = checker();
        report(&checker, "ins-1", 100, 1).await;

        let resp = checker
            .check(CheckRequest {
                instance_id: "ins-1".to_string(),
                cur_time_sec: 200,
                expire_duration_sec: 50,
                healthy: false,
            })
            .await
            .unwrap();

        assert!(!resp.healthy);
        assert!(resp.stay_unchanged);
    }

    #[tokio::test]
    async fn test_fresh_heartbeat_resumes_health() {
        let checker = checker();
        report(&checker, "ins-1", 500, 3).await;

        let resp = checker
            .check(CheckRequest {
                instance_id: "ins-1".to_string(),
                cur_time_sec: 510,
                expire_duration_sec: 50,
                healthy: false,
            })
            .await
            .unwrap();

        assert!(resp.healthy);
        assert!(!resp.stay_unchanged);
        assert_eq!(resp.last_heartbeat_sec, 500);
    }

    #[tokio::test]
    async fn test_healthy_and_fresh_stays_unchanged() {
        let checker = checker();
        report(&checker, "ins-1", 500, 3).await;

        let resp = checker
            .check(CheckRequest {
                instance_id: "ins-1".to_string(),
                cur_time_sec: 510,
                expire_duration_sec: 50,
                healthy: true,
            })
            .await
            .unwrap();

        assert!(resp.healthy);
        assert!(resp.stay_unchanged);
    }

    #[tokio::test]
    async fn test_evaluation_is_idempotent() {
        let checker = checker();
        report(&checker, "ins-1", 100, 1).await;

        let first = checker
            .check(CheckRequest {
                instance_id: "ins-1".to_string(),
                cur_time_sec: 200,
                expire_duration_sec: 50,
                healthy: true,
            })
            .await
            .unwrap();
        assert!(!first.healthy);
        assert!(!first.stay_unchanged);

        // Re-running with the persisted bit updated and no new heartbeat
        // reports no further change.
        let second = checker
            .check(CheckRequest {
                instance_id: "ins-1".to_string(),
                cur_time_sec: 200,
                expire_duration_sec: 50,
                healthy: first.healthy,
            })
            .await
            .unwrap();
        assert!(second.stay_unchanged);
    }

    #[tokio::test]
    async fn test_suspend_window_pauses_transitions() {
        let checker = checker();
        // Never reported: would expire immediately without the suspend.
        checker.suspend();

        let resp = checker
            .check(CheckRequest {
                instance_id: "ins-1".to_string(),
                cur_time_sec: HeartbeatChecker::now_sec(),
                expire_duration_sec: 60,
                healthy: true,
            })
            .await
            .unwrap();

        assert!(resp.stay_unchanged);
    }

    #[tokio::test]
    async fn test_expired_suspend_window_is_ignored() {
        let checker = checker();
        report(&checker, "ins-1", 100, 1).await;
        // Suspend long enough ago that the window has passed.
        checker.suspend_at(HeartbeatChecker::now_sec() - 120);

        let resp = checker
            .check(CheckRequest {
                instance_id: "ins-1".to_string(),
                cur_time_sec: 200,
                expire_duration_sec: 60,
                healthy: true,
            })
            .await
            .unwrap();

        assert!(!resp.healthy);
        assert!(!resp.stay_unchanged);
    }

    #[tokio::test]
    async fn test_delete_forgets_the_record() {
        let checker = checker();
        report(&checker, "ins-1", 100, 1).await;
        checker.delete("ins-1".to_string()).await.unwrap();

        let resp = checker
            .query(QueryRequest {
                instance_id: "ins-1".to_string(),
            })
            .await
            .unwrap();
        assert!(!resp.exists);
    }
}
