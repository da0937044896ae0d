use std::sync::Arc;

use vigil_core::check::{HealthCheckKind, QueryRequest, ReportRequest};
use vigil_core::error::Result;
use vigil_core::wire::{
    DelHeartbeatsRequest, DelHeartbeatsResponse, GetHeartbeatsRequest, GetHeartbeatsResponse,
    HeartbeatQueryRecord, HeartbeatsRequest,
};

use crate::checker::CheckerRegistry;

/// Wire surface of the liveness RPCs, served to peers and to the transport
/// layer. The actual framing (gRPC, HTTP) lives outside this crate.
pub struct LivenessApi {
    registry: Arc<CheckerRegistry>,
    local_host: String,
}

impl LivenessApi {
    /// Create the API over a checker registry. `local_host` is stamped into
    /// records ingested here.
    pub fn new(registry: Arc<CheckerRegistry>, local_host: impl Into<String>) -> Self {
        Self {
            registry,
            local_host: local_host.into(),
        }
    }

    /// Read the last-seen heartbeat for a batch of instances.
    ///
    /// A missing heartbeat checker yields an empty response rather than an
    /// error; any per-record query failure aborts the whole batch.
    pub async fn batch_get_heartbeat(
        &self,
        req: GetHeartbeatsRequest,
    ) -> Result<GetHeartbeatsResponse> {
        let Some(checker) = self.registry.get(HealthCheckKind::Heartbeat) else {
            return Ok(GetHeartbeatsResponse::default());
        };

        let mut records = Vec::with_capacity(req.instance_ids.len());
        for instance_id in req.instance_ids {
            let resp = checker
                .query(QueryRequest {
                    instance_id: instance_id.clone(),
                })
                .await?;
            records.push(HeartbeatQueryRecord {
                instance_id,
                last_heartbeat_sec: resp.last_heartbeat_sec,
                exist: resp.exists,
            });
        }
        Ok(GetHeartbeatsResponse { records })
    }

    /// Delete the heartbeat records for a batch of instances.
    pub async fn batch_del_heartbeat(
        &self,
        req: DelHeartbeatsRequest,
    ) -> Result<DelHeartbeatsResponse> {
        let Some(checker) = self.registry.get(HealthCheckKind::Heartbeat) else {
            return Ok(DelHeartbeatsResponse::default());
        };

        for instance_id in req.instance_ids {
            checker.delete(instance_id).await?;
        }
        Ok(DelHeartbeatsResponse::default())
    }

    /// Ingest a batch of reported heartbeats, stamping this server's
    /// identity and wall clock. Each entry lands in its owner's cache.
    pub async fn batch_report_heartbeat(&self, req: HeartbeatsRequest) -> Result<()> {
        let Some(checker) = self.registry.get(HealthCheckKind::Heartbeat) else {
            return Ok(());
        };

        let cur_time_sec = chrono::Utc::now().timestamp();
        for heartbeat in req.heartbeats {
            checker
                .report(ReportRequest {
                    instance_id: heartbeat.instance_id,
                    local_host: self.local_host.clone(),
                    cur_time_sec,
                    count: 0,
                })
                .await?;
        }
        Ok(())
    }
}
