//! Logical shapes of the liveness RPCs. The transport that frames these on
//! the wire lives outside this crate; peers exchange exactly these fields.

use serde::{Deserialize, Serialize};

/// One reported heartbeat. Only the instance id travels on the wire; the
/// receiving owner stamps server identity and wall clock itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceHeartbeat {
    /// Instance the ping is for.
    pub instance_id: String,
}

/// Batched heartbeat report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeartbeatsRequest {
    /// Reported heartbeats.
    pub heartbeats: Vec<InstanceHeartbeat>,
}

/// Batched read of last-seen heartbeats.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetHeartbeatsRequest {
    /// Keys to look up.
    pub instance_ids: Vec<String>,
}

/// One record in a batched read response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatQueryRecord {
    /// Instance the record is for.
    pub instance_id: String,
    /// Wall-clock seconds of the last heartbeat, 0 on miss.
    pub last_heartbeat_sec: i64,
    /// Whether the owner had a record.
    pub exist: bool,
}

/// Batched read response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetHeartbeatsResponse {
    /// One entry per known key; unknown keys may be absent.
    pub records: Vec<HeartbeatQueryRecord>,
}

/// Batched delete of heartbeat records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DelHeartbeatsRequest {
    /// Keys to remove.
    pub instance_ids: Vec<String>,
}

/// Batched delete response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DelHeartbeatsResponse {}
