use std::collections::HashMap;
use std::sync::Arc;

use vigil_core::beat::{HeartbeatRecord, ReadBeatRecord, WriteBeatRecord};
use vigil_core::error::Result;
use vigil_core::wire::{
    DelHeartbeatsRequest, GetHeartbeatsRequest, GetHeartbeatsResponse, HeartbeatsRequest,
    InstanceHeartbeat,
};
use vigil_core::BoxFuture;

use super::BeatRecordCache;

/// Capability for talking to the peer that owns a set of heartbeat records.
/// Deadlines are the implementor's responsibility.
pub trait BeatTransport: Send + Sync {
    /// Read a batch of records from the peer.
    fn fetch(&self, req: GetHeartbeatsRequest) -> BoxFuture<'_, Result<GetHeartbeatsResponse>>;

    /// Push a batch of heartbeats to the peer. Best effort, no per-record
    /// acknowledgement.
    fn save(&self, req: HeartbeatsRequest) -> BoxFuture<'_, Result<()>>;

    /// Delete a batch of records on the peer.
    fn remove(&self, req: DelHeartbeatsRequest) -> BoxFuture<'_, Result<()>>;
}

/// Builds a transport bound to a given peer identity.
pub trait BeatTransportFactory: Send + Sync {
    /// Connect (or reuse a connection) to `peer`.
    fn connect(&self, peer: &str) -> Arc<dyn BeatTransport>;
}

/// Thin proxy over the peer that owns a key range. All semantic choices
/// (expiry, suspension) live on the owning peer; this side only forwards.
pub struct RemoteBeatRecordCache {
    peer: String,
    transport: Arc<dyn BeatTransport>,
}

impl RemoteBeatRecordCache {
    /// Create a proxy bound to `peer` through `transport`.
    pub fn new(peer: impl Into<String>, transport: Arc<dyn BeatTransport>) -> Self {
        Self {
            peer: peer.into(),
            transport,
        }
    }

    /// Identity of the peer this proxy forwards to.
    pub fn peer(&self) -> &str {
        &self.peer
    }
}

impl BeatRecordCache for RemoteBeatRecordCache {
    fn get(&self, keys: Vec<String>) -> BoxFuture<'_, HashMap<String, ReadBeatRecord>> {
        Box::pin(async move {
            let mut ret: HashMap<String, ReadBeatRecord> = keys
                .iter()
                .map(|k| (k.clone(), ReadBeatRecord::default()))
                .collect();

            let resp = match self
                .transport
                .fetch(GetHeartbeatsRequest { instance_ids: keys })
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    // A transient peer failure reads as a miss; the health
                    // scheduler keeps the instance unchanged on misses.
                    tracing::warn!(peer = %self.peer, error = %e, "remote beat fetch failed");
                    return ret;
                }
            };

            for record in resp.records {
                let Some(entry) = ret.get_mut(&record.instance_id) else {
                    continue;
                };
                entry.exist = record.exist;
                entry.record = HeartbeatRecord {
                    // Server and count do not travel on the wire.
                    cur_time_sec: record.last_heartbeat_sec,
                    ..HeartbeatRecord::default()
                };
            }
            ret
        })
    }

    fn put(&self, records: Vec<WriteBeatRecord>) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let req = HeartbeatsRequest {
                heartbeats: records
                    .into_iter()
                    .map(|w| InstanceHeartbeat { instance_id: w.key })
                    .collect(),
            };
            if let Err(e) = self.transport.save(req).await {
                tracing::warn!(peer = %self.peer, error = %e, "remote beat save failed");
            }
        })
    }

    fn del(&self, keys: Vec<String>) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let req = DelHeartbeatsRequest { instance_ids: keys };
            if let Err(e) = self.transport.remove(req).await {
                tracing::warn!(peer = %self.peer, error = %e, "remote beat delete failed");
            }
        })
    }

    fn clean(&self) {
        // Nothing held on this side.
    }

    fn snapshot(&self) -> HashMap<String, ReadBeatRecord> {
        // Remote enumeration is intentionally unsupported; snapshots are a
        // local-only diagnostic.
        HashMap::new()
    }
}
