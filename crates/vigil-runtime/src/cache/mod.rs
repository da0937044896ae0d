mod local;
mod remote;
mod routing;
mod segment;

pub use local::LocalBeatRecordCache;
pub use remote::{BeatTransport, BeatTransportFactory, RemoteBeatRecordCache};
pub use routing::RoutingBeatRecordCache;
pub use segment::SegmentMap;

use std::collections::HashMap;

use vigil_core::beat::{ReadBeatRecord, WriteBeatRecord};
use vigil_core::BoxFuture;

/// Uniform surface over the heartbeat record stores.
///
/// The local variant owns the authoritative records for keys this server
/// owns; the remote variant proxies to the owning peer; the routing variant
/// picks between them per key. The surface is infallible: a missing key is
/// an `exist = false` entry, and peer failures degrade to misses inside the
/// remote variant.
pub trait BeatRecordCache: Send + Sync {
    /// Read a batch of keys. The result has an entry for every requested
    /// key; missing keys map to `exist = false`.
    fn get(&self, keys: Vec<String>) -> BoxFuture<'_, HashMap<String, ReadBeatRecord>>;

    /// Write a batch of records. Unconditional, last writer wins per key.
    fn put(&self, records: Vec<WriteBeatRecord>) -> BoxFuture<'_, ()>;

    /// Remove a batch of keys. Missing keys are silently ignored.
    fn del(&self, keys: Vec<String>) -> BoxFuture<'_, ()>;

    /// Release any transient state. Local records live with the process, so
    /// the local variant treats this as a no-op.
    fn clean(&self);

    /// Materialize every locally held entry, for admin inspection and
    /// handoff. Remote enumeration is unsupported and yields an empty map.
    fn snapshot(&self) -> HashMap<String, ReadBeatRecord>;
}
