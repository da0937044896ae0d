pub mod cache;
pub mod checker;
pub mod hash;
pub mod jobs;
pub mod liveness;
pub mod ownership;
pub mod store;
pub mod testing;

pub use cache::{
    BeatRecordCache, BeatTransport, BeatTransportFactory, LocalBeatRecordCache,
    RemoteBeatRecordCache, RoutingBeatRecordCache, SegmentMap,
};
pub use checker::{CheckerRegistry, HeartbeatChecker};
pub use jobs::{MaintainJob, MaintainJobs};
pub use liveness::LivenessApi;
pub use ownership::{OwnershipResolver, PeerDirectory, StaticPeerDirectory};
pub use store::{ElectionConfig, PgStore};
