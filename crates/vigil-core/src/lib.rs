pub mod beat;
pub mod check;
pub mod config;
pub mod error;
pub mod store;
pub mod wire;

pub use beat::{HeartbeatRecord, ReadBeatRecord, WriteBeatRecord, RECORD_SEP};
pub use check::{
    CheckRequest, CheckResponse, HealthCheckKind, HealthChecker, QueryRequest, QueryResponse,
    ReportRequest,
};
pub use config::{HealthConfig, JobConfig, VigilConfig};
pub use error::{Result, VigilError};
pub use store::{InstanceRow, RequestScope, ServiceRow, Store, User};

/// Boxed future returned by the async methods of the object-safe contracts
/// in this crate.
pub type BoxFuture<'a, T> = std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;
