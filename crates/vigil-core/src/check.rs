use crate::error::Result;
use crate::BoxFuture;

/// Kind of liveness probe a health checker implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HealthCheckKind {
    /// Client-reported heartbeat pings.
    Heartbeat,
    /// Server-side TCP connect probes.
    Tcp,
}

impl HealthCheckKind {
    /// Convert to a stable string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Heartbeat => "heartbeat",
            Self::Tcp => "tcp",
        }
    }
}

impl std::fmt::Display for HealthCheckKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A liveness ping being ingested.
#[derive(Debug, Clone)]
pub struct ReportRequest {
    /// Instance being reported on.
    pub instance_id: String,
    /// Identity of the server ingesting the report.
    pub local_host: String,
    /// Wall-clock seconds of the report.
    pub cur_time_sec: i64,
    /// Reporter-side sequence number.
    pub count: i64,
}

/// Point lookup of the last-seen heartbeat for an instance.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    /// Instance to look up.
    pub instance_id: String,
}

/// Result of a heartbeat query. Zero-valued fields with `exists = false`
/// mean the instance has never reported here.
#[derive(Debug, Clone, Default)]
pub struct QueryResponse {
    /// Server that ingested the last heartbeat.
    pub server: String,
    /// Wall-clock seconds of the last heartbeat, 0 on miss.
    pub last_heartbeat_sec: i64,
    /// Last reporter sequence number.
    pub count: i64,
    /// Whether a record was found.
    pub exists: bool,
}

/// Health evaluation request for one instance.
#[derive(Debug, Clone)]
pub struct CheckRequest {
    /// Instance under evaluation.
    pub instance_id: String,
    /// Wall-clock seconds the evaluation runs at.
    pub cur_time_sec: i64,
    /// Grace period: the instance is unhealthy once
    /// `cur_time_sec - last >= expire_duration_sec`.
    pub expire_duration_sec: i64,
    /// Health bit currently persisted for the instance.
    pub healthy: bool,
}

/// Health evaluation result.
#[derive(Debug, Clone, Default)]
pub struct CheckResponse {
    /// New health bit.
    pub healthy: bool,
    /// Wall-clock seconds of the last heartbeat seen.
    pub last_heartbeat_sec: i64,
    /// True when the persisted health bit need not be rewritten.
    pub stay_unchanged: bool,
}

/// Contract for a liveness checker plugin.
///
/// Implementations are registered explicitly at startup and selected by
/// `kind`. All state mutation goes through the owning checker; callers treat
/// a query miss as "never reported", not as an error.
pub trait HealthChecker: Send + Sync {
    /// The probe kind this checker serves.
    fn kind(&self) -> HealthCheckKind;

    /// Ingest a liveness report. Unconditional last-writer-wins.
    fn report(&self, req: ReportRequest) -> BoxFuture<'_, Result<()>>;

    /// Look up the last-seen heartbeat for an instance.
    fn query(&self, req: QueryRequest) -> BoxFuture<'_, Result<QueryResponse>>;

    /// Evaluate the health bit for an instance.
    fn check(&self, req: CheckRequest) -> BoxFuture<'_, Result<CheckResponse>>;

    /// Remove the record for an instance. Missing keys are ignored.
    fn delete(&self, instance_id: String) -> BoxFuture<'_, Result<()>>;

    /// Pause health transitions for one expire window from now.
    fn suspend(&self);

    /// Wall-clock seconds of the last suspend, 0 if never suspended.
    fn suspend_time_sec(&self) -> i64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_string_form() {
        assert_eq!(HealthCheckKind::Heartbeat.as_str(), "heartbeat");
        assert_eq!(HealthCheckKind::Tcp.as_str(), "tcp");
        assert_eq!(HealthCheckKind::Heartbeat.to_string(), "heartbeat");
    }

    #[test]
    fn test_query_response_default_is_miss() {
        let resp = QueryResponse::default();
        assert!(!resp.exists);
        assert_eq!(resp.last_heartbeat_sec, 0);
    }
}
