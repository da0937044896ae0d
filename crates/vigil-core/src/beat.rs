use serde::{Deserialize, Serialize};

/// Separator used in the canonical string form of a heartbeat record.
/// Must not appear in a server identity.
pub const RECORD_SEP: char = ':';

/// Last-seen liveness record for a single instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatRecord {
    /// Identity of the server that ingested the heartbeat.
    pub server: String,
    /// Wall-clock seconds of the most recent heartbeat.
    pub cur_time_sec: i64,
    /// Reporter-side sequence number. Monotone per origin; may reset when the
    /// origin server changes.
    pub count: i64,
}

impl std::fmt::Display for HeartbeatRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{}{}{}{}",
            self.server, RECORD_SEP, self.cur_time_sec, RECORD_SEP, self.count
        )
    }
}

/// Result of reading one key from a beat record cache. Returned even on miss,
/// with `exist = false` and a zero-valued record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadBeatRecord {
    /// The record value; zero-valued when `exist` is false.
    pub record: HeartbeatRecord,
    /// Whether the key was present.
    pub exist: bool,
}

/// A keyed record write. The key is the instance id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteBeatRecord {
    /// Instance id.
    pub key: String,
    /// Record to store.
    pub record: HeartbeatRecord,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_canonical_form() {
        let record = HeartbeatRecord {
            server: "10.0.0.1".to_string(),
            cur_time_sec: 1700000000,
            count: 42,
        };
        assert_eq!(record.to_string(), "10.0.0.1:1700000000:42");
    }

    #[test]
    fn test_read_record_default_is_miss() {
        let read = ReadBeatRecord::default();
        assert!(!read.exist);
        assert_eq!(read.record.cur_time_sec, 0);
        assert_eq!(read.record.count, 0);
        assert!(read.record.server.is_empty());
    }
}
