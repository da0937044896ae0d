use std::collections::HashMap;

use vigil_core::beat::{HeartbeatRecord, ReadBeatRecord, WriteBeatRecord};
use vigil_core::BoxFuture;

use super::segment::SegmentMap;
use super::BeatRecordCache;

/// Authoritative in-memory store for the heartbeat records this server owns.
pub struct LocalBeatRecordCache {
    records: SegmentMap<HeartbeatRecord>,
}

impl LocalBeatRecordCache {
    /// Create a cache with `shard_count` shards and the default hash.
    pub fn new(shard_count: usize) -> Self {
        Self {
            records: SegmentMap::with_default_hash(shard_count),
        }
    }

    /// Create a cache with a caller-supplied hash function.
    pub fn with_hash(
        shard_count: usize,
        hash: impl Fn(&str) -> u64 + Send + Sync + 'static,
    ) -> Self {
        Self {
            records: SegmentMap::new(shard_count, hash),
        }
    }

    /// Advisory number of records held.
    pub fn len(&self) -> usize {
        self.records.count()
    }

    /// Whether the cache currently holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.count() == 0
    }
}

impl BeatRecordCache for LocalBeatRecordCache {
    fn get(&self, keys: Vec<String>) -> BoxFuture<'_, HashMap<String, ReadBeatRecord>> {
        Box::pin(async move {
            let mut ret = HashMap::with_capacity(keys.len());
            for key in keys {
                let entry = match self.records.get(&key) {
                    Some(record) => ReadBeatRecord {
                        record,
                        exist: true,
                    },
                    None => ReadBeatRecord::default(),
                };
                ret.insert(key, entry);
            }
            ret
        })
    }

    fn put(&self, records: Vec<WriteBeatRecord>) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            for write in records {
                tracing::debug!(key = %write.key, record = %write.record, "store beat record");
                self.records.put(write.key, write.record);
            }
        })
    }

    fn del(&self, keys: Vec<String>) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            for key in keys {
                let existed = self.records.del(&key);
                tracing::debug!(key = %key, existed = existed, "delete beat record");
            }
        })
    }

    fn clean(&self) {
        // Local records live and die with the process.
    }

    fn snapshot(&self) -> HashMap<String, ReadBeatRecord> {
        let mut ret = HashMap::new();
        self.records.range(|k, v| {
            ret.insert(
                k.to_string(),
                ReadBeatRecord {
                    record: v.clone(),
                    exist: true,
                },
            );
        });
        ret
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(server: &str, sec: i64, count: i64) -> HeartbeatRecord {
        HeartbeatRecord {
            server: server.to_string(),
            cur_time_sec: sec,
            count,
        }
    }

    #[tokio::test]
    async fn test_miss_is_not_an_error() {
        let cache = LocalBeatRecordCache::new(8);
        let ret = cache.get(vec!["nope".to_string()]).await;

        let read = &ret["nope"];
        assert!(!read.exist);
        assert_eq!(read.record, HeartbeatRecord::default());
    }

    #[tokio::test]
    async fn test_put_then_get_last_writer_wins() {
        let cache = LocalBeatRecordCache::new(8);
        cache
            .put(vec![WriteBeatRecord {
                key: "ins-1".to_string(),
                record: record("10.0.0.1", 100, 1),
            }])
            .await;
        cache
            .put(vec![WriteBeatRecord {
                key: "ins-1".to_string(),
                record: record("10.0.0.2", 101, 1),
            }])
            .await;

        let ret = cache.get(vec!["ins-1".to_string()]).await;
        assert!(ret["ins-1"].exist);
        assert_eq!(ret["ins-1"].record.server, "10.0.0.2");
        assert_eq!(ret["ins-1"].record.cur_time_sec, 101);
    }

    #[tokio::test]
    async fn test_del_missing_is_silent() {
        let cache = LocalBeatRecordCache::new(8);
        cache
            .put(vec![WriteBeatRecord {
                key: "ins-1".to_string(),
                record: record("s", 100, 1),
            }])
            .await;

        cache.del(vec!["ins-1".to_string(), "ghost".to_string()]).await;
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_materializes_everything() {
        let cache = LocalBeatRecordCache::new(4);
        for i in 0..10 {
            cache
                .put(vec![WriteBeatRecord {
                    key: format!("ins-{}", i),
                    record: record("s", 100 + i as i64, i as i64),
                }])
                .await;
        }

        let snap = cache.snapshot();
        assert_eq!(snap.len(), 10);
        assert!(snap["ins-3"].exist);
        assert_eq!(snap["ins-3"].record.cur_time_sec, 103);
    }
}
