use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use vigil_core::beat::{ReadBeatRecord, WriteBeatRecord};
use vigil_core::BoxFuture;

use crate::ownership::OwnershipResolver;

use super::local::LocalBeatRecordCache;
use super::remote::{BeatTransportFactory, RemoteBeatRecordCache};
use super::BeatRecordCache;

/// Per-key selection between the local cache and a remote proxy.
///
/// Every batch is grouped by owner: locally owned keys hit the segment map
/// directly, and each remote owner receives one RPC per operation. Proxies
/// are built lazily through the transport factory and memoized per peer.
pub struct RoutingBeatRecordCache {
    resolver: Arc<OwnershipResolver>,
    local: Arc<LocalBeatRecordCache>,
    transports: Arc<dyn BeatTransportFactory>,
    remotes: RwLock<HashMap<String, Arc<RemoteBeatRecordCache>>>,
}

impl RoutingBeatRecordCache {
    /// Create a routing cache.
    pub fn new(
        resolver: Arc<OwnershipResolver>,
        local: Arc<LocalBeatRecordCache>,
        transports: Arc<dyn BeatTransportFactory>,
    ) -> Self {
        Self {
            resolver,
            local,
            transports,
            remotes: RwLock::new(HashMap::new()),
        }
    }

    /// The local cache behind this router.
    pub fn local(&self) -> &Arc<LocalBeatRecordCache> {
        &self.local
    }

    fn remote_for(&self, peer: &str) -> Arc<RemoteBeatRecordCache> {
        if let Some(cache) = self.remotes.read().expect("remote lock poisoned").get(peer) {
            return cache.clone();
        }
        let mut remotes = self.remotes.write().expect("remote lock poisoned");
        remotes
            .entry(peer.to_string())
            .or_insert_with(|| {
                Arc::new(RemoteBeatRecordCache::new(
                    peer,
                    self.transports.connect(peer),
                ))
            })
            .clone()
    }

    /// Group keys by owning peer; `None` marks the local group.
    fn group_keys(&self, keys: Vec<String>) -> HashMap<Option<String>, Vec<String>> {
        let local_id = self.resolver.local_id();
        let mut groups: HashMap<Option<String>, Vec<String>> = HashMap::new();
        for key in keys {
            let owner = self.resolver.owner_of(&key);
            let group = if owner == local_id { None } else { Some(owner) };
            groups.entry(group).or_default().push(key);
        }
        groups
    }
}

impl BeatRecordCache for RoutingBeatRecordCache {
    fn get(&self, keys: Vec<String>) -> BoxFuture<'_, HashMap<String, ReadBeatRecord>> {
        Box::pin(async move {
            let mut ret = HashMap::with_capacity(keys.len());
            for (owner, group) in self.group_keys(keys) {
                let part = match owner {
                    None => self.local.get(group).await,
                    Some(peer) => self.remote_for(&peer).get(group).await,
                };
                ret.extend(part);
            }
            ret
        })
    }

    fn put(&self, records: Vec<WriteBeatRecord>) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let local_id = self.resolver.local_id();
            let mut groups: HashMap<Option<String>, Vec<WriteBeatRecord>> = HashMap::new();
            for write in records {
                let owner = self.resolver.owner_of(&write.key);
                let group = if owner == local_id { None } else { Some(owner) };
                groups.entry(group).or_default().push(write);
            }
            for (owner, group) in groups {
                match owner {
                    None => self.local.put(group).await,
                    Some(peer) => self.remote_for(&peer).put(group).await,
                }
            }
        })
    }

    fn del(&self, keys: Vec<String>) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            for (owner, group) in self.group_keys(keys) {
                match owner {
                    None => self.local.del(group).await,
                    Some(peer) => self.remote_for(&peer).del(group).await,
                }
            }
        })
    }

    fn clean(&self) {
        self.local.clean();
    }

    fn snapshot(&self) -> HashMap<String, ReadBeatRecord> {
        // Only the locally owned share is enumerable.
        self.local.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use vigil_core::beat::HeartbeatRecord;
    use vigil_core::error::Result;
    use vigil_core::wire::{
        DelHeartbeatsRequest, GetHeartbeatsRequest, GetHeartbeatsResponse, HeartbeatsRequest,
    };

    use crate::cache::remote::BeatTransport;
    use crate::ownership::StaticPeerDirectory;

    use super::*;

    #[derive(Default)]
    struct CountingTransport {
        peer: String,
        calls: Arc<Mutex<Vec<(String, usize)>>>,
    }

    impl BeatTransport for CountingTransport {
        fn fetch(
            &self,
            req: GetHeartbeatsRequest,
        ) -> BoxFuture<'_, Result<GetHeartbeatsResponse>> {
            Box::pin(async move {
                self.calls
                    .lock()
                    .unwrap()
                    .push((self.peer.clone(), req.instance_ids.len()));
                Ok(GetHeartbeatsResponse::default())
            })
        }

        fn save(&self, req: HeartbeatsRequest) -> BoxFuture<'_, Result<()>> {
            Box::pin(async move {
                self.calls
                    .lock()
                    .unwrap()
                    .push((self.peer.clone(), req.heartbeats.len()));
                Ok(())
            })
        }

        fn remove(&self, req: DelHeartbeatsRequest) -> BoxFuture<'_, Result<()>> {
            Box::pin(async move {
                self.calls
                    .lock()
                    .unwrap()
                    .push((self.peer.clone(), req.instance_ids.len()));
                Ok(())
            })
        }
    }

    struct CountingFactory {
        calls: Arc<Mutex<Vec<(String, usize)>>>,
    }

    impl BeatTransportFactory for CountingFactory {
        fn connect(&self, peer: &str) -> Arc<dyn BeatTransport> {
            Arc::new(CountingTransport {
                peer: peer.to_string(),
                calls: self.calls.clone(),
            })
        }
    }

    fn router(peers: Vec<&str>) -> (RoutingBeatRecordCache, Arc<Mutex<Vec<(String, usize)>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let directory = Arc::new(StaticPeerDirectory::new(
            "peer-0",
            peers.into_iter().map(String::from).collect(),
        ));
        let resolver = Arc::new(OwnershipResolver::new(directory));
        let cache = RoutingBeatRecordCache::new(
            resolver,
            Arc::new(LocalBeatRecordCache::new(8)),
            Arc::new(CountingFactory {
                calls: calls.clone(),
            }),
        );
        (cache, calls)
    }

    #[tokio::test]
    async fn test_single_node_stays_local() {
        let (cache, calls) = router(vec!["peer-0"]);

        cache
            .put(vec![WriteBeatRecord {
                key: "ins-1".to_string(),
                record: HeartbeatRecord {
                    server: "peer-0".to_string(),
                    cur_time_sec: 100,
                    count: 1,
                },
            }])
            .await;

        let ret = cache.get(vec!["ins-1".to_string()]).await;
        assert!(ret["ins-1"].exist);
        assert!(calls.lock().unwrap().is_empty());
        assert_eq!(cache.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn test_one_rpc_per_remote_owner() {
        let (cache, calls) = router(vec!["peer-0", "peer-1", "peer-2"]);

        // Enough keys that every peer owns at least one.
        let keys: Vec<String> = (0..30).map(|i| format!("ins-{}", i)).collect();
        let ret = cache.get(keys.clone()).await;
        assert_eq!(ret.len(), 30);

        let calls = calls.lock().unwrap();
        // One fetch per remote peer, never one per key.
        assert!(!calls.is_empty());
        assert!(calls.len() <= 2);
        let forwarded: usize = calls.iter().map(|(_, n)| n).sum();
        let local_share = keys
            .iter()
            .filter(|k| {
                crate::hash::fnv1a64(k) as usize % 3 == 0 // peer-0 owns index 0
            })
            .count();
        assert_eq!(forwarded, 30 - local_share);
    }

    #[tokio::test]
    async fn test_remote_miss_reports_unknown() {
        let (cache, _calls) = router(vec!["peer-0", "peer-1"]);

        let ret = cache
            .get((0..10).map(|i| format!("ins-{}", i)).collect())
            .await;
        // The counting transport returns empty responses, so every remotely
        // owned key comes back as a miss rather than an error.
        assert!(ret.values().all(|r| !r.exist));
    }
}
