use std::sync::{Arc, RwLock};

use crate::hash::fnv1a64;

/// Accessor for cluster membership: the ordered peer identities and which of
/// them is this process. Membership changes are an external event; replacing
/// the peer snapshot re-selects owners for every key.
pub trait PeerDirectory: Send + Sync {
    /// Ordered identities of every registry server, this one included.
    fn peers(&self) -> Vec<String>;

    /// Identity of this process.
    fn local_id(&self) -> String;
}

/// Peer directory fed by an external membership source through `replace`.
pub struct StaticPeerDirectory {
    local_id: String,
    peers: RwLock<Vec<String>>,
}

impl StaticPeerDirectory {
    /// Create a directory with an initial membership snapshot.
    pub fn new(local_id: impl Into<String>, peers: Vec<String>) -> Self {
        Self {
            local_id: local_id.into(),
            peers: RwLock::new(peers),
        }
    }

    /// Replace the membership snapshot.
    pub fn replace(&self, peers: Vec<String>) {
        let mut guard = self.peers.write().expect("peer lock poisoned");
        *guard = peers;
    }
}

impl PeerDirectory for StaticPeerDirectory {
    fn peers(&self) -> Vec<String> {
        self.peers.read().expect("peer lock poisoned").clone()
    }

    fn local_id(&self) -> String {
        self.local_id.clone()
    }
}

/// Decides which peer owns the authoritative heartbeat record for a key.
///
/// `owner(key) = peers[fnv1a64(key) % peers.len()]`. An empty peer set
/// degrades to local ownership (single-node operation). During a membership
/// transition both the old and new owner may be queried; callers already
/// tolerate the resulting misses, and records are not replicated across the
/// handoff.
pub struct OwnershipResolver {
    directory: Arc<dyn PeerDirectory>,
}

impl OwnershipResolver {
    /// Create a resolver over a peer directory.
    pub fn new(directory: Arc<dyn PeerDirectory>) -> Self {
        Self { directory }
    }

    /// Identity of the peer that owns `key`.
    pub fn owner_of(&self, key: &str) -> String {
        let peers = self.directory.peers();
        if peers.is_empty() {
            return self.directory.local_id();
        }
        let idx = fnv1a64(key) as usize % peers.len();
        peers[idx].clone()
    }

    /// Whether this process owns `key`.
    pub fn is_local(&self, key: &str) -> bool {
        self.owner_of(key) == self.directory.local_id()
    }

    /// Identity of this process.
    pub fn local_id(&self) -> String {
        self.directory.local_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(peers: Vec<&str>) -> (Arc<StaticPeerDirectory>, OwnershipResolver) {
        let directory = Arc::new(StaticPeerDirectory::new(
            "peer-0",
            peers.into_iter().map(String::from).collect(),
        ));
        let resolver = OwnershipResolver::new(directory.clone());
        (directory, resolver)
    }

    #[test]
    fn test_owner_is_stable_for_a_key() {
        let (_, resolver) = resolver(vec!["peer-0", "peer-1", "peer-2"]);
        let first = resolver.owner_of("ins-42");
        for _ in 0..10 {
            assert_eq!(resolver.owner_of("ins-42"), first);
        }
    }

    #[test]
    fn test_owner_matches_hash_mod_len() {
        let (_, resolver) = resolver(vec!["peer-0", "peer-1", "peer-2"]);
        let idx = fnv1a64("ins-42") as usize % 3;
        let expected = format!("peer-{}", idx);
        assert_eq!(resolver.owner_of("ins-42"), expected);
    }

    #[test]
    fn test_empty_membership_degrades_to_local() {
        let (_, resolver) = resolver(vec![]);
        assert_eq!(resolver.owner_of("anything"), "peer-0");
        assert!(resolver.is_local("anything"));
    }

    #[test]
    fn test_membership_change_reselects_owners() {
        let (directory, resolver) = resolver(vec!["peer-0"]);
        assert!(resolver.is_local("ins-1"));
        assert!(resolver.is_local("ins-2"));

        directory.replace(vec![
            "peer-0".to_string(),
            "peer-1".to_string(),
            "peer-2".to_string(),
            "peer-3".to_string(),
        ]);

        // With four peers some keys must leave this node.
        let moved = (0..100)
            .map(|i| format!("ins-{}", i))
            .filter(|k| !resolver.is_local(k))
            .count();
        assert!(moved > 0);
    }
}
