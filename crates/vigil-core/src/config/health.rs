use serde::{Deserialize, Serialize};

/// Health-check subsystem configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Number of shards in the heartbeat record cache. Fixed for the
    /// lifetime of the cache.
    #[serde(default = "default_shard_count")]
    pub shard_count: usize,

    /// Identity this server stamps into records it ingests.
    #[serde(default = "default_local_host")]
    pub local_host: String,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            shard_count: default_shard_count(),
            local_host: default_local_host(),
        }
    }
}

fn default_shard_count() -> usize {
    64
}

fn default_local_host() -> String {
    "127.0.0.1".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_health_config() {
        let config = HealthConfig::default();
        assert_eq!(config.shard_count, 64);
        assert_eq!(config.local_host, "127.0.0.1");
    }
}
