use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Configuration for one maintenance job. Loaded at startup, immutable
/// thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Job name, must match a registered job.
    pub name: String,

    /// Whether the job runs at all.
    #[serde(default = "default_enable")]
    pub enable: bool,

    /// Tick interval in seconds.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Job-specific options, interpreted by the job at init.
    #[serde(default)]
    pub option: HashMap<String, serde_json::Value>,
}

impl JobConfig {
    /// Tick interval as a duration.
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_secs)
    }
}

fn default_enable() -> bool {
    true
}

fn default_interval() -> u64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_job_config() {
        let toml = r#"
            name = "clean_deleted_instances"
            interval_secs = 120

            [option]
            retention_secs = 300
            batch_size = 50
        "#;

        let config: JobConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.name, "clean_deleted_instances");
        assert!(config.enable);
        assert_eq!(config.interval(), std::time::Duration::from_secs(120));
        assert_eq!(config.option["retention_secs"], 300);
        assert_eq!(config.option["batch_size"], 50);
    }
}
