mod health;
mod jobs;

pub use health::HealthConfig;
pub use jobs::JobConfig;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VigilError};

/// Root configuration for vigil.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VigilConfig {
    /// Health-check subsystem configuration.
    #[serde(default)]
    pub health: HealthConfig,

    /// Maintenance job configurations.
    #[serde(default)]
    pub jobs: Vec<JobConfig>,
}

impl VigilConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| VigilError::Config(format!("Failed to read config file: {}", e)))?;

        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse_toml(content: &str) -> Result<Self> {
        // Substitute environment variables
        let content = substitute_env_vars(content);

        toml::from_str(&content)
            .map_err(|e| VigilError::Config(format!("Failed to parse config: {}", e)))
    }
}

/// Substitute environment variables in the format ${VAR_NAME}.
fn substitute_env_vars(content: &str) -> String {
    let mut result = content.to_string();
    let re = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();

    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        if let Ok(value) = std::env::var(var_name) {
            result = result.replace(&cap[0], &value);
        }
    }

    result
}
