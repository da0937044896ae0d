mod heartbeat;

pub use heartbeat::HeartbeatChecker;

use std::collections::HashMap;
use std::sync::Arc;

use vigil_core::check::{HealthCheckKind, HealthChecker};
use vigil_core::error::{Result, VigilError};

/// Registry of health checkers, keyed by probe kind.
///
/// Checkers are registered explicitly during startup, under program control;
/// only one checker per kind is allowed.
#[derive(Default)]
pub struct CheckerRegistry {
    checkers: HashMap<HealthCheckKind, Arc<dyn HealthChecker>>,
}

impl CheckerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            checkers: HashMap::new(),
        }
    }

    /// Register a checker under its kind.
    pub fn register(&mut self, checker: Arc<dyn HealthChecker>) -> Result<()> {
        let kind = checker.kind();
        if self.checkers.contains_key(&kind) {
            return Err(VigilError::Config(format!(
                "health checker for kind {} already registered",
                kind
            )));
        }
        self.checkers.insert(kind, checker);
        Ok(())
    }

    /// Look up the checker for a kind.
    pub fn get(&self, kind: HealthCheckKind) -> Option<Arc<dyn HealthChecker>> {
        self.checkers.get(&kind).cloned()
    }

    /// Number of registered checkers.
    pub fn len(&self) -> usize {
        self.checkers.len()
    }

    /// Whether no checker is registered.
    pub fn is_empty(&self) -> bool {
        self.checkers.is_empty()
    }
}
