//! Engine configuration
//!
//! Loaded from an optional YAML file; every field has a default so an empty
//! file (or none at all) is a valid configuration.

use crate::domain::volume::OwnershipLabels;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration for the volume engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Volume label naming the owning component
    pub component_label: String,
    /// Volume label naming the owning component's namespace
    pub component_namespace_label: String,
    /// Workload label naming the application
    pub application_label: String,
    /// Bound on one aggregation in seconds; 0 disables it
    pub aggregation_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let labels = OwnershipLabels::default();
        Self {
            component_label: labels.component,
            component_namespace_label: labels.namespace,
            application_label: "kapp-application".to_string(),
            aggregation_timeout_secs: 30,
        }
    }
}

impl EngineConfig {
    /// Read a YAML configuration file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn aggregation_timeout(&self) -> Option<Duration> {
        match self.aggregation_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn ownership_labels(&self) -> OwnershipLabels {
        OwnershipLabels {
            component: self.component_label.clone(),
            namespace: self.component_namespace_label.clone(),
        }
    }
}
