use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Errors from configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Service configuration with sensible local defaults.
///
/// Loaded from a YAML file when provided; every field falls back to its
/// default when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Root directory for all persisted state.
    pub data_dir: PathBuf,
    /// Session lifetime in hours.
    pub session_ttl_hours: i64,
    /// Per-page revision retention cap.
    pub revision_cap: usize,
    /// Audit journal retention cap.
    pub audit_cap: usize,
    /// Default page size for listings.
    pub page_size: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("copydesk-data"),
            session_ttl_hours: 12,
            revision_cap: 50,
            audit_cap: 5000,
            page_size: 20,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_reader(std::fs::File::open(path)?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = ServiceConfig::default();
        assert_eq!(config.session_ttl_hours, 12);
        assert_eq!(config.revision_cap, 50);
        assert_eq!(config.audit_cap, 5000);
    }

    #[test]
    fn partial_yaml_fills_in_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("copydesk.yaml");
        std::fs::write(&path, "data_dir: /tmp/cd\nsession_ttl_hours: 2\n").unwrap();

        let config = ServiceConfig::load(&path).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/cd"));
        assert_eq!(config.session_ttl_hours, 2);
        assert_eq!(config.revision_cap, 50);
    }
}
