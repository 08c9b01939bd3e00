use crate::error::Result;
use crate::guard::Deadline;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Name of the optional config file looked up under the data directory.
pub const CONFIG_FILE: &str = "pipeline.yaml";

/// Pipeline configuration, loadable from a `pipeline.yaml` at the data root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Root directory holding the resource folders.
    pub data_dir: String,

    /// Bound on waiting for the per-(resource, filename) guard.
    #[serde(default = "default_lock_wait_ms")]
    pub lock_wait_ms: u64,

    /// Default per-operation deadline applied when the caller supplies none.
    #[serde(default)]
    pub operation_timeout_ms: Option<u64>,
}

fn default_lock_wait_ms() -> u64 {
    5_000
}

impl PipelineConfig {
    pub fn new(data_dir: impl Into<String>) -> Self {
        PipelineConfig {
            data_dir: data_dir.into(),
            lock_wait_ms: default_lock_wait_ms(),
            operation_timeout_ms: None,
        }
    }

    /// Parse a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse a config YAML string.
    pub fn parse(content: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(content)?;
        Ok(config)
    }

    pub fn lock_wait(&self) -> Duration {
        Duration::from_millis(self.lock_wait_ms)
    }

    /// The deadline for an operation the caller did not bound explicitly.
    pub fn default_deadline(&self) -> Deadline {
        match self.operation_timeout_ms {
            Some(ms) => Deadline::within(Duration::from_millis(ms)),
            None => Deadline::none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_full() {
        let config = PipelineConfig::parse(
            "data_dir: /var/lib/shardpipe\nlock_wait_ms: 250\noperation_timeout_ms: 3000\n",
        )
        .unwrap();

        assert_eq!(config.data_dir, "/var/lib/shardpipe");
        assert_eq!(config.lock_wait(), Duration::from_millis(250));
        assert!(!config.default_deadline().is_unbounded());
    }

    #[test]
    fn test_parse_defaults() {
        let config = PipelineConfig::parse("data_dir: ./data\n").unwrap();
        assert_eq!(config.lock_wait_ms, 5_000);
        assert!(config.default_deadline().is_unbounded());
    }

    #[test]
    fn test_parse_rejects_missing_data_dir() {
        assert!(PipelineConfig::parse("lock_wait_ms: 10\n").is_err());
    }
}
