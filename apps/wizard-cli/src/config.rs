//! CLI configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/reportflow/wizard.toml`
//! - Windows: `%APPDATA%/reportflow/wizard.toml`

use std::path::{Path, PathBuf};
use std::time::Duration;

use reportflow_event_stream::{ConsumerConfig, ReconnectConfig};
use reportflow_protocol::IndexNames;
use reportflow_protocol::constants::{CHUNK_SIZE, DEFAULT_API_BASE_URL};
use reportflow_wizard::{RetryPolicy, WorkflowConfig};
use serde::{Deserialize, Serialize};

/// Wizard configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WizardConfig {
    /// Base URL of the report-processing service.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Upload chunk size in bytes.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,

    #[serde(default)]
    pub stream: StreamSettings,

    #[serde(default)]
    pub retry: RetrySettings,

    /// Elasticsearch indices used by `--ingest`.
    #[serde(default)]
    pub indices: IndexNames,
}

/// Event feed reconnection and deduplication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSettings {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_factor: f64,
    pub dedup_capacity: usize,
}

/// Upload step retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub delay_ms: u64,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_chunk_size() -> u64 {
    CHUNK_SIZE
}

impl Default for StreamSettings {
    fn default() -> Self {
        let reconnect = ReconnectConfig::default();
        Self {
            initial_delay_ms: reconnect.initial_delay.as_millis() as u64,
            max_delay_ms: reconnect.max_delay.as_millis() as u64,
            backoff_factor: reconnect.backoff_factor,
            dedup_capacity: ConsumerConfig::default().dedup_capacity,
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            max_attempts: retry.max_attempts,
            delay_ms: retry.delay.as_millis() as u64,
        }
    }
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            chunk_size: default_chunk_size(),
            stream: StreamSettings::default(),
            retry: RetrySettings::default(),
            indices: IndexNames::default(),
        }
    }
}

impl WizardConfig {
    /// Loads configuration from `path`, writing defaults there if the file
    /// does not exist.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: WizardConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = WizardConfig::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Saves the configuration to `path`.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Stream settings for a bare event consumer.
    pub fn consumer_config(&self) -> ConsumerConfig {
        ConsumerConfig {
            reconnect: ReconnectConfig {
                initial_delay: Duration::from_millis(self.stream.initial_delay_ms),
                max_delay: Duration::from_millis(self.stream.max_delay_ms),
                backoff_factor: self.stream.backoff_factor,
            },
            dedup_capacity: self.stream.dedup_capacity,
        }
    }

    /// Settings for a full workflow run.
    pub fn workflow_config(&self) -> WorkflowConfig {
        WorkflowConfig {
            chunk_size: self.chunk_size,
            retry: RetryPolicy {
                max_attempts: self.retry.max_attempts.max(1),
                delay: Duration::from_millis(self.retry.delay_ms),
            },
            stream: self.consumer_config(),
            indices: self.indices.clone(),
        }
    }
}

/// Returns the platform-specific configuration file path.
pub fn config_path() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        Ok(PathBuf::from(appdata).join("reportflow").join("wizard.toml"))
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home)
            .join(".config")
            .join("reportflow")
            .join("wizard.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = WizardConfig::default();
        assert_eq!(config.api_base_url, "http://localhost:8000");
        assert_eq!(config.chunk_size, 8 * 1024 * 1024);
        assert_eq!(config.stream.initial_delay_ms, 1000);
        assert_eq!(config.stream.max_delay_ms, 15_000);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.indices.t1_normal, "qualys_t1_normal");
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = WizardConfig {
            api_base_url: "https://reports.internal:8443".into(),
            chunk_size: 1024,
            ..WizardConfig::default()
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: WizardConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn config_partial_toml() {
        let toml_str = r#"
api_base_url = "http://10.0.0.5:8000"

[stream]
max_delay_ms = 30000

[indices]
t2_normal = "custom_t2"
"#;
        let config: WizardConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.api_base_url, "http://10.0.0.5:8000");
        assert_eq!(config.chunk_size, CHUNK_SIZE);
        assert_eq!(config.stream.max_delay_ms, 30_000);
        assert_eq!(config.stream.initial_delay_ms, 1000);
        assert_eq!(config.indices.t2_normal, "custom_t2");
        assert_eq!(config.indices.t2_adjusted, "qualys_t2_ajustada");
    }

    #[test]
    fn config_path_not_empty() {
        let path = config_path().unwrap();
        assert!(path.to_string_lossy().contains("reportflow"));
        assert!(path.ends_with("wizard.toml"));
    }

    #[test]
    fn load_creates_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("wizard.toml");

        let config = WizardConfig::load_from(&path).unwrap();
        assert_eq!(config, WizardConfig::default());
        assert!(path.exists());
    }

    #[test]
    fn save_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("wizard.toml");

        let config = WizardConfig {
            chunk_size: 4096,
            retry: RetrySettings {
                max_attempts: 5,
                delay_ms: 250,
            },
            ..WizardConfig::default()
        };
        config.save_to(&path).unwrap();

        let loaded = WizardConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn workflow_config_conversion() {
        let config = WizardConfig {
            retry: RetrySettings {
                max_attempts: 0,
                delay_ms: 1500,
            },
            ..WizardConfig::default()
        };
        let wf = config.workflow_config();
        assert_eq!(wf.retry.max_attempts, 1);
        assert_eq!(wf.retry.delay, Duration::from_millis(1500));
        assert_eq!(wf.stream.reconnect.max_delay, Duration::from_secs(15));
        assert_eq!(wf.chunk_size, CHUNK_SIZE);
    }
}
