use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::VerdantError;
use crate::history::{HistoryStore, RetentionPolicy};
use crate::identify::{ClientConfig, PlantIdClient, DEFAULT_DETAILS, DEFAULT_ENDPOINT};
use crate::storage::FileStore;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct VerdantConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub identification: IdentificationConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IdentificationConfig {
    pub endpoint: String,
    /// Falls back to `PLANT_ID_API_KEY` when empty.
    pub api_key: String,
    pub details: String,
    pub timeout_seconds: u64,
}

impl Default for IdentificationConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: String::new(),
            details: DEFAULT_DETAILS.to_string(),
            timeout_seconds: 30,
        }
    }
}

impl IdentificationConfig {
    pub fn client_config(&self) -> ClientConfig {
        let mut client = ClientConfig::new(Some(self.api_key.clone()));
        client.endpoint = self.endpoint.clone();
        client.details = self.details.clone();
        client.timeout = Duration::from_secs(self.timeout_seconds);
        client
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HistoryConfig {
    pub data_dir: PathBuf,
    pub storage_key: String,
    pub max_entries: Option<usize>,
    pub max_age_days: Option<i64>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".verdant"),
            storage_key: crate::history::DEFAULT_STORAGE_KEY.to_string(),
            max_entries: None,
            max_age_days: None,
        }
    }
}

impl HistoryConfig {
    /// Zero `max_entries` or a non-positive `max_age_days` would discard every
    /// entry as it is written, so both are rejected.
    pub fn retention(&self) -> Result<RetentionPolicy, ConfigError> {
        let max_entries = match self.max_entries {
            None => None,
            Some(n) => Some(NonZeroUsize::new(n).ok_or_else(|| {
                ConfigError::Message("history.max_entries must be at least 1".to_string())
            })?),
        };
        let max_age = match self.max_age_days {
            None => None,
            Some(days) if days > 0 => Some(chrono::Duration::days(days)),
            Some(days) => {
                return Err(ConfigError::Message(format!(
                    "history.max_age_days must be positive, got {days}"
                )))
            }
        };
        Ok(RetentionPolicy {
            max_entries,
            max_age,
        })
    }
}

impl VerdantConfig {
    /// Load from a TOML file (optional) layered under `VERDANT__SECTION__KEY` env vars.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("VERDANT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        let config: Self = s.try_deserialize()?;
        config.history.retention()?;
        Ok(config)
    }

    pub fn identification_client(&self) -> Result<PlantIdClient, VerdantError> {
        Ok(PlantIdClient::new(self.identification.client_config())?)
    }

    /// File-backed history under `history.data_dir`, with the configured key and retention.
    pub async fn open_history(&self) -> Result<HistoryStore, VerdantError> {
        let retention = self.history.retention()?;
        let storage = FileStore::open(&self.history.data_dir).await?;
        Ok(HistoryStore::new(std::sync::Arc::new(storage))
            .with_key(self.history.storage_key.clone())
            .with_retention(retention))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_when_file_missing() {
        let cfg = VerdantConfig::load("/nonexistent/verdant-test-config").unwrap();
        assert_eq!(cfg.service.log_level, "info");
        assert_eq!(cfg.identification.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(cfg.history.storage_key, "plantHistory");
        assert!(cfg.history.retention().unwrap().is_unbounded());
    }

    #[test]
    fn test_load_from_toml() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[service]
log_level = "debug"

[identification]
endpoint = "http://localhost:9999/identify"
api_key = "from-file"
timeout_seconds = 5

[history]
data_dir = "/tmp/verdant"
max_entries = 50
max_age_days = 30
"#
        )
        .unwrap();

        let cfg = VerdantConfig::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(cfg.service.log_level, "debug");
        assert_eq!(cfg.identification.details, DEFAULT_DETAILS);

        let client = cfg.identification.client_config();
        assert_eq!(client.api_key, "from-file");
        assert_eq!(client.endpoint, "http://localhost:9999/identify");
        assert_eq!(client.timeout, Duration::from_secs(5));

        let retention = cfg.history.retention().unwrap();
        assert_eq!(retention.max_entries, NonZeroUsize::new(50));
        assert_eq!(retention.max_age, Some(chrono::Duration::days(30)));
    }

    #[tokio::test]
    async fn test_open_history_uses_configured_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = VerdantConfig::default();
        cfg.history.data_dir = dir.path().join("nested");
        cfg.history.storage_key = "gardenHistory".to_string();

        let history = cfg.open_history().await.unwrap();
        assert_eq!(history.key(), "gardenHistory");
        assert!(history.list().await.unwrap().is_empty());
        assert!(dir.path().join("nested").is_dir());
    }

    #[test]
    fn test_zero_or_negative_retention_rejected() {
        let mut history = HistoryConfig {
            max_entries: Some(0),
            ..HistoryConfig::default()
        };
        assert!(history.retention().is_err());

        history.max_entries = None;
        history.max_age_days = Some(-3);
        assert!(history.retention().is_err());

        history.max_age_days = Some(0);
        assert!(history.retention().is_err());

        history.max_age_days = Some(7);
        assert_eq!(
            history.retention().unwrap().max_age,
            Some(chrono::Duration::days(7))
        );
    }

    #[test]
    fn test_load_rejects_zero_max_entries() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[history]\nmax_entries = 0").unwrap();

        assert!(VerdantConfig::load(file.path().to_str().unwrap()).is_err());
    }

    #[tokio::test]
    async fn test_open_history_rejects_zero_max_entries() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = VerdantConfig::default();
        cfg.history.data_dir = dir.path().to_path_buf();
        cfg.history.max_entries = Some(0);

        assert!(matches!(
            cfg.open_history().await,
            Err(VerdantError::Config(_))
        ));
    }

    #[test]
    fn test_identification_client_from_configured_key() {
        let mut cfg = VerdantConfig::default();
        cfg.identification.api_key = "configured".to_string();
        assert!(cfg.identification_client().is_ok());
    }
}
