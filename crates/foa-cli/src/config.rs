//! The gateway configuration file.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use foa_server::ServerConfig;
use foa_sync::{RetryPolicy, SyncConfig};
use foa_types::User;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot render configuration: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FoaConfig {
    pub server: ServerConfig,
    pub sync: SyncSection,
    pub network: NetworkSection,
    pub log: LogSection,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<UserSection>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncSection {
    pub network_timeout_ms: u64,
    pub ingest_page_size: usize,
    pub retry_attempts: u32,
    pub retry_base_ms: u64,
    pub retry_max_ms: u64,
    pub refresh_interval_secs: u64,
    pub queue_interval_secs: u64,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            network_timeout_ms: 5000,
            ingest_page_size: 100,
            retry_attempts: 5,
            retry_base_ms: 200,
            retry_max_ms: 10_000,
            refresh_interval_secs: 60,
            queue_interval_secs: 10,
        }
    }
}

impl SyncSection {
    pub fn to_sync_config(&self) -> SyncConfig {
        SyncConfig {
            network_timeout: Duration::from_millis(self.network_timeout_ms),
            ingest_page_size: self.ingest_page_size,
            retry: RetryPolicy {
                attempts: self.retry_attempts,
                base: Duration::from_millis(self.retry_base_ms),
                max: Duration::from_millis(self.retry_max_ms),
            },
            refresh_interval: Duration::from_secs(self.refresh_interval_secs),
            queue_interval: Duration::from_secs(self.queue_interval_secs),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkSection {
    /// How often the simulated ledger confirms pending submissions.
    pub block_interval_secs: u64,
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            block_interval_secs: 10,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogSection {
    /// Default filter; `RUST_LOG` takes precedence.
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserSection {
    pub name: String,
    pub key: String,
    /// `0` means unlimited.
    #[serde(default)]
    pub usage_limit: u64,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl UserSection {
    pub fn to_user(&self) -> User {
        let mut user = User::new(self.name.clone(), self.key.clone(), self.usage_limit);
        user.enabled = self.enabled;
        user
    }
}

impl FoaConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&raw)
    }

    /// Parse and validate.
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sync
            .to_sync_config()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.network.block_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "network.block_interval_secs must be positive".into(),
            ));
        }
        if !matches!(
            self.log.level.as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        ) {
            return Err(ConfigError::Invalid(format!(
                "unknown log level '{}'",
                self.log.level
            )));
        }

        let mut keys = HashSet::new();
        for user in &self.users {
            if user.name.is_empty() || user.key.is_empty() {
                return Err(ConfigError::Invalid(
                    "every user needs a name and a key".into(),
                ));
            }
            if !keys.insert(user.key.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "access key of user '{}' is already assigned",
                    user.name
                )));
            }
        }
        Ok(())
    }
}
