use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};

/// Top-level configuration for the ingestion and lookup engine. Loaded from
/// TOML with environment-variable overrides, following the same
/// load-then-validate shape the rest of this codebase uses for its
/// pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    pub store: StoreConfig,
    pub key_prefix: String,
    pub staging: StagingConfig,
    pub update: UpdateConfig,
    pub cache: CacheConfig,
    pub dnsbl: DnsblConfig,
    #[serde(default)]
    pub feeds: HashMap<String, FeedConfig>,
}

/// Only the store connection and key prefix are required by the core per
/// spec §6; everything else has a sensible default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StoreConfig {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StagingConfig {
    pub dir: PathBuf,
    pub merged_csv_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct UpdateConfig {
    pub lock_ttl_secs: u64,
    pub timeout_secs: u64,
    pub batch_size: usize,
    pub gc_between_batches: bool,
    pub cron: String,
    pub timezone: String,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            lock_ttl_secs: 3600,
            timeout_secs: 600,
            batch_size: 100_000,
            gc_between_batches: false,
            cron: "0 0 3 * * *".to_string(),
            timezone: "UTC".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
    /// Resolves spec §9's open question: `false` (default) matches the
    /// original's observed TTL-only behavior; `true` has the coordinator
    /// best-effort flush the cache namespace right after a successful swap.
    pub invalidate_on_swap: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 48 * 3600,
            invalidate_on_swap: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DnsblConfig {
    pub enabled: bool,
    pub provider: String,
}

impl Default for DnsblConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: "dronebl.org".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FeedConfig {
    pub kind: FeedKind,
    pub url: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub abort_on_fail: bool,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FeedKind {
    SimpleList,
    AwsIpRanges,
    GcpIpRanges,
    GoogleServiceRanges,
    FastlyIpRanges,
    MaxmindAsn,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CoreError::config(format!("failed to read config file: {e}")))?;

        let mut config: Config = toml::from_str(&content)
            .map_err(|e| CoreError::config(format!("failed to parse config: {e}")))?;

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("CORE_STORE_URL") {
            self.store.url = url;
        }
        if let Ok(prefix) = std::env::var("CORE_KEY_PREFIX") {
            self.key_prefix = prefix;
        }
        if let Ok(cron) = std::env::var("CORE_UPDATE_CRON") {
            self.update.cron = cron;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.store.url.is_empty() {
            return Err(CoreError::config("store.url must not be empty"));
        }
        if self.key_prefix.is_empty() {
            return Err(CoreError::config("key_prefix must not be empty"));
        }
        if self.update.batch_size == 0 {
            return Err(CoreError::config("update.batch_size must be positive"));
        }
        // cron parse validity is checked by the coordinator at schedule time
        // so a config with a cron the coordinator will reject still loads
        // (matches spec's "skip this trigger" philosophy rather than a hard
        // startup failure for an operator typo).
        Ok(())
    }

    pub fn live_key(&self) -> String {
        format!("{}intervals:live", self.key_prefix)
    }

    pub fn temp_key(&self) -> String {
        format!("{}intervals:tmp", self.key_prefix)
    }

    pub fn lock_key(&self) -> String {
        format!("{}lock:update", self.key_prefix)
    }

    pub fn status_key(&self) -> String {
        format!("{}status:update", self.key_prefix)
    }

    pub fn cache_key(&self, ip: &str, dnsbl: bool) -> String {
        if dnsbl {
            format!("{}cache:{}:dronebl", self.key_prefix, ip)
        } else {
            format!("{}cache:{}", self.key_prefix, ip)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_store_url() {
        let config = Config {
            store: StoreConfig { url: String::new() },
            key_prefix: "siem:".into(),
            staging: StagingConfig {
                dir: PathBuf::from("/tmp/staging"),
                merged_csv_path: PathBuf::from("/tmp/merged.csv"),
            },
            update: UpdateConfig::default(),
            cache: CacheConfig::default(),
            dnsbl: DnsblConfig::default(),
            feeds: HashMap::new(),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn derives_namespaced_keys_from_prefix() {
        let config = Config {
            store: StoreConfig {
                url: "redis://localhost".into(),
            },
            key_prefix: "siem:".into(),
            staging: StagingConfig {
                dir: PathBuf::from("/tmp/staging"),
                merged_csv_path: PathBuf::from("/tmp/merged.csv"),
            },
            update: UpdateConfig::default(),
            cache: CacheConfig::default(),
            dnsbl: DnsblConfig::default(),
            feeds: HashMap::new(),
        };
        assert_eq!(config.live_key(), "siem:intervals:live");
        assert_eq!(config.temp_key(), "siem:intervals:tmp");
        assert_eq!(config.cache_key("1.2.3.4", false), "siem:cache:1.2.3.4");
        assert_eq!(config.cache_key("1.2.3.4", true), "siem:cache:1.2.3.4:dronebl");
    }
}
