//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Every field has a default, so a missing file section falls back to the
//! stock MLB setup. Secrets (the odds API key) are referenced by env-var
//! name in the config and resolved at runtime.

use anyhow::{Context, Result};
use chrono::Duration;
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;

use crate::engine::normalizer::NormalizerConfig;
use crate::platforms::odds_api::{OddsApiSettings, DEFAULT_BASE_URL};
use crate::storage::DEFAULT_DATABASE_URL;
use crate::strategy::edge::DetectionConfig;
use crate::types::MarketType;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub tracker: TrackerConfig,
    pub provider: ProviderConfig,
    pub detection: DetectionSettings,
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TrackerConfig {
    pub name: String,
    /// Provider sport key, e.g. `baseball_mlb`.
    pub sport_key: String,
    /// Tag stamped on every stored quote, e.g. `MLB`.
    pub sport_label: String,
    pub poll_interval_secs: u64,
    /// Wait after a failed fetch before trying again.
    pub retry_delay_secs: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            name: "ODDSWATCH-MLB".to_string(),
            sport_key: "baseball_mlb".to_string(),
            sport_label: "MLB".to_string(),
            poll_interval_secs: 300,
            retry_delay_secs: 60,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key_env: String,
    pub regions: String,
    pub odds_format: String,
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key_env: "ODDS_API_KEY".to_string(),
            regions: "us".to_string(),
            odds_format: "american".to_string(),
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DetectionSettings {
    /// Fractional threshold (0.05 = 5 percentage points below 100%).
    pub min_edge: f64,
    pub staleness_window_hours: i64,
    /// Markets requested from the provider and normalized.
    pub market_types: Vec<MarketType>,
    /// Markets scanned for mispricings.
    pub detect_market_types: Vec<MarketType>,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            min_edge: 0.05,
            staleness_window_hours: 4,
            market_types: MarketType::ALL.to_vec(),
            detect_market_types: vec![MarketType::H2h],
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub database_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
        }
    }
}

impl AppConfig {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml(&contents).with_context(|| format!("Invalid config file: {path}"))
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let d = &self.detection;
        anyhow::ensure!(
            (0.0..1.0).contains(&d.min_edge),
            "detection.min_edge must be in [0, 1), got {}",
            d.min_edge
        );
        anyhow::ensure!(
            d.staleness_window_hours >= 0,
            "detection.staleness_window_hours must not be negative"
        );
        anyhow::ensure!(!d.market_types.is_empty(), "detection.market_types is empty");
        anyhow::ensure!(
            d.detect_market_types.iter().all(|m| d.market_types.contains(m)),
            "detection.detect_market_types must be a subset of detection.market_types"
        );
        anyhow::ensure!(self.tracker.poll_interval_secs > 0, "tracker.poll_interval_secs must be > 0");
        anyhow::ensure!(!self.tracker.sport_key.is_empty(), "tracker.sport_key is empty");
        Ok(())
    }

    /// Resolve an environment variable name to its value.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// The odds API key, read from the env var named in `provider.api_key_env`.
    pub fn api_key(&self) -> Result<SecretString> {
        Self::resolve_env(&self.provider.api_key_env).map(SecretString::new)
    }

    pub fn normalizer_config(&self) -> NormalizerConfig {
        NormalizerConfig {
            sport: self.tracker.sport_label.clone(),
            staleness_window: Duration::hours(self.detection.staleness_window_hours),
            market_types: self.detection.market_types.clone(),
        }
    }

    pub fn detection_config(&self) -> DetectionConfig {
        DetectionConfig {
            min_edge: self.detection.min_edge,
            market_types: self.detection.detect_market_types.clone(),
        }
    }

    pub fn odds_api_settings(&self) -> OddsApiSettings {
        OddsApiSettings {
            base_url: self.provider.base_url.clone(),
            sport_key: self.tracker.sport_key.clone(),
            regions: self.provider.regions.clone(),
            markets: self.detection.market_types.clone(),
            odds_format: self.provider.odds_format.clone(),
            timeout: std::time::Duration::from_secs(self.provider.timeout_secs),
        }
    }
}
