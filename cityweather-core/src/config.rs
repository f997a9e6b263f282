use anyhow::{Context, Result, anyhow, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    ops::RangeInclusive,
    path::{Path, PathBuf},
};

use crate::{
    credentials::KeyRotation,
    geocode::nominatim,
    normalize::DEFAULT_THRESHOLD,
    provider::ProviderId,
};

/// Comma separated API keys replacing the default provider's pool.
pub const ENV_API_KEYS: &str = "WEATHER_API_KEYS";
pub const ENV_RESULTS_DIR: &str = "WEATHER_RESULTS_DIR";

pub const DEFAULT_KNOWN_CITIES: &[&str] =
    &["Kyiv", "London", "New York", "Tokyo", "Paris", "Berlin"];

/// Configuration for a single provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Interchangeable keys; an empty pool makes every fetch fail closed.
    #[serde(default)]
    pub api_keys: Vec<String>,

    /// Endpoint override, mostly useful for testing against a local server.
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodingConfig {
    pub base_url: String,
    pub user_agent: String,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            base_url: nominatim::DEFAULT_BASE_URL.to_string(),
            user_agent: nominatim::DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Inclusive range of plausible temperatures in Celsius.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TemperatureRange {
    pub min: f64,
    pub max: f64,
}

impl Default for TemperatureRange {
    fn default() -> Self {
        Self { min: -50.0, max: 50.0 }
    }
}

impl TemperatureRange {
    pub fn range(&self) -> RangeInclusive<f64> {
        self.min..=self.max
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// 0..=100; a match must score strictly above this.
    pub threshold: u8,
    pub known_cities: Vec<String>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            known_cities: DEFAULT_KNOWN_CITIES.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Provider id, e.g. "openweather" or "weatherapi".
    pub default_provider: String,
    pub key_rotation: KeyRotation,
    pub request_timeout_secs: u64,
    pub results_dir: PathBuf,
    /// Cities fetched at once within one job; 1 keeps the job sequential.
    pub concurrency: usize,

    /// Example TOML:
    /// [providers.openweather]
    /// api_keys = ["...", "..."]
    pub providers: HashMap<String, ProviderConfig>,
    pub geocoding: GeocodingConfig,
    pub temperature: TemperatureRange,
    pub normalizer: NormalizerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_provider: ProviderId::OpenWeather.to_string(),
            key_rotation: KeyRotation::default(),
            request_timeout_secs: 5,
            results_dir: PathBuf::from("weather_data"),
            concurrency: 1,
            providers: HashMap::new(),
            geocoding: GeocodingConfig::default(),
            temperature: TemperatureRange::default(),
            normalizer: NormalizerConfig::default(),
        }
    }
}

impl Config {
    /// Return the default provider as a strongly-typed ProviderId.
    pub fn default_provider_id(&self) -> Result<ProviderId> {
        ProviderId::try_from(self.default_provider.as_str())
    }

    pub fn provider_config(&self, id: ProviderId) -> Option<&ProviderConfig> {
        self.providers.get(id.as_str())
    }

    pub fn set_default_provider(&mut self, id: ProviderId) {
        self.default_provider = id.as_str().to_string();
    }

    /// Load config from the platform location, or defaults if it doesn't exist yet.
    /// Environment overrides are applied on top.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        Self::load_from(&path)
    }

    /// File contents plus environment overrides; what a job should run with.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut cfg = Self::read_from(path)?;
        cfg.apply_env(|name| std::env::var(name).ok());
        Ok(cfg)
    }

    /// File contents only. Use this when the result will be saved back, so
    /// environment overrides never end up on disk.
    pub fn read_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Apply overrides from a variable lookup (normally the process environment).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(raw) = lookup(ENV_API_KEYS) {
            let keys = raw
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(String::from)
                .collect();
            self.providers
                .entry(self.default_provider.to_lowercase())
                .or_default()
                .api_keys = keys;
        }

        if let Some(dir) = lookup(ENV_RESULTS_DIR).filter(|d| !d.trim().is_empty()) {
            self.results_dir = PathBuf::from(dir);
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.default_provider_id()?;

        let TemperatureRange { min, max } = self.temperature;
        if min.is_nan() || max.is_nan() || min > max {
            bail!(
                "Invalid temperature range: min {min} is greater than max {max}"
            );
        }
        if self.normalizer.threshold > 100 {
            bail!(
                "Invalid normalizer threshold {}: expected 0..=100",
                self.normalizer.threshold
            );
        }
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be at least 1");
        }
        Ok(())
    }

    /// Save config to the platform location, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "cityweather", "cityweather")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Add a key to a provider's pool. The first provider to get a key becomes
    /// the default when nothing else is configured yet.
    pub fn add_provider_api_key(&mut self, provider_id: ProviderId, api_key: String) {
        let had_any = self.providers.values().any(|p| !p.api_keys.is_empty());

        let pool = &mut self
            .providers
            .entry(provider_id.as_str().to_string())
            .or_default()
            .api_keys;
        if !pool.contains(&api_key) {
            pool.push(api_key);
        }

        if !had_any {
            self.set_default_provider(provider_id);
        }
    }

    pub fn provider_api_keys(&self, provider_id: ProviderId) -> &[String] {
        self.provider_config(provider_id)
            .map(|cfg| cfg.api_keys.as_slice())
            .unwrap_or_default()
    }

    /// Credential pool of the default provider; empty when unknown or unconfigured.
    pub fn default_api_keys(&self) -> Vec<String> {
        self.default_provider_id()
            .map(|id| self.provider_api_keys(id).to_vec())
            .unwrap_or_default()
    }

    pub fn is_provider_configured(&self, provider_id: ProviderId) -> bool {
        !self.provider_api_keys(provider_id).is_empty()
    }
}
