use crate::{
    Config, Observation,
    error::ProviderError,
    provider::{openweather::OpenWeatherProvider, weatherapi::WeatherApiProvider},
};
use async_trait::async_trait;
use std::{convert::TryFrom, fmt::Debug, sync::Arc, time::Duration};

pub mod openweather;
pub mod weatherapi;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    OpenWeather,
    WeatherApi,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenWeather => "openweather",
            ProviderId::WeatherApi => "weatherapi",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::OpenWeather, ProviderId::WeatherApi]
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderId::OpenWeather => openweather::DEFAULT_BASE_URL,
            ProviderId::WeatherApi => weatherapi::DEFAULT_BASE_URL,
        }
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "openweather" => Ok(ProviderId::OpenWeather),
            "weatherapi" => Ok(ProviderId::WeatherApi),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: openweather, weatherapi."
            )),
        }
    }
}

/// Current conditions for a city name, authenticated with one API key per call.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn current(&self, city: &str, api_key: &str) -> Result<Observation, ProviderError>;
}

/// Construct a provider from config and explicit ProviderId.
///
/// Credentials are not consulted here: the pool is handed to the fetcher,
/// which fails closed per call when it is empty.
pub fn provider_from_config(
    id: ProviderId,
    config: &Config,
) -> anyhow::Result<Arc<dyn WeatherProvider>> {
    let base_url = config
        .provider_config(id)
        .and_then(|p| p.base_url.clone())
        .unwrap_or_else(|| id.default_base_url().to_string());
    let timeout = Duration::from_secs(config.request_timeout_secs);

    let provider: Arc<dyn WeatherProvider> = match id {
        ProviderId::OpenWeather => Arc::new(OpenWeatherProvider::new(base_url, timeout)?),
        ProviderId::WeatherApi => Arc::new(WeatherApiProvider::new(base_url, timeout)?),
    };

    Ok(provider)
}

/// Construct the default provider from config, using `default_provider` field.
pub fn default_provider_from_config(config: &Config) -> anyhow::Result<Arc<dyn WeatherProvider>> {
    let id = config.default_provider_id()?;
    provider_from_config(id, config)
}

/// Relative humidity as a whole percentage. Providers may report fractions,
/// and anything outside 0..=100 is treated as absent.
pub(crate) fn humidity_pct(raw: Option<f64>) -> Option<u8> {
    raw.filter(|h| (0.0..=100.0).contains(h))
        .map(|h| h.round() as u8)
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
