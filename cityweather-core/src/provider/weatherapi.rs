use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::{
    error::ProviderError,
    model::Observation,
    provider::{WeatherProvider, humidity_pct, truncate_body},
};

pub const DEFAULT_BASE_URL: &str = "http://api.weatherapi.com/v1/current.json";

#[derive(Debug, Clone)]
pub struct WeatherApiProvider {
    base_url: String,
    http: Client,
}

impl WeatherApiProvider {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { base_url: base_url.into(), http })
    }
}

#[derive(Debug, Deserialize)]
struct WaCondition {
    text: String,
}

#[derive(Debug, Deserialize)]
struct WaCurrent {
    temp_c: Option<f64>,
    humidity: Option<f64>,
    wind_kph: Option<f64>,
    condition: Option<WaCondition>,
}

#[derive(Debug, Deserialize)]
struct WaResponse {
    current: Option<WaCurrent>,
}

impl WaResponse {
    fn into_observation(self) -> Result<Observation, ProviderError> {
        let current = self.current.ok_or(ProviderError::MissingField("current"))?;

        Ok(Observation {
            temperature_c: current.temp_c,
            description: current.condition.map(|c| c.text),
            humidity_pct: humidity_pct(current.humidity),
            wind_speed_mps: current.wind_kph.map(|kph| kph / 3.6),
        })
    }
}

#[async_trait]
impl WeatherProvider for WeatherApiProvider {
    async fn current(&self, city: &str, api_key: &str) -> Result<Observation, ProviderError> {
        let res = self
            .http
            .get(&self.base_url)
            .query(&[("key", api_key), ("q", city)])
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;
        debug!(city, %status, "WeatherAPI response");

        if !status.is_success() {
            return Err(ProviderError::Status { status, body: truncate_body(&body) });
        }

        let parsed: WaResponse = serde_json::from_str(&body)?;
        parsed.into_observation()
    }
}
