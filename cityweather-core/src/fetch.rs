use std::{ops::RangeInclusive, sync::Arc};

use tracing::{debug, error, warn};

use crate::{
    credentials::KeyCursor,
    model::{Observation, WeatherRecord},
    provider::WeatherProvider,
};

pub const DEFAULT_TEMPERATURE_RANGE: RangeInclusive<f64> = -50.0..=50.0;

/// Fetches and validates current weather, spreading calls over a credential pool.
#[derive(Debug, Clone)]
pub struct WeatherFetcher {
    provider: Arc<dyn WeatherProvider>,
    api_keys: Vec<String>,
    valid_range: RangeInclusive<f64>,
}

impl WeatherFetcher {
    pub fn new(
        provider: Arc<dyn WeatherProvider>,
        api_keys: Vec<String>,
        valid_range: RangeInclusive<f64>,
    ) -> Self {
        Self {
            provider,
            api_keys,
            valid_range,
        }
    }

    /// One request, no retries. Every failure is logged and becomes `None`.
    pub async fn fetch(&self, city: &str, cursor: &KeyCursor) -> Option<WeatherRecord> {
        let Some(api_key) = cursor.next(&self.api_keys) else {
            error!(city, "no API keys configured");
            return None;
        };

        let observation = match self.provider.current(city, api_key).await {
            Ok(obs) => obs,
            Err(e) if e.is_timeout() => {
                error!(city, "request timeout");
                return None;
            }
            Err(e) => {
                error!(city, error = %e, "weather request failed");
                return None;
            }
        };

        self.validate(city, observation)
    }

    fn validate(&self, city: &str, obs: Observation) -> Option<WeatherRecord> {
        let temperature = match obs.temperature_c {
            Some(t) if self.valid_range.contains(&t) => t,
            other => {
                warn!(city, temperature = ?other, "invalid temperature");
                return None;
            }
        };

        let Some(description) = obs.description else {
            error!(city, "response has no weather description");
            return None;
        };

        debug!(city, temperature, %description, "weather fetched");
        Some(WeatherRecord {
            city: city.to_string(),
            temperature,
            description,
            humidity: obs.humidity_pct,
            wind_speed: obs.wind_speed_mps,
        })
    }
}
