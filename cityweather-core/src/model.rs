use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A validated weather reading for one canonical city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub city: String,
    /// Degrees Celsius.
    pub temperature: f64,
    pub description: String,
    pub humidity: Option<u8>,
    /// Metres per second.
    pub wind_speed: Option<f64>,
}

/// What a weather provider reported, before validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Observation {
    pub temperature_c: Option<f64>,
    pub description: Option<String>,
    pub humidity_pct: Option<u8>,
    pub wind_speed_mps: Option<f64>,
}

/// Coarse continental classification used to partition stored results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Region {
    Europe,
    Asia,
    America,
    Africa,
    Oceania,
    Unknown,
}

impl Region {
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Europe => "Europe",
            Region::Asia => "Asia",
            Region::America => "America",
            Region::Africa => "Africa",
            Region::Oceania => "Oceania",
            Region::Unknown => "Unknown",
        }
    }

    pub const fn all() -> &'static [Region] {
        &[
            Region::Europe,
            Region::Asia,
            Region::America,
            Region::Africa,
            Region::Oceania,
            Region::Unknown,
        ]
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Region {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Region::all()
            .iter()
            .copied()
            .find(|r| r.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown region '{value}'. Expected one of: Europe, Asia, America, Africa, Oceania, Unknown."
                )
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Running,
    Completed,
}

/// Outcome of one job run, as handed back to the job runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub job_id: String,
    pub status: JobState,
    pub processed_cities: usize,
    pub total_cities: usize,
    pub regions: Vec<Region>,
    pub files: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
