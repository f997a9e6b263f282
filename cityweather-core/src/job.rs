//! One pass over a batch of city names: normalize, fetch, persist by region.
//!
//! Per-city failures only lower `processed`; a job fails as a whole only on
//! a [`JobError`].

use std::collections::BTreeSet;

use chrono::Utc;
use futures::{StreamExt, stream};
use tracing::{Instrument, debug, info, info_span};

use crate::{
    Config,
    credentials::{KeyCursor, KeyRotation},
    error::JobError,
    fetch::WeatherFetcher,
    geocode::geocoder_from_config,
    model::{JobState, JobSummary, Region, WeatherRecord},
    normalize::CityNormalizer,
    provider::default_provider_from_config,
    region::RegionClassifier,
    store::ResultStore,
};

/// Progress of a single job while it runs.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub cities: Vec<String>,
    pub processed: usize,
    pub total: usize,
    pub regions: BTreeSet<Region>,
    pub state: JobState,
}

impl Job {
    pub fn new(id: impl Into<String>, cities: Vec<String>) -> Self {
        let total = cities.len();
        Self {
            id: id.into(),
            cities,
            processed: 0,
            total,
            regions: BTreeSet::new(),
            state: JobState::Running,
        }
    }
}

#[derive(Debug, Clone)]
pub struct JobOrchestrator {
    normalizer: CityNormalizer,
    fetcher: WeatherFetcher,
    store: ResultStore,
    rotation: KeyRotation,
    concurrency: usize,
}

impl JobOrchestrator {
    pub fn new(
        normalizer: CityNormalizer,
        fetcher: WeatherFetcher,
        store: ResultStore,
        rotation: KeyRotation,
    ) -> Self {
        Self {
            normalizer,
            fetcher,
            store,
            rotation,
            concurrency: 1,
        }
    }

    /// Wire up providers, normalizer and store from configuration.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        config.validate()?;

        let provider = default_provider_from_config(config)?;
        let geocoder = geocoder_from_config(config)?;
        let api_keys = config.default_api_keys();

        let normalizer = CityNormalizer::new(
            config.normalizer.known_cities.clone(),
            config.normalizer.threshold,
        );
        let fetcher = WeatherFetcher::new(provider, api_keys, config.temperature.range());
        let store = ResultStore::new(&config.results_dir, RegionClassifier::new(geocoder))
            .with_concurrency(config.concurrency);

        Ok(Self::new(normalizer, fetcher, store, config.key_rotation)
            .with_concurrency(config.concurrency))
    }

    /// Allow up to `n` cities to be fetched at once. Output order is unaffected.
    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    pub async fn run(&self, job_id: &str, cities: Vec<String>) -> Result<JobSummary, JobError> {
        if job_id.trim().is_empty() {
            return Err(JobError::EmptyJobId);
        }

        let span = info_span!("job", job_id);
        self.run_job(Job::new(job_id, cities)).instrument(span).await
    }

    async fn run_job(&self, mut job: Job) -> Result<JobSummary, JobError> {
        let started_at = Utc::now();
        info!(total = job.total, "job started");

        let cursor = KeyCursor::new(self.rotation);
        let records = self.fetch_all(&job.cities, &cursor).await;
        job.processed = records.len();

        let report = self.store.save(&job.id, records).await?;
        job.regions.extend(report.by_region.keys().copied());
        job.state = JobState::Completed;

        info!(
            processed = job.processed,
            total = job.total,
            regions = job.regions.len(),
            "job completed"
        );

        Ok(JobSummary {
            job_id: job.id,
            status: job.state,
            processed_cities: job.processed,
            total_cities: job.total,
            regions: job.regions.into_iter().collect(),
            files: report
                .written
                .iter()
                .map(|p| p.display().to_string())
                .collect(),
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Valid records in input order; blank names and failed fetches are dropped.
    async fn fetch_all(&self, cities: &[String], cursor: &KeyCursor) -> Vec<WeatherRecord> {
        stream::iter(cities)
            .filter_map(|raw| async move {
                let city = self.normalizer.normalize(raw);
                if city.is_none() {
                    debug!(raw = raw.as_str(), "skipping blank city");
                }
                city
            })
            .map(|city| async move { self.fetcher.fetch(&city, cursor).await })
            .buffered(self.concurrency)
            .filter_map(|record| async move { record })
            .collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::{
        error::ProviderError,
        fetch::DEFAULT_TEMPERATURE_RANGE,
        geocode::GeocodingProvider,
        model::Observation,
        normalize::DEFAULT_THRESHOLD,
        provider::WeatherProvider,
    };

    #[derive(Debug)]
    struct Table;

    #[async_trait]
    impl WeatherProvider for Table {
        async fn current(&self, city: &str, _api_key: &str) -> Result<Observation, ProviderError> {
            let temp = match city {
                "Kyiv" => 4.0,
                "London" => 11.0,
                "Tokyo" => 19.0,
                "Hell" => 99.0,
                _ => return Err(ProviderError::MissingField("main")),
            };
            Ok(Observation {
                temperature_c: Some(temp),
                description: Some("scattered clouds".into()),
                humidity_pct: None,
                wind_speed_mps: None,
            })
        }
    }

    #[derive(Debug)]
    struct Names;

    #[async_trait]
    impl GeocodingProvider for Names {
        async fn display_name(&self, city: &str) -> Result<Option<String>, ProviderError> {
            Ok(match city {
                "London" => Some("London, England, United Kingdom, Europe".into()),
                "Tokyo" => Some("Tokyo, Japan, Asia".into()),
                _ => None,
            })
        }
    }

    fn orchestrator(dir: &TempDir, keys: usize) -> JobOrchestrator {
        let known = ["Kyiv", "London", "New York", "Tokyo", "Paris", "Berlin"]
            .iter()
            .map(|c| c.to_string())
            .collect();
        let api_keys = (0..keys).map(|i| format!("K{i}")).collect();

        JobOrchestrator::new(
            CityNormalizer::new(known, DEFAULT_THRESHOLD),
            WeatherFetcher::new(Arc::new(Table), api_keys, DEFAULT_TEMPERATURE_RANGE),
            ResultStore::new(dir.path(), RegionClassifier::new(Arc::new(Names))),
            KeyRotation::RoundRobin,
        )
    }

    fn cities(names: &[&str]) -> Vec<String> {
        names.iter().map(|c| c.to_string()).collect()
    }

    #[tokio::test]
    async fn normalizes_fetches_and_groups() {
        let dir = TempDir::new().unwrap();
        let o = orchestrator(&dir, 2);

        let summary = o.run("t1", cities(&["Kyiv", "Lndon", "Tokyo"])).await.unwrap();

        assert_eq!(summary.status, JobState::Completed);
        assert_eq!(summary.processed_cities, 3);
        assert_eq!(summary.total_cities, 3);
        assert_eq!(summary.regions, vec![Region::Europe, Region::Asia, Region::Unknown]);
        assert_eq!(summary.files.len(), 3);

        let europe = o.store().load(Region::Europe, "t1").await.unwrap();
        assert_eq!(europe[0].city, "London");
    }

    #[tokio::test]
    async fn blank_and_failed_cities_count_only_towards_total() {
        let dir = TempDir::new().unwrap();
        let o = orchestrator(&dir, 1);

        let summary = o
            .run("t2", cities(&["", "  ", "Atlantis", "Hell", "Tokyo"]))
            .await
            .unwrap();

        assert_eq!(summary.processed_cities, 1);
        assert_eq!(summary.total_cities, 5);
        assert_eq!(summary.regions, vec![Region::Asia]);
    }

    #[tokio::test]
    async fn empty_pool_completes_with_nothing_processed() {
        let dir = TempDir::new().unwrap();
        let o = orchestrator(&dir, 0);

        let summary = o.run("t3", cities(&["Kyiv", "Tokyo"])).await.unwrap();

        assert_eq!(summary.processed_cities, 0);
        assert_eq!(summary.total_cities, 2);
        assert!(summary.regions.is_empty());
        assert!(summary.files.is_empty());
    }

    #[tokio::test]
    async fn concurrent_fetching_keeps_input_order() {
        let dir = TempDir::new().unwrap();
        let o = orchestrator(&dir, 3).with_concurrency(4);

        o.run("t4", cities(&["London", "Kyiv", "Tokyo", "Lndon"])).await.unwrap();

        let europe = o.store().load(Region::Europe, "t4").await.unwrap();
        assert_eq!(europe.len(), 2);
        let unknown = o.store().load(Region::Unknown, "t4").await.unwrap();
        assert_eq!(unknown[0].city, "Kyiv");
    }

    #[tokio::test]
    async fn empty_job_id_is_fatal() {
        let dir = TempDir::new().unwrap();
        let err = orchestrator(&dir, 1).run(" ", cities(&["Kyiv"])).await.unwrap_err();
        assert!(matches!(err, JobError::EmptyJobId));
    }

    #[tokio::test]
    async fn unwritable_results_root_is_fatal() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"").unwrap();

        let classifier = RegionClassifier::new(Arc::new(Names));
        let o = JobOrchestrator {
            store: ResultStore::new(blocker.join("results"), classifier),
            ..orchestrator(&dir, 1)
        };

        let err = o.run("t5", cities(&["Tokyo"])).await.unwrap_err();
        assert!(matches!(err, JobError::Store(_)));
    }
}
