//! Core library for the `cityweather` batch pipeline.
//!
//! This crate defines:
//! - Configuration & credential pools
//! - Fuzzy normalization of city names
//! - Abstractions over weather and geocoding providers
//! - Region classification and region-partitioned result storage
//! - The job orchestrator tying the stages together
//!
//! It is used by `cityweather-cli`, but a job runner or HTTP service can call
//! [`JobOrchestrator::run`] directly.

pub mod config;
pub mod credentials;
pub mod error;
pub mod fetch;
pub mod geocode;
pub mod job;
pub mod model;
pub mod normalize;
pub mod provider;
pub mod region;
pub mod store;

pub use config::{Config, ProviderConfig};
pub use credentials::{KeyCursor, KeyRotation};
pub use error::{JobError, ProviderError, StoreError};
pub use fetch::WeatherFetcher;
pub use geocode::GeocodingProvider;
pub use job::JobOrchestrator;
pub use model::{JobState, JobSummary, Observation, Region, WeatherRecord};
pub use normalize::CityNormalizer;
pub use provider::{ProviderId, WeatherProvider};
pub use region::RegionClassifier;
pub use store::ResultStore;
