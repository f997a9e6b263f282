use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use cityweather_core::{
    Config, JobOrchestrator, JobSummary, ProviderId, Region, RegionClassifier, ResultStore,
    config::ENV_API_KEYS,
    geocode::geocoder_from_config,
};
use inquire::Password;
use tracing::{info, warn};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "cityweather", version, about = "Batch city weather, partitioned by region")]
pub struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level (RUST_LOG takes precedence).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Add an API key to a provider's credential pool.
    Configure {
        /// Provider short name, e.g. "openweather" or "weatherapi".
        provider: String,
    },

    /// Process a batch of city names as one job.
    Run {
        /// City names; misspellings of known cities are corrected.
        #[arg(required = true)]
        cities: Vec<String>,

        /// Job id; a random UUID when absent.
        #[arg(long)]
        job_id: Option<String>,

        /// Print the summary as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List stored result files for a region.
    Results {
        /// Europe, Asia, America, Africa, Oceania or Unknown.
        region: String,
    },

    /// Print the records stored for one region and job.
    Show { region: String, job_id: String },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let config_path = match self.config {
            Some(path) => path,
            None => Config::config_file_path()?,
        };
        // Environment overrides apply to everything except `configure`,
        // which writes the file back.
        let load = || Config::load_from(&config_path);

        match self.command {
            Command::Configure { provider } => configure(&config_path, &provider),
            Command::Run {
                cities,
                job_id,
                json,
            } => {
                let config = load()?;
                if let Some(id) = unconfigured_default(&config) {
                    warn!(
                        provider = %id,
                        "no API keys for the default provider; run `cityweather configure {id}` or set {ENV_API_KEYS}"
                    );
                }
                let orchestrator = JobOrchestrator::from_config(&config)?;
                let job_id = job_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

                let summary = orchestrator
                    .run(&job_id, cities)
                    .await
                    .with_context(|| format!("Job {job_id} failed"))?;

                if json {
                    println!("{}", serde_json::to_string_pretty(&summary)?);
                } else {
                    print_summary(&summary);
                }
                Ok(())
            }
            Command::Results { region } => {
                let region = Region::try_from(region.as_str())?;
                let files = result_store(&load()?)?.list_region(region).await?;
                if files.is_empty() {
                    println!("No results stored for {region}.");
                }
                for file in files {
                    println!("{file}");
                }
                Ok(())
            }
            Command::Show { region, job_id } => {
                let region = Region::try_from(region.as_str())?;
                let records = result_store(&load()?)?.load(region, &job_id).await?;
                for r in records {
                    let humidity = r
                        .humidity
                        .map(|h| format!(", humidity {h}%"))
                        .unwrap_or_default();
                    let wind = r
                        .wind_speed
                        .map(|w| format!(", wind {w:.1} m/s"))
                        .unwrap_or_default();
                    println!(
                        "{:<16} {:>6.1}°C  {}{humidity}{wind}",
                        r.city, r.temperature, r.description
                    );
                }
                Ok(())
            }
        }
    }
}

fn configure(path: &Path, provider: &str) -> anyhow::Result<()> {
    let id = ProviderId::try_from(provider)?;

    let api_key = Password::new(&format!("API key for {id}:"))
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;

    let config = save_api_key(path, id, &api_key)?;

    info!(provider = %id, keys = config.provider_api_keys(id).len(), "credential pool updated");
    println!(
        "Saved. {id} now has {} key(s); default provider is {}.",
        config.provider_api_keys(id).len(),
        config.default_provider
    );
    Ok(())
}

/// Add a key to the pool stored in the config file. Environment overrides are
/// not applied, so they never leak into the file.
fn save_api_key(path: &Path, id: ProviderId, api_key: &str) -> anyhow::Result<Config> {
    let api_key = api_key.trim();
    if api_key.is_empty() {
        bail!("API key must not be empty");
    }

    let mut config = Config::read_from(path)?;
    config.add_provider_api_key(id, api_key.to_string());
    config.save_to(path)?;
    Ok(config)
}

/// The default provider when its credential pool is empty.
fn unconfigured_default(config: &Config) -> Option<ProviderId> {
    config
        .default_provider_id()
        .ok()
        .filter(|id| !config.is_provider_configured(*id))
}

fn result_store(config: &Config) -> anyhow::Result<ResultStore> {
    let classifier = RegionClassifier::new(geocoder_from_config(config)?);
    Ok(ResultStore::new(&config.results_dir, classifier))
}

fn print_summary(summary: &JobSummary) {
    println!("Job {}: {:?}", summary.job_id, summary.status);
    println!(
        "Processed {} of {} cities",
        summary.processed_cities, summary.total_cities
    );

    if summary.regions.is_empty() {
        println!("No results stored.");
        return;
    }

    let regions: Vec<&str> = summary.regions.iter().map(Region::as_str).collect();
    println!("Regions: {}", regions.join(", "));
    for file in &summary.files {
        println!("  {file}");
    }
}
