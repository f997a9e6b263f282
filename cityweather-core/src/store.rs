//! Region-partitioned persistence of weather results.
//!
//! Layout: `<root>/<Region>/task_<job_id>.json`, one pretty-printed JSON array
//! per region and job. Paths are namespaced by job id so concurrent jobs never
//! write the same file.

use std::{
    collections::BTreeMap,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use futures::{StreamExt, stream};
use tokio::fs;
use tracing::{debug, error, info, warn};

use crate::{
    error::StoreError,
    model::{Region, WeatherRecord},
    region::RegionClassifier,
};

pub type RegionMap = BTreeMap<Region, Vec<WeatherRecord>>;

#[derive(Debug, Default)]
pub struct SaveReport {
    /// Every record grouped by region, whether or not its file was written.
    pub by_region: RegionMap,
    pub written: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ResultStore {
    root: PathBuf,
    classifier: RegionClassifier,
    concurrency: usize,
}

impl ResultStore {
    pub fn new(root: impl Into<PathBuf>, classifier: RegionClassifier) -> Self {
        Self {
            root: root.into(),
            classifier,
            concurrency: 1,
        }
    }

    /// Allow up to `n` region lookups in flight at once.
    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn result_path(&self, region: Region, job_id: &str) -> PathBuf {
        self.root
            .join(region.as_str())
            .join(format!("task_{job_id}.json"))
    }

    pub async fn save(
        &self,
        job_id: &str,
        records: Vec<WeatherRecord>,
    ) -> Result<SaveReport, StoreError> {
        if records.is_empty() {
            warn!(job_id, "no data to save");
            return Ok(SaveReport::default());
        }
        validate_job_id(job_id)?;

        fs::create_dir_all(&self.root)
            .await
            .map_err(|source| StoreError::CreateRoot {
                path: self.root.clone(),
                source,
            })?;

        let by_region = self.group_by_region(records).await;

        let mut written = Vec::with_capacity(by_region.len());
        for (region, entries) in &by_region {
            match self.write_region(*region, job_id, entries).await {
                Ok(path) => written.push(path),
                Err(e) => error!(job_id, %region, error = %e, "error saving results"),
            }
        }

        info!(
            job_id,
            regions = by_region.len(),
            files = written.len(),
            "results saved"
        );
        Ok(SaveReport { by_region, written })
    }

    /// Classifies each record on its own; nothing is cached between records.
    async fn group_by_region(&self, records: Vec<WeatherRecord>) -> RegionMap {
        let classified: Vec<(Region, WeatherRecord)> = stream::iter(records)
            .map(|record| async move {
                let region = self.classifier.classify(&record.city).await;
                (region, record)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut by_region = RegionMap::new();
        for (region, record) in classified {
            by_region.entry(region).or_default().push(record);
        }
        by_region
    }

    async fn write_region(
        &self,
        region: Region,
        job_id: &str,
        entries: &[WeatherRecord],
    ) -> std::io::Result<PathBuf> {
        let path = self.result_path(region, job_id);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await?;
        }

        let json = serde_json::to_string_pretty(entries)?;
        fs::write(&path, json).await?;
        debug!(path = %path.display(), records = entries.len(), "wrote region file");
        Ok(path)
    }

    /// File names stored for a region, sorted. A region never written to is empty.
    pub async fn list_region(&self, region: Region) -> Result<Vec<String>, StoreError> {
        let dir = self.root.join(region.as_str());
        let read_err = |source: std::io::Error| StoreError::Read {
            path: dir.clone(),
            source,
        };

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(read_err(e)),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(read_err)? {
            if let Some(name) = entry.file_name().to_str() {
                files.push(name.to_string());
            }
        }
        files.sort();
        Ok(files)
    }

    pub async fn load(&self, region: Region, job_id: &str) -> Result<Vec<WeatherRecord>, StoreError> {
        validate_job_id(job_id)?;
        let path = self.result_path(region, job_id);

        let contents = fs::read_to_string(&path)
            .await
            .map_err(|source| StoreError::Read {
                path: path.clone(),
                source,
            })?;

        serde_json::from_str(&contents).map_err(|source| StoreError::Decode { path, source })
    }
}

fn validate_job_id(job_id: &str) -> Result<(), StoreError> {
    let bad = job_id.trim().is_empty()
        || job_id.contains(['/', '\\'])
        || job_id.contains("..");
    if bad {
        return Err(StoreError::InvalidJobId(job_id.to_string()));
    }
    Ok(())
}
