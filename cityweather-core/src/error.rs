use std::path::PathBuf;

use thiserror::Error;

/// Failure talking to a weather or geocoding provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("failed to parse provider response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("provider response is missing `{0}`")]
    MissingField(&'static str),
}

impl ProviderError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProviderError::Http(e) if e.is_timeout())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid job id '{0}'")]
    InvalidJobId(String),

    #[error("failed to create results directory {path}: {source}")]
    CreateRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A failure that ends a whole job. Per-city problems never produce one.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("job id must not be empty")]
    EmptyJobId,

    #[error(transparent)]
    Store(#[from] StoreError),
}
