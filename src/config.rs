use anyhow::{Context, Result};
use std::{env, path::PathBuf, time::Duration};

use crate::warehouse::TableRef;

pub const DEFAULT_DATASET: &str = "household";
pub const DEFAULT_TABLE: &str = "household_data";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Service settings, read once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestConfig {
    /// Falls back to the project named by the credentials when unset.
    pub project: Option<String>,
    pub dataset: String,
    pub table: String,
    pub location: Option<String>,
    pub staging_bucket: Option<String>,
    pub poll_interval: Duration,
    pub scratch_dir: Option<PathBuf>,
    pub port: u16,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            project: None,
            dataset: DEFAULT_DATASET.to_string(),
            table: DEFAULT_TABLE.to_string(),
            location: None,
            staging_bucket: None,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            scratch_dir: None,
            port: DEFAULT_PORT,
        }
    }
}

impl IngestConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let poll_interval = match get("LOAD_POLL_INTERVAL_MS") {
            Some(ms) => Duration::from_millis(
                ms.trim()
                    .parse()
                    .with_context(|| format!("LOAD_POLL_INTERVAL_MS={:?} is not a number", ms))?,
            ),
            None => defaults.poll_interval,
        };
        let port = match get("PORT") {
            Some(p) => p
                .trim()
                .parse()
                .with_context(|| format!("PORT={:?} is not a valid port", p))?,
            None => defaults.port,
        };

        Ok(Self {
            project: get("GOOGLE_CLOUD_PROJECT"),
            dataset: get("BQ_DATASET").unwrap_or(defaults.dataset),
            table: get("BQ_TABLE").unwrap_or(defaults.table),
            location: get("BQ_LOCATION"),
            staging_bucket: get("STAGING_BUCKET"),
            poll_interval,
            scratch_dir: get("SCRATCH_DIR").map(PathBuf::from),
            port,
        })
    }

    pub fn table_ref(&self, project: impl Into<String>) -> TableRef {
        TableRef::new(project, self.dataset.clone(), self.table.clone())
    }
}
