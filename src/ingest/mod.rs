// src/ingest/mod.rs

//! The transform-and-load handler: guard, download, transform, load, mark.

use anyhow::{Context, Result};
use serde::Serialize;
use std::{
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};
use tempfile::{Builder, NamedTempFile};
use tokio::time::Instant;
use tracing::{info, instrument, warn};

use crate::history::{self, SkipReason};
use crate::process::{transform_file, TransformSummary};
use crate::schema::SCHEMA;
use crate::storage::{object_uri, ObjectStore};
use crate::warehouse::{LoadRequest, TableRef, Warehouse};

pub mod event;

pub use event::{parse_event, StorageObjectEvent};

/// What one invocation did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Skipped {
        reason: SkipReason,
    },
    Loaded {
        rows: u64,
        malformed_values: u64,
        job_id: String,
        marker: String,
        /// False when a concurrent invocation wrote the marker first.
        marker_created: bool,
    },
}

pub struct Ingestor {
    store: Arc<dyn ObjectStore>,
    warehouse: Arc<dyn Warehouse>,
    table: TableRef,
    scratch_dir: Option<PathBuf>,
}

impl Ingestor {
    pub fn new(store: Arc<dyn ObjectStore>, warehouse: Arc<dyn Warehouse>, table: TableRef) -> Self {
        Self {
            store,
            warehouse,
            table,
            scratch_dir: None,
        }
    }

    /// Where scratch CSVs are created; the system temp dir by default.
    pub fn with_scratch_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.scratch_dir = dir;
        self
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    /// Run the full pipeline for one uploaded object.
    #[instrument(
        level = "info",
        skip(self, event),
        fields(bucket = %event.bucket, name = %event.name, generation = %event.generation_or_unknown())
    )]
    pub async fn handle(&self, event: &StorageObjectEvent) -> Result<Outcome> {
        let bucket = event.bucket.as_str();
        let name = event.name.as_str();

        if let Some(reason) = history::check(self.store.as_ref(), bucket, name).await? {
            match reason {
                SkipReason::MarkerNamespace => info!(reason = %reason, "skipping marker-namespace object"),
                SkipReason::NotCsv => info!(reason = %reason, "skipping non-CSV file"),
                SkipReason::AlreadyProcessed => info!(reason = %reason, "skipping, already processed"),
            }
            return Ok(Outcome::Skipped { reason });
        }
        info!("triggered by upload of {}", object_uri(bucket, name));
        let start = Instant::now();

        let data = self.store.download(bucket, name).await?;
        info!(bytes = data.len(), "downloaded");

        let scratch = self.scratch_dir.clone();
        let (transformed, summary) =
            tokio::task::spawn_blocking(move || stage_and_transform(&data, scratch.as_deref()))
                .await
                .context("transform task panicked")?
                .with_context(|| format!("transforming {}", object_uri(bucket, name)))?;
        info!(rows = summary.rows, "transformation complete, loading into {}", self.table);

        let loaded = self
            .warehouse
            .append_csv(LoadRequest {
                table: &self.table,
                schema: &SCHEMA,
                csv_path: transformed.path(),
                source_bucket: bucket,
                source_name: name,
            })
            .await
            .with_context(|| format!("loading {} into {}", name, self.table))?;
        info!(job_id = %loaded.job_id, "data loaded into {}", self.table);

        // Only reached after a successful load.
        let marker = history::marker_path(name);
        let marker_created = history::record_processed(self.store.as_ref(), bucket, name).await?;
        if !marker_created {
            warn!(marker = %marker, "marker already present; a concurrent invocation loaded this file too");
        }

        info!(elapsed = ?start.elapsed(), "processing complete");
        Ok(Outcome::Loaded {
            rows: summary.rows,
            malformed_values: summary.malformed_values,
            job_id: loaded.job_id,
            marker,
            marker_created,
        })
    }
}

fn scratch_file(dir: Option<&Path>, prefix: &str) -> Result<NamedTempFile> {
    let mut builder = Builder::new();
    builder.prefix(prefix).suffix(".csv");
    match dir {
        Some(d) => builder.tempfile_in(d),
        None => builder.tempfile(),
    }
    .context("creating scratch file")
}

/// Write the raw bytes to a scratch file and transform it into a second
/// one. The raw file is removed on return; the transformed one when the
/// returned handle drops.
fn stage_and_transform(
    data: &[u8],
    dir: Option<&Path>,
) -> Result<(NamedTempFile, TransformSummary)> {
    let mut raw = scratch_file(dir, "household-raw-")?;
    raw.write_all(data).context("writing downloaded CSV")?;
    raw.flush()?;

    let transformed = scratch_file(dir, "household-load-")?;
    let summary = transform_file(raw.path(), transformed.path())?;
    Ok((transformed, summary))
}
