// src/history/mod.rs

//! Durable "already ingested" records, kept as marker objects next to the
//! source files: `processed/<name>.done`.
//!
//! The existence check and the marker write are separate calls, so two
//! overlapping invocations for the same name can both pass [`check`]. The
//! marker write itself is create-only.

use anyhow::{Context, Result};
use tracing::info;

use crate::process::utils::has_csv_extension;
use crate::storage::ObjectStore;

pub mod state;

pub use state::SkipReason;

/// Namespace for markers. Objects under it never trigger ingestion.
pub const MARKER_PREFIX: &str = "processed/";
pub const MARKER_SUFFIX: &str = ".done";
pub const MARKER_CONTENT: &[u8] = b"processed";

pub fn marker_path(name: &str) -> String {
    format!("{}{}{}", MARKER_PREFIX, name, MARKER_SUFFIX)
}

pub fn in_marker_namespace(name: &str) -> bool {
    name.starts_with(MARKER_PREFIX)
}

/// The I/O-free part of the guard: marker namespace, then extension.
pub fn precheck(name: &str) -> Option<SkipReason> {
    if in_marker_namespace(name) {
        Some(SkipReason::MarkerNamespace)
    } else if !has_csv_extension(name) {
        Some(SkipReason::NotCsv)
    } else {
        None
    }
}

/// Run all three guard checks in order. `None` means the file should be ingested.
pub async fn check(store: &dyn ObjectStore, bucket: &str, name: &str) -> Result<Option<SkipReason>> {
    if let Some(reason) = precheck(name) {
        return Ok(Some(reason));
    }
    let marker = marker_path(name);
    let processed = store
        .exists(bucket, &marker)
        .await
        .with_context(|| format!("looking up marker {}", marker))?;
    Ok(processed.then_some(SkipReason::AlreadyProcessed))
}

/// Write the marker for `name`. Returns `false` if another invocation had
/// already written it.
pub async fn record_processed(store: &dyn ObjectStore, bucket: &str, name: &str) -> Result<bool> {
    let marker = marker_path(name);
    let created = store
        .create(bucket, &marker, MARKER_CONTENT.to_vec())
        .await
        .with_context(|| format!("writing marker {}", marker))?;
    if created {
        info!(bucket, marker = %marker, "marker created");
    }
    Ok(created)
}
