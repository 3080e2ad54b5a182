// src/warehouse/mod.rs

use anyhow::Result;
use async_trait::async_trait;
use std::{fmt, path::Path};

use crate::schema::Column;

pub mod bigquery;
pub mod local;

pub use bigquery::BigQueryWarehouse;
pub use local::LocalWarehouse;

/// Header rows the load job skips in the submitted CSV.
pub const SKIP_LEADING_ROWS: i64 = 1;

/// Fully qualified destination table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub project: String,
    pub dataset: String,
    pub table: String,
}

impl TableRef {
    pub fn new(
        project: impl Into<String>,
        dataset: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            dataset: dataset.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}

/// One append-only load of a header-prefixed CSV file.
///
/// The job runs against the declared `schema` (no autodetection), may add
/// columns the table lacks, and never drops or retypes existing ones.
#[derive(Debug, Clone, Copy)]
pub struct LoadRequest<'a> {
    pub table: &'a TableRef,
    pub schema: &'a [Column],
    pub csv_path: &'a Path,
    /// Bucket and object that triggered the load.
    pub source_bucket: &'a str,
    pub source_name: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutcome {
    pub job_id: String,
}

#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Submit the load and wait for it to finish. An `Err` means nothing
    /// should be considered loaded.
    async fn append_csv(&self, request: LoadRequest<'_>) -> Result<LoadOutcome>;
}
