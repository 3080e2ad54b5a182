use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use google_cloud_bigquery::{
    client::{Client, ClientConfig},
    http::{
        job::{
            get::GetJobRequest, CreateDisposition, Job, JobConfiguration, JobConfigurationLoad,
            JobReference, JobState, JobType, SchemaUpdateOption, WriteDisposition,
        },
        table::{SourceFormat, TableFieldSchema, TableFieldType, TableReference, TableSchema},
    },
};
use std::{future::Future, sync::Arc, time::Duration};
use tracing::{debug, info, warn};

use super::{LoadOutcome, LoadRequest, Warehouse, SKIP_LEADING_ROWS};
use crate::history::MARKER_PREFIX;
use crate::schema::{Column, ColumnType};
use crate::storage::{object_uri, ObjectStore};

/// Staged load files live inside the marker namespace so writing them never
/// triggers another ingestion.
pub const STAGING_PREFIX: &str = "_staging/";

/// BigQuery load jobs, fed from a CSV staged in GCS.
pub struct BigQueryWarehouse {
    client: Client,
    staging: Arc<dyn ObjectStore>,
    staging_bucket: Option<String>,
    location: Option<String>,
    poll_interval: Duration,
}

impl BigQueryWarehouse {
    /// Authenticate through ADC. Returns the warehouse and the project the
    /// credentials belong to, if they name one.
    pub async fn connect(staging: Arc<dyn ObjectStore>) -> Result<(Self, Option<String>)> {
        let (config, project) = ClientConfig::new_with_auth()
            .await
            .context("authenticating BigQuery client")?;
        let client = Client::new(config)
            .await
            .context("creating BigQuery client")?;
        Ok((
            Self {
                client,
                staging,
                staging_bucket: None,
                location: None,
                poll_interval: Duration::from_secs(1),
            },
            project,
        ))
    }

    pub fn with_staging_bucket(mut self, bucket: Option<String>) -> Self {
        self.staging_bucket = bucket;
        self
    }

    pub fn with_location(mut self, location: Option<String>) -> Self {
        self.location = location;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    async fn run_job(&self, request: &LoadRequest<'_>, source_uri: String) -> Result<String> {
        let job_id = job_id(request.source_name);
        let job = Job {
            job_reference: JobReference {
                project_id: request.table.project.clone(),
                job_id: job_id.clone(),
                location: self.location.clone(),
            },
            configuration: JobConfiguration {
                job: JobType::Load(load_configuration(request, source_uri)),
                ..Default::default()
            },
            ..Default::default()
        };

        self.client
            .job()
            .create(&job)
            .await
            .with_context(|| format!("submitting load job {} for {}", job_id, request.table))?;
        info!(job_id = %job_id, table = %request.table, "load job submitted");

        let get = GetJobRequest {
            location: self.location.clone(),
        };
        loop {
            let current = self
                .client
                .job()
                .get(&request.table.project, &job_id, &get)
                .await
                .with_context(|| format!("polling load job {}", job_id))?;

            if matches!(current.status.state, JobState::Done) {
                if let Some(err) = current.status.error_result {
                    bail!(
                        "load job {} into {} failed: {:?} (errors: {:?})",
                        job_id,
                        request.table,
                        err,
                        current.status.errors
                    );
                }
                return Ok(job_id);
            }
            debug!(job_id = %job_id, "load job still running");
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

fn field_type(ty: ColumnType) -> TableFieldType {
    match ty {
        ColumnType::String => TableFieldType::String,
        ColumnType::Integer => TableFieldType::Integer,
        ColumnType::Float => TableFieldType::Float,
    }
}

fn table_schema(columns: &[Column]) -> TableSchema {
    TableSchema {
        fields: columns
            .iter()
            .map(|c| TableFieldSchema {
                name: c.name.to_string(),
                data_type: field_type(c.ty),
                ..Default::default()
            })
            .collect(),
    }
}

fn load_configuration(request: &LoadRequest<'_>, source_uri: String) -> JobConfigurationLoad {
    JobConfigurationLoad {
        source_uris: vec![source_uri],
        source_format: Some(SourceFormat::Csv),
        destination_table: TableReference {
            project_id: request.table.project.clone(),
            dataset_id: request.table.dataset.clone(),
            table_id: request.table.table.clone(),
        },
        schema: Some(table_schema(request.schema)),
        autodetect: Some(false),
        skip_leading_rows: Some(SKIP_LEADING_ROWS),
        create_disposition: Some(CreateDisposition::CreateIfNeeded),
        write_disposition: Some(WriteDisposition::WriteAppend),
        schema_update_options: Some(vec![SchemaUpdateOption::AllowFieldAddition]),
        ..Default::default()
    }
}

/// Job ids allow `[A-Za-z0-9_-]`; keep a readable slice of the source name.
fn job_id(source_name: &str) -> String {
    let stem: String = source_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .take(64)
        .collect();
    format!("household_ingest_{}_{}", stem, Utc::now().timestamp_micros())
}

fn staging_name(source_name: &str) -> String {
    format!(
        "{}{}{}.{}.csv",
        MARKER_PREFIX,
        STAGING_PREFIX,
        source_name,
        Utc::now().timestamp_micros()
    )
}

/// Upload `data` to `bucket/staged`, run `job` with its `gs://` URI, then
/// delete the staged object whether or not the job succeeded.
async fn with_staged_object<F, Fut>(
    store: &dyn ObjectStore,
    bucket: &str,
    staged: &str,
    data: Vec<u8>,
    job: F,
) -> Result<String>
where
    F: FnOnce(String) -> Fut,
    Fut: Future<Output = Result<String>>,
{
    store
        .upload(bucket, staged, data)
        .await
        .context("staging transformed CSV")?;

    let result = job(object_uri(bucket, staged)).await;

    if let Err(e) = store.delete(bucket, staged).await {
        warn!(object = %object_uri(bucket, staged), error = %e, "failed to delete staged CSV");
    }
    result
}

#[async_trait]
impl Warehouse for BigQueryWarehouse {
    async fn append_csv(&self, request: LoadRequest<'_>) -> Result<LoadOutcome> {
        let bucket = self
            .staging_bucket
            .as_deref()
            .unwrap_or(request.source_bucket);
        let staged = staging_name(request.source_name);

        let data = tokio::fs::read(request.csv_path)
            .await
            .with_context(|| format!("reading {}", request.csv_path.display()))?;
        let job_id = with_staged_object(self.staging.as_ref(), bucket, &staged, data, |uri| {
            self.run_job(&request, uri)
        })
        .await?;
        Ok(LoadOutcome { job_id })
    }
}
