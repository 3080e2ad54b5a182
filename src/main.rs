use anyhow::{Context, Result};
use household_ingest::{
    config::IngestConfig,
    ingest::Ingestor,
    logging,
    service::{self, SERVICE_NAME},
    storage::{GcsStore, ObjectStore},
    warehouse::BigQueryWarehouse,
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) logging and config ──────────────────────────────────────
    logging::init()?;
    let config = IngestConfig::from_env()?;
    info!(service = SERVICE_NAME, ?config, "startup");

    // ─── 2) cloud clients (ADC) ─────────────────────────────────────
    let store: Arc<dyn ObjectStore> = Arc::new(GcsStore::connect().await?);
    let (warehouse, credential_project) = BigQueryWarehouse::connect(store.clone()).await?;
    let project = config
        .project
        .clone()
        .or(credential_project)
        .context("no project: set GOOGLE_CLOUD_PROJECT or use project-scoped credentials")?;
    let warehouse = warehouse
        .with_staging_bucket(config.staging_bucket.clone())
        .with_location(config.location.clone())
        .with_poll_interval(config.poll_interval);

    let table = config.table_ref(project);
    info!(table = %table, "destination table");
    let ingestor = Ingestor::new(store, Arc::new(warehouse), table)
        .with_scratch_dir(config.scratch_dir.clone());

    // ─── 3) serve ───────────────────────────────────────────────────
    let routes = service::routes(Arc::new(ingestor));
    info!("Server starting on port {}", config.port);
    info!("Health check: http://localhost:{}/health", config.port);
    warp::serve(routes).run(([0, 0, 0, 0], config.port)).await;

    Ok(())
}
