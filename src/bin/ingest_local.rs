//! Run the household pipeline against local directories: transform a single
//! CSV, or ingest an object from a directory-backed bucket into a CSV table.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use household_ingest::{
    config::{DEFAULT_DATASET, DEFAULT_TABLE},
    ingest::{Ingestor, StorageObjectEvent},
    logging,
    process::transform_file,
    storage::LocalStore,
    warehouse::{LocalWarehouse, TableRef},
};
use std::{path::PathBuf, sync::Arc};
use tracing::{info, instrument};

#[derive(Parser, Debug)]
#[command(about = "Local household CSV transform and load")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Transform one CSV onto the canonical layout
    Transform {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Ingest `<root>/<bucket>/<name>` as if it had just been uploaded
    Ingest {
        /// Directory standing in for object storage
        #[arg(long)]
        root: PathBuf,
        #[arg(long)]
        bucket: String,
        #[arg(long)]
        name: String,
        /// Directory holding `<dataset>/<table>.csv`
        #[arg(long)]
        warehouse_dir: PathBuf,
        #[arg(long, env = "GOOGLE_CLOUD_PROJECT", default_value = "local")]
        project: String,
        #[arg(long, env = "BQ_DATASET", default_value = DEFAULT_DATASET)]
        dataset: String,
        #[arg(long, env = "BQ_TABLE", default_value = DEFAULT_TABLE)]
        table: String,
        #[arg(long, env = "SCRATCH_DIR")]
        scratch_dir: Option<PathBuf>,
    },
}

#[instrument(level = "info")]
fn transform(input: PathBuf, output: PathBuf) -> Result<()> {
    let summary = transform_file(&input, &output)
        .with_context(|| format!("transforming {}", input.display()))?;
    info!(
        rows = summary.rows,
        malformed = summary.malformed_values,
        "wrote {}",
        output.display()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init()?;
    let args = Args::parse();

    match args.command {
        Command::Transform { input, output } => {
            tokio::task::spawn_blocking(move || transform(input, output))
                .await
                .context("transform task panicked")??;
        }
        Command::Ingest {
            root,
            bucket,
            name,
            warehouse_dir,
            project,
            dataset,
            table,
            scratch_dir,
        } => {
            let ingestor = Ingestor::new(
                Arc::new(LocalStore::new(root)),
                Arc::new(LocalWarehouse::new(warehouse_dir)),
                TableRef::new(project, dataset, table),
            )
            .with_scratch_dir(scratch_dir);

            let outcome = ingestor
                .handle(&StorageObjectEvent::new(bucket, name))
                .await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
    }
    Ok(())
}
