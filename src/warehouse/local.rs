use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::{
    fs::{self, File, OpenOptions},
    path::{Path, PathBuf},
};
use tracing::info;

use super::{LoadOutcome, LoadRequest, TableRef, Warehouse, SKIP_LEADING_ROWS};
use crate::schema::Column;

/// A warehouse whose tables are CSV files at `<root>/<dataset>/<table>.csv`.
///
/// Loads follow the same rules as the real one: append only, declared
/// schema, new trailing columns may be added, existing ones never change.
#[derive(Debug, Clone)]
pub struct LocalWarehouse {
    root: PathBuf,
}

impl LocalWarehouse {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn table_path(&self, table: &TableRef) -> PathBuf {
        self.root
            .join(&table.dataset)
            .join(format!("{}.csv", table.table))
    }
}

fn read_csv(path: &Path) -> Result<(StringRecord, Vec<StringRecord>)> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let mut header = StringRecord::new();
    let mut rows = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("reading {} record {}", path.display(), idx))?;
        if (idx as i64) < SKIP_LEADING_ROWS {
            header = record;
        } else {
            rows.push(record);
        }
    }
    Ok((header, rows))
}

/// Check the table's existing columns against the declared schema. Returns
/// the number of columns being added.
fn reconcile(existing: &StringRecord, schema: &[Column]) -> Result<usize> {
    if existing.len() > schema.len() {
        bail!(
            "declared schema has {} columns but table has {}; columns cannot be removed",
            schema.len(),
            existing.len()
        );
    }
    for (idx, (have, want)) in existing.iter().zip(schema.iter()).enumerate() {
        if have != want.name {
            bail!(
                "column {} is {:?} in the table but {:?} in the declared schema",
                idx,
                have,
                want.name
            );
        }
    }
    Ok(schema.len() - existing.len())
}

fn append_rows(path: &Path, schema: &[Column], rows: &[StringRecord]) -> Result<()> {
    let header: Vec<&str> = schema.iter().map(|c| c.name).collect();

    if path.exists() {
        let (existing, old_rows) = read_csv(path)?;
        let added = reconcile(&existing, schema)?;
        if added > 0 {
            // Rewrite with the widened header; old rows get empty new cells.
            let tmp = path.with_extension("csv.tmp");
            {
                let mut wtr = WriterBuilder::new().from_path(&tmp)?;
                wtr.write_record(&header)?;
                for row in &old_rows {
                    let mut widened: Vec<&str> = row.iter().collect();
                    widened.resize(header.len(), "");
                    wtr.write_record(&widened)?;
                }
                wtr.flush()?;
            }
            fs::rename(&tmp, path)
                .with_context(|| format!("replacing {}", path.display()))?;
            info!(table = %path.display(), added, "added columns");
        }
        let file = OpenOptions::new()
            .append(true)
            .open(path)
            .with_context(|| format!("opening {} for append", path.display()))?;
        let mut wtr = WriterBuilder::new().from_writer(file);
        for row in rows {
            wtr.write_record(row)?;
        }
        wtr.flush()?;
    } else {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file =
            File::create(path).with_context(|| format!("creating {}", path.display()))?;
        let mut wtr = WriterBuilder::new().from_writer(file);
        wtr.write_record(&header)?;
        for row in rows {
            wtr.write_record(row)?;
        }
        wtr.flush()?;
    }
    Ok(())
}

#[async_trait]
impl Warehouse for LocalWarehouse {
    async fn append_csv(&self, request: LoadRequest<'_>) -> Result<LoadOutcome> {
        let (header, rows) = read_csv(request.csv_path)?;
        let declared: Vec<&str> = request.schema.iter().map(|c| c.name).collect();
        let submitted: Vec<&str> = header.iter().collect();
        if submitted != declared {
            bail!(
                "load file header does not match the declared schema ({} vs {} columns)",
                submitted.len(),
                declared.len()
            );
        }
        if let Some((idx, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, r)| r.len() != declared.len())
        {
            bail!(
                "load file row {} has {} fields, expected {}",
                idx + 1,
                row.len(),
                declared.len()
            );
        }

        let path = self.table_path(request.table);
        let schema = request.schema.to_vec();
        let count = rows.len();
        let target = path.clone();
        tokio::task::spawn_blocking(move || append_rows(&target, &schema, &rows))
            .await
            .context("local load task panicked")?
            .with_context(|| format!("appending to {}", request.table))?;

        let job_id = format!("local_{}", Utc::now().timestamp_micros());
        info!(job_id = %job_id, rows = count, table = %path.display(), "local load complete");
        Ok(LoadOutcome { job_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnType;
    use tempfile::tempdir;

    const NARROW: [Column; 2] = [
        Column::new("a", ColumnType::String),
        Column::new("b", ColumnType::Float),
    ];
    const WIDE: [Column; 3] = [
        Column::new("a", ColumnType::String),
        Column::new("b", ColumnType::Float),
        Column::new("c", ColumnType::Float),
    ];

    async fn load(
        wh: &LocalWarehouse,
        table: &TableRef,
        schema: &[Column],
        dir: &Path,
        body: &str,
    ) -> Result<LoadOutcome> {
        let csv_path = dir.join("load.csv");
        fs::write(&csv_path, body)?;
        wh.append_csv(LoadRequest {
            table,
            schema,
            csv_path: &csv_path,
            source_bucket: "b",
            source_name: "src.csv",
        })
        .await
    }

    #[tokio::test]
    async fn appends_across_loads() -> Result<()> {
        let dir = tempdir()?;
        let wh = LocalWarehouse::new(dir.path().join("wh"));
        let table = TableRef::new("p", "household", "household_data");

        load(&wh, &table, &NARROW, dir.path(), "a,b\nx,1\n").await?;
        load(&wh, &table, &NARROW, dir.path(), "a,b\ny,2\n").await?;

        let text = fs::read_to_string(wh.table_path(&table))?;
        assert_eq!(text, "a,b\nx,1\ny,2\n");
        Ok(())
    }

    #[tokio::test]
    async fn allows_field_addition() -> Result<()> {
        let dir = tempdir()?;
        let wh = LocalWarehouse::new(dir.path().join("wh"));
        let table = TableRef::new("p", "d", "t");

        load(&wh, &table, &NARROW, dir.path(), "a,b\nx,1\n").await?;
        load(&wh, &table, &WIDE, dir.path(), "a,b,c\ny,2,3\n").await?;

        let text = fs::read_to_string(wh.table_path(&table))?;
        assert_eq!(text, "a,b,c\nx,1,\ny,2,3\n");
        Ok(())
    }

    #[tokio::test]
    async fn refuses_to_drop_columns() -> Result<()> {
        let dir = tempdir()?;
        let wh = LocalWarehouse::new(dir.path().join("wh"));
        let table = TableRef::new("p", "d", "t");

        load(&wh, &table, &WIDE, dir.path(), "a,b,c\nx,1,2\n").await?;
        let err = load(&wh, &table, &NARROW, dir.path(), "a,b\ny,2\n").await;
        assert!(err.is_err());

        let text = fs::read_to_string(wh.table_path(&table))?;
        assert_eq!(text, "a,b,c\nx,1,2\n");
        Ok(())
    }

    #[tokio::test]
    async fn rejects_header_mismatch_without_writing() -> Result<()> {
        let dir = tempdir()?;
        let wh = LocalWarehouse::new(dir.path().join("wh"));
        let table = TableRef::new("p", "d", "t");

        assert!(load(&wh, &table, &NARROW, dir.path(), "b,a\nx,1\n").await.is_err());
        assert!(!wh.table_path(&table).exists());
        Ok(())
    }
}
