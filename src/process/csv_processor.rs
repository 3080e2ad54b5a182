use anyhow::{Context, Result};
use csv::{ReaderBuilder, WriterBuilder};
use std::{
    fs::File,
    io::{Read, Write},
    path::Path,
};
use tracing::{debug, warn};

use crate::process::transform::{transform_record_counted, RawRecord, TransformedRecord};
use crate::schema::household::column_names;

/// Totals gathered while transforming one file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformSummary {
    pub rows: u64,
    /// Numeric cells that were present but unparseable (loaded as 0).
    pub malformed_values: u64,
}

/// Parse a header-driven CSV into raw records, preserving row order.
///
/// Short rows leave their trailing columns absent; cells beyond the header
/// are ignored.
pub fn read_raw_records<R: Read>(reader: R) -> Result<Vec<RawRecord>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers().context("reading CSV header")?.clone();
    let mut records = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("CSV parse error at record {}", idx))?;
        if record.len() != headers.len() {
            debug!(
                record = idx,
                fields = record.len(),
                headers = headers.len(),
                "row width differs from header"
            );
        }
        let raw: RawRecord = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.to_string(), v.to_string()))
            .collect();
        records.push(raw);
    }
    Ok(records)
}

/// Read a raw CSV and transform every row onto the canonical schema.
pub fn transform_csv<R: Read>(reader: R) -> Result<(Vec<TransformedRecord>, TransformSummary)> {
    let raw = read_raw_records(reader)?;
    let mut summary = TransformSummary::default();
    let mut out = Vec::with_capacity(raw.len());
    for row in &raw {
        let (record, malformed) = transform_record_counted(row);
        summary.rows += 1;
        summary.malformed_values += malformed as u64;
        out.push(record);
    }
    Ok((out, summary))
}

/// Write records with the canonical header, columns in schema order.
pub fn write_canonical_csv<W: Write>(writer: W, records: &[TransformedRecord]) -> Result<()> {
    let mut wtr = WriterBuilder::new().from_writer(writer);
    wtr.write_record(column_names())
        .context("writing canonical header")?;
    for (idx, record) in records.iter().enumerate() {
        wtr.write_record(record.to_row())
            .with_context(|| format!("writing transformed record {}", idx))?;
    }
    wtr.flush().context("flushing transformed CSV")?;
    Ok(())
}

/// Transform the CSV at `input` into a canonical CSV at `output`.
pub fn transform_file(input: &Path, output: &Path) -> Result<TransformSummary> {
    let src =
        File::open(input).with_context(|| format!("opening raw CSV {}", input.display()))?;
    let (records, summary) =
        transform_csv(src).with_context(|| format!("transforming {}", input.display()))?;

    let dst = File::create(output)
        .with_context(|| format!("creating transformed CSV {}", output.display()))?;
    write_canonical_csv(dst, &records)
        .with_context(|| format!("writing {}", output.display()))?;

    if summary.malformed_values > 0 {
        warn!(
            file = %input.display(),
            malformed = summary.malformed_values,
            "unparseable numeric values loaded as 0"
        );
    }
    debug!(rows = summary.rows, "transformed {}", input.display());
    Ok(summary)
}
