//! Public API for writing query results as CSV.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use arrow::csv::WriterBuilder;
use arrow::record_batch::RecordBatch;
use tracing::debug;

use crate::result::ResultTable;
use super::builders::build_arrays;
use super::error::CsvError;
use super::schema::build_schema;

/// RFC 3339 in UTC; the fraction has 0, 3, 6 or 9 digits as needed.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

/// Convert a [`ResultTable`] into an Arrow [`RecordBatch`].
pub fn result_to_record_batch(result: &ResultTable) -> Result<RecordBatch, CsvError> {
    let schema = Arc::new(build_schema(&result.columns));
    let arrays = build_arrays(&result.rows, &schema)?;
    let batch = RecordBatch::try_new(schema, arrays)?;
    Ok(batch)
}

/// Encode the table as CSV (header row + one line per row) into `sink`.
/// A table with no columns produces no output at all.
fn encode<W: Write>(result: &ResultTable, sink: W) -> Result<(W, u64), CsvError> {
    if result.columns.is_empty() {
        return Ok((sink, 0));
    }

    let batch = result_to_record_batch(result)?;
    let row_count = batch.num_rows() as u64;

    let mut writer = WriterBuilder::new()
        .with_header(true)
        .with_timestamp_tz_format(TIMESTAMP_FORMAT.to_string())
        .build(sink);
    writer.write(&batch)?;
    Ok((writer.into_inner(), row_count))
}

/// Write a [`ResultTable`] to a CSV file at the given path.
///
/// The whole table is encoded before the file is touched, so a conversion
/// error leaves any previous output in place. An existing file is replaced,
/// never appended to. Missing parent directories are created. Returns the
/// number of data rows written.
pub fn write_csv(result: &ResultTable, path: &Path) -> Result<u64, CsvError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let (buf, row_count) = encode(result, Vec::new())?;
    std::fs::write(path, &buf)?;

    debug!(
        path = %path.display(),
        rows = row_count,
        job_id = %result.metadata.job_id,
        "Wrote CSV file"
    );

    Ok(row_count)
}

/// Render a [`ResultTable`] as CSV bytes in memory.
pub fn write_csv_bytes(result: &ResultTable) -> Result<Vec<u8>, CsvError> {
    let (buf, _) = encode(result, Vec::new())?;
    Ok(buf)
}
