//! Build typed Arrow arrays from string-based result rows.

use std::sync::Arc;

use arrow::array::{
    ArrayRef, BooleanBuilder, Float64Builder, Int64Builder, StringBuilder,
    TimestampMicrosecondBuilder,
};
use arrow::datatypes::{DataType, Schema, TimeUnit};

use super::error::CsvError;
use super::schema::TIMESTAMP_TZ;

/// Build typed Arrow arrays from the string rows.
///
/// For each column we inspect the target Arrow type and parse the string
/// values into that native type. Unparseable values become NULL.
pub(crate) fn build_arrays(
    rows: &[Vec<Option<String>>],
    schema: &Schema,
) -> Result<Vec<ArrayRef>, CsvError> {
    let num_rows = rows.len();
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());

    for (col_idx, field) in schema.fields().iter().enumerate() {
        let cells = rows.iter().map(|row| row.get(col_idx).and_then(|v| v.as_deref()));

        let array: ArrayRef = match field.data_type() {
            DataType::Int64 => {
                let mut builder = Int64Builder::with_capacity(num_rows);
                for cell in cells {
                    builder.append_option(cell.and_then(|s| s.parse::<i64>().ok()));
                }
                Arc::new(builder.finish())
            }
            DataType::Float64 => {
                let mut builder = Float64Builder::with_capacity(num_rows);
                for cell in cells {
                    builder.append_option(cell.and_then(|s| s.parse::<f64>().ok()));
                }
                Arc::new(builder.finish())
            }
            DataType::Boolean => {
                let mut builder = BooleanBuilder::with_capacity(num_rows);
                for cell in cells {
                    builder.append_option(cell.and_then(parse_bool));
                }
                Arc::new(builder.finish())
            }
            DataType::Timestamp(TimeUnit::Microsecond, _) => {
                let mut builder = TimestampMicrosecondBuilder::with_capacity(num_rows);
                for cell in cells {
                    builder.append_option(cell.and_then(parse_timestamp_us));
                }
                Arc::new(builder.finish().with_timezone(TIMESTAMP_TZ))
            }
            _ => {
                let mut builder = StringBuilder::with_capacity(num_rows, num_rows * 32);
                for cell in cells {
                    builder.append_option(cell);
                }
                Arc::new(builder.finish())
            }
        };

        arrays.push(array);
    }

    Ok(arrays)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// Parse a timestamp string into epoch microseconds.
///
/// 1. RFC 3339: `2025-06-14T10:30:00Z`
/// 2. Space-separated: `2025-06-14 10:30:00` (optionally with fraction)
/// 3. Date only: `2025-06-14` (midnight UTC)
pub(crate) fn parse_timestamp_us(value: &str) -> Option<i64> {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc).timestamp_micros());
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(ndt.and_utc().timestamp_micros());
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(ndt.and_utc().timestamp_micros());
    }
    if let Ok(nd) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(nd.and_hms_opt(0, 0, 0)?.and_utc().timestamp_micros());
    }
    None
}
