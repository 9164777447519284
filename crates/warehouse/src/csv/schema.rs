//! BigQuery type to Arrow type mapping and schema construction.

use arrow::datatypes::{DataType, Field, Schema, TimeUnit};

use crate::result::Column;

/// Zone attached to TIMESTAMP columns. An offset rather than "UTC" so the
/// CSV writer can format it without a timezone database.
pub(crate) const TIMESTAMP_TZ: &str = "+00:00";

/// Map a BigQuery type name to an Arrow DataType.
///
/// NUMERIC/BIGNUMERIC stay as text so exact decimals are not rounded
/// through f64. Types are documented at:
/// <https://cloud.google.com/bigquery/docs/reference/standard-sql/data-types>
pub(crate) fn bigquery_type_to_arrow(bq_type: &str) -> DataType {
    match bq_type.to_uppercase().as_str() {
        "INTEGER" | "INT64" => DataType::Int64,

        "FLOAT" | "FLOAT64" => DataType::Float64,

        "BOOLEAN" | "BOOL" => DataType::Boolean,

        // BigQuery keeps microseconds.
        "TIMESTAMP" => DataType::Timestamp(TimeUnit::Microsecond, Some(TIMESTAMP_TZ.into())),

        // STRING, NUMERIC, DATE, DATETIME, TIME, BYTES, JSON, ARRAY<..>, RECORD
        _ => DataType::Utf8,
    }
}

/// Build an Arrow [`Schema`] from result columns.
pub(crate) fn build_schema(columns: &[Column]) -> Schema {
    let fields: Vec<Field> = columns
        .iter()
        .map(|col| Field::new(&col.name, bigquery_type_to_arrow(&col.data_type), true))
        .collect();
    Schema::new(fields)
}
