//! BigQuery REST wire types for `jobs.query` / `jobs.getQueryResults`,
//! and conversion of their `{"f": [{"v": ...}]}` rows into string cells.

use chrono::{DateTime, SecondsFormat};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::result::Column;

/// Body of `POST /projects/{project}/queries`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QueryRequest<'a> {
    pub query: &'a str,
    pub use_legacy_sql: bool,
    pub max_results: u32,
    pub timeout_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<&'a str>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReference {
    pub project_id: String,
    pub job_id: String,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
}

impl FieldSchema {
    fn is_repeated(&self) -> bool {
        self.mode.as_deref() == Some("REPEATED")
    }

    fn is_record(&self) -> bool {
        matches!(self.field_type.as_str(), "RECORD" | "STRUCT")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TableSchema {
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableCell {
    #[serde(default)]
    pub v: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableRow {
    #[serde(default)]
    pub f: Vec<TableCell>,
}

/// Shared shape of `QueryResponse` and `GetQueryResultsResponse`.
/// Numeric counters arrive as JSON strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    #[serde(default)]
    pub schema: Option<TableSchema>,
    #[serde(default)]
    pub job_reference: Option<JobReference>,
    #[serde(default)]
    pub total_rows: Option<String>,
    #[serde(default)]
    pub page_token: Option<String>,
    #[serde(default)]
    pub rows: Vec<TableRow>,
    #[serde(default)]
    pub total_bytes_processed: Option<String>,
    #[serde(default)]
    pub job_complete: bool,
    #[serde(default)]
    pub cache_hit: Option<bool>,
}

impl QueryResponse {
    pub fn total_rows(&self) -> u64 {
        parse_counter(self.total_rows.as_deref())
    }

    pub fn bytes_processed(&self) -> u64 {
        parse_counter(self.total_bytes_processed.as_deref())
    }
}

/// Error envelope returned with non-2xx statuses.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: String,
}

/// Pull `error.message` out of an API error body, or return the body as-is.
pub(crate) fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .ok()
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.to_string())
}

fn parse_counter(value: Option<&str>) -> u64 {
    value.and_then(|v| v.parse().ok()).unwrap_or(0)
}

pub(crate) fn schema_to_columns(schema: &TableSchema) -> Vec<Column> {
    schema
        .fields
        .iter()
        .map(|f| Column {
            name: f.name.clone(),
            data_type: if f.is_repeated() {
                format!("ARRAY<{}>", f.field_type)
            } else {
                f.field_type.clone()
            },
        })
        .collect()
}

/// Convert one REST row into string cells aligned with `schema.fields`.
pub(crate) fn decode_row(schema: &TableSchema, row: &TableRow) -> Vec<Option<String>> {
    schema
        .fields
        .iter()
        .enumerate()
        .map(|(i, field)| {
            let value = row.f.get(i).map(|c| &c.v).unwrap_or(&Value::Null);
            decode_cell(field, value)
        })
        .collect()
}

/// Scalars come back as strings already. TIMESTAMP is epoch seconds in
/// float notation ("1.6742592E9") and is rendered as RFC 3339 in UTC.
/// Nested and repeated values are rendered as compact JSON.
pub(crate) fn decode_cell(field: &FieldSchema, value: &Value) -> Option<String> {
    if value.is_null() {
        return None;
    }
    if field.is_repeated() || field.is_record() {
        return Some(nested_to_json(field, value).to_string());
    }
    match value {
        Value::String(s) if field.field_type == "TIMESTAMP" => Some(
            epoch_seconds_to_rfc3339(s).unwrap_or_else(|| s.clone()),
        ),
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn nested_to_json(field: &FieldSchema, value: &Value) -> Value {
    if field.is_repeated() {
        let items = value.as_array().cloned().unwrap_or_default();
        let element = FieldSchema { mode: None, ..field.clone() };
        return Value::Array(
            items
                .iter()
                .map(|item| nested_to_json(&element, item.get("v").unwrap_or(&Value::Null)))
                .collect(),
        );
    }
    if field.is_record() {
        let cells = value
            .get("f")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let mut obj = serde_json::Map::new();
        for (sub, cell) in field.fields.iter().zip(cells.iter()) {
            let v = cell.get("v").unwrap_or(&Value::Null);
            obj.insert(sub.name.clone(), nested_to_json(sub, v));
        }
        return Value::Object(obj);
    }
    match (field.field_type.as_str(), value) {
        ("TIMESTAMP", Value::String(s)) => {
            Value::String(epoch_seconds_to_rfc3339(s).unwrap_or_else(|| s.clone()))
        }
        _ => value.clone(),
    }
}

fn epoch_seconds_to_rfc3339(raw: &str) -> Option<String> {
    let secs: f64 = raw.parse().ok()?;
    let micros = (secs * 1_000_000.0).round() as i64;
    let dt = DateTime::from_timestamp_micros(micros)?;
    Some(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}
