use serde::{Deserialize, Serialize};

/// Column definition returned by a warehouse query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name as declared in the result schema.
    pub name: String,
    /// BigQuery type name (e.g. "STRING", "INTEGER", "FLOAT", "TIMESTAMP", "RECORD").
    pub data_type: String,
}

/// Job metadata for a completed query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryMetadata {
    /// BigQuery job id.
    pub job_id: String,
    /// Location the job ran in, when reported.
    pub location: Option<String>,
    /// Row count reported by the warehouse.
    pub total_rows: u64,
    /// Bytes billed against the on-demand quota.
    pub bytes_processed: u64,
    /// Whether the result came from the query cache.
    pub cache_hit: bool,
    /// Wall-clock time from submission to the last page, in milliseconds.
    pub elapsed_ms: u64,
}

/// Tabular result of one query.
///
/// Rows are stored as `Vec<Option<String>>` where `None` represents SQL NULL.
/// Column ordering in each row matches the `columns` vector; row order is
/// the order the warehouse returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultTable {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Option<String>>>,
    pub metadata: QueryMetadata,
}

impl ResultTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Finds the zero-based index of a column by name (case-sensitive).
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Returns `None` if the row index is out of bounds, the column name
    /// does not exist, or the cell value is SQL NULL.
    pub fn get_value(&self, row: usize, col: &str) -> Option<&str> {
        let col_idx = self.column_index(col)?;
        let row_data = self.rows.get(row)?;
        row_data.get(col_idx)?.as_deref()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result() -> ResultTable {
        ResultTable {
            columns: vec![
                Column { name: "course_title".into(), data_type: "STRING".into() },
                Column { name: "avg_rating".into(), data_type: "FLOAT".into() },
                Column { name: "num_ratings".into(), data_type: "INTEGER".into() },
            ],
            rows: vec![
                vec![Some("Intro to SQL".into()), Some("4.9".into()), Some("120".into())],
                vec![Some("Statistics".into()), None, Some("0".into())],
            ],
            metadata: QueryMetadata {
                job_id: "job_abc123".into(),
                location: Some("US".into()),
                total_rows: 2,
                bytes_processed: 4096,
                cache_hit: false,
                elapsed_ms: 840,
            },
        }
    }

    #[test]
    fn accessors() {
        let r = sample_result();
        assert_eq!(r.row_count(), 2);
        assert_eq!(r.column_names(), vec!["course_title", "avg_rating", "num_ratings"]);
        assert_eq!(r.column_index("num_ratings"), Some(2));
        assert_eq!(r.column_index("missing"), None);
    }

    #[test]
    fn get_value_handles_null_and_bounds() {
        let r = sample_result();
        assert_eq!(r.get_value(0, "course_title"), Some("Intro to SQL"));
        assert_eq!(r.get_value(1, "avg_rating"), None);
        assert_eq!(r.get_value(5, "course_title"), None);
        assert_eq!(r.get_value(0, "nope"), None);
    }
}
