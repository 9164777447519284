use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::client::{QueryRunner, WarehouseError};
use crate::csv::{write_csv, CsvError};
use crate::result::ResultTable;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ExportStepError {
    #[error("export '{name}': query failed: {source}")]
    Query {
        name: String,
        #[source]
        source: WarehouseError,
    },

    #[error("export '{name}': failed to write {}: {source}", path.display())]
    Write {
        name: String,
        path: PathBuf,
        #[source]
        source: CsvError,
    },
}

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

/// One fixed query and the CSV file its result is written to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportStep {
    /// Short identifier used on the command line and in logs.
    pub name: String,
    /// File name (not path) of the CSV, also used as the uploaded name.
    pub file_name: String,
    pub sql: String,
}

/// What a materialized step left on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutput {
    pub name: String,
    pub path: PathBuf,
    pub rows: u64,
    pub bytes: u64,
    pub job_id: String,
}

impl ExportStep {
    pub fn new(name: impl Into<String>, file_name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file_name: file_name.into(),
            sql: sql.into(),
        }
    }

    pub fn output_path(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(&self.file_name)
    }

    /// Run the query and return the raw result.
    pub async fn execute(&self, runner: &dyn QueryRunner) -> Result<ResultTable, WarehouseError> {
        runner.run_query(&self.sql).await
    }

    /// Run the query and write its result to `output_dir/file_name`.
    ///
    /// Nothing is written when the query fails.
    pub async fn materialize(
        &self,
        runner: &dyn QueryRunner,
        output_dir: &Path,
    ) -> Result<StepOutput, ExportStepError> {
        let result = self.execute(runner).await.map_err(|source| ExportStepError::Query {
            name: self.name.clone(),
            source,
        })?;

        let path = self.output_path(output_dir);
        let write_err = |source: CsvError| ExportStepError::Write {
            name: self.name.clone(),
            path: path.clone(),
            source,
        };
        let rows = write_csv(&result, &path).map_err(write_err)?;
        let bytes = std::fs::metadata(&path)
            .map(|m| m.len())
            .map_err(|e| write_err(CsvError::Io(e)))?;

        info!(
            export = %self.name,
            path = %path.display(),
            rows,
            bytes,
            job_id = %result.metadata.job_id,
            "Export materialized"
        );

        Ok(StepOutput {
            name: self.name.clone(),
            path,
            rows,
            bytes,
            job_id: result.metadata.job_id,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
