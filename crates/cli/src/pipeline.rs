//! Sequential query → CSV → upload run over a list of export steps.

use std::fmt;
use std::path::Path;
use std::time::Instant;

use edu_drive::{DriveError, UploadMetadata, UploadedFile, Uploader};
use edu_warehouse::{ExportStep, ExportStepError, QueryRunner, StepOutput};
use serde::Serialize;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Query,
    Write,
    Upload,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Query => write!(f, "query"),
            Stage::Write => write!(f, "write"),
            Stage::Upload => write!(f, "upload"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Step(#[from] ExportStepError),

    #[error("export '{name}': upload failed: {source}")]
    Upload {
        name: String,
        #[source]
        source: DriveError,
    },
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Step(ExportStepError::Query { .. }) => Stage::Query,
            PipelineError::Step(ExportStepError::Write { .. }) => Stage::Write,
            PipelineError::Upload { .. } => Stage::Upload,
        }
    }

    pub fn export_name(&self) -> &str {
        match self {
            PipelineError::Step(ExportStepError::Query { name, .. })
            | PipelineError::Step(ExportStepError::Write { name, .. })
            | PipelineError::Upload { name, .. } => name.as_str(),
        }
    }
}

/// Where materialized files go; `None` in [`run_exports`] means write only.
pub struct UploadTarget<'a> {
    pub uploader: &'a dyn Uploader,
    pub folder_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportOutcome {
    pub output: StepOutput,
    /// `None` when uploads are disabled.
    pub uploaded: Option<UploadedFile>,
}

#[derive(Debug)]
pub struct ExportReport {
    /// Exports that finished every enabled stage, in run order.
    pub completed: Vec<ExportOutcome>,
    /// The error that stopped the run, if any.
    pub failure: Option<PipelineError>,
    pub elapsed_ms: u64,
}

impl ExportReport {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    pub fn total_rows(&self) -> u64 {
        self.completed.iter().map(|o| o.output.rows).sum()
    }
}

impl fmt::Display for ExportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .completed
            .iter()
            .map(|o| o.output.name.len())
            .chain(self.failure.iter().map(|e| e.export_name().len()))
            .max()
            .unwrap_or(0);

        for outcome in &self.completed {
            let upload = match &outcome.uploaded {
                Some(file) => format!("uploaded {}", file.id),
                None => "upload skipped".to_string(),
            };
            writeln!(
                f,
                "  ok    {:<width$}  {:>8} rows  {:>10} bytes  {}",
                outcome.output.name,
                outcome.output.rows,
                outcome.output.bytes,
                upload,
                width = width,
            )?;
        }
        if let Some(err) = &self.failure {
            writeln!(
                f,
                "  FAIL  {:<width$}  {} stage: {}",
                err.export_name(),
                err.stage(),
                err,
                width = width,
            )?;
        }
        write!(
            f,
            "{} export(s) completed, {} rows, {}ms{}",
            self.completed.len(),
            self.total_rows(),
            self.elapsed_ms,
            if self.is_success() { "" } else { " (run aborted)" },
        )
    }
}

/// Run each step in order: query, write CSV, upload. The first error stops
/// the run; steps after it are never queried, written or uploaded.
pub async fn run_exports(
    steps: &[ExportStep],
    runner: &dyn QueryRunner,
    upload: Option<&UploadTarget<'_>>,
    output_dir: &Path,
) -> ExportReport {
    let start = Instant::now();
    let mut completed = Vec::with_capacity(steps.len());
    let mut failure = None;

    for (i, step) in steps.iter().enumerate() {
        info!(export = %step.name, step = i + 1, of = steps.len(), "Running export");

        match run_one(step, runner, upload, output_dir).await {
            Ok(outcome) => completed.push(outcome),
            Err(e) => {
                error!(export = %step.name, stage = %e.stage(), error = %e, "Export failed, stopping run");
                failure = Some(e);
                break;
            }
        }
    }

    ExportReport {
        completed,
        failure,
        elapsed_ms: start.elapsed().as_millis() as u64,
    }
}

async fn run_one(
    step: &ExportStep,
    runner: &dyn QueryRunner,
    upload: Option<&UploadTarget<'_>>,
    output_dir: &Path,
) -> Result<ExportOutcome, PipelineError> {
    let output = step.materialize(runner, output_dir).await?;

    let uploaded = match upload {
        Some(target) => {
            let metadata = UploadMetadata::new(&step.file_name, &target.folder_id);
            let file = target
                .uploader
                .upload(&output.path, &metadata)
                .await
                .map_err(|source| PipelineError::Upload {
                    name: step.name.clone(),
                    source,
                })?;
            Some(file)
        }
        None => None,
    };

    Ok(ExportOutcome { output, uploaded })
}
