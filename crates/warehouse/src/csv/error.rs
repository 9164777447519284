//! Error types for CSV conversion.

/// Errors that can occur during CSV conversion or writing.
#[derive(Debug, thiserror::Error)]
pub enum CsvError {
    /// Failed to build Arrow arrays or encode CSV rows.
    #[error("Arrow conversion error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// I/O error when creating/writing the output file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
