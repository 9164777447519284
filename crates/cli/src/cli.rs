use std::path::PathBuf;

use clap::Parser;

/// Export the learning-platform reports from BigQuery to CSV and Drive.
///
/// Runs each report query in order, writes `<report>.csv` to the output
/// directory and uploads it to the configured Drive folder. The first
/// failure stops the run.
#[derive(Parser, Debug)]
#[command(name = "edu-export", version, about = "Export report queries to CSV and Google Drive")]
pub struct CliArgs {
    /// Config profile; keys resolve as {PROFILE}_{KEY} before {KEY}
    #[arg(long, env = "EDU_EXPORT_PROFILE")]
    pub profile: Option<String>,

    /// Directory the CSV files are written to (overrides EXPORT_OUTPUT_DIR)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Run only the named report; repeat for several
    #[arg(long = "only", value_name = "REPORT")]
    pub only: Vec<String>,

    /// Write the CSV files but do not upload them
    #[arg(long)]
    pub skip_upload: bool,

    /// List the reports and exit
    #[arg(long)]
    pub list: bool,

    /// Print the resolved configuration (secrets redacted) and exit
    #[arg(long)]
    pub print_config: bool,
}
