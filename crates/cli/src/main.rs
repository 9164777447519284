mod cli;
mod pipeline;
mod reports;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use edu_core::auth::{TokenSource, BIGQUERY_SCOPE, DRIVE_FILE_SCOPE};
use edu_core::config::{self, Config};
use edu_drive::DriveUploader;
use edu_warehouse::WarehouseClient;

use crate::cli::CliArgs;
use crate::pipeline::{run_exports, UploadTarget};

#[tokio::main]
async fn main() -> Result<()> {
    // .env first so clap's `env =` lookups see it
    config::load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    let mut config = Config::for_profile(args.profile.as_deref().unwrap_or_default());
    if let Some(dir) = args.output_dir.clone() {
        config.export.output_dir = dir;
    }
    if args.skip_upload {
        config.drive.enabled = false;
    }

    let steps = reports::select(reports::catalog(&config.warehouse.dataset), &args.only)?;

    if args.list {
        for step in &steps {
            println!("{:<24} {}", step.name, step.file_name);
        }
        return Ok(());
    }

    if args.print_config {
        println!("{}", serde_json::to_string_pretty(&config.redacted_summary())?);
        return Ok(());
    }

    config.log_summary();
    config.validate().context("invalid configuration")?;

    let warehouse_tokens = TokenSource::resolve(
        &config.credentials,
        config.credentials.access_token.as_deref(),
        BIGQUERY_SCOPE,
    )
    .context("failed to load BigQuery credentials")?;
    let client = WarehouseClient::new(config.warehouse.clone(), warehouse_tokens)
        .context("failed to create BigQuery client")?;

    let uploader = if config.drive.enabled {
        let drive_tokens = TokenSource::resolve(
            &config.credentials,
            config.drive.access_token.as_deref(),
            DRIVE_FILE_SCOPE,
        )
        .context("failed to load Drive credentials")?;
        Some(DriveUploader::new(config.drive.clone(), drive_tokens))
    } else {
        info!("Drive upload disabled; CSV files are written locally only");
        None
    };
    let target = match (&uploader, &config.drive.folder_id) {
        (Some(uploader), Some(folder_id)) => Some(UploadTarget {
            uploader,
            folder_id: folder_id.clone(),
        }),
        _ => None,
    };

    info!(
        exports = steps.len(),
        output_dir = %config.export.output_dir.display(),
        "Starting export run"
    );
    let report = run_exports(&steps, &client, target.as_ref(), &config.export.output_dir).await;

    println!("{report}");

    let rows = report.total_rows();
    if let Some(err) = report.failure {
        error!(export = %err.export_name(), stage = %err.stage(), "Export run aborted");
        return Err(err.into());
    }
    info!(rows, "Export run complete");
    Ok(())
}
