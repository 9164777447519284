use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Dataset qualifier the export queries run against when none is configured.
pub const DEFAULT_DATASET: &str = "database-376007.365_database";

/// BigQuery REST v2 root.
pub const DEFAULT_BIGQUERY_API_BASE: &str = "https://bigquery.googleapis.com/bigquery/v2";

/// Drive v3 multipart upload endpoint.
pub const DEFAULT_DRIVE_UPLOAD_URL: &str =
    "https://www.googleapis.com/upload/drive/v3/files?uploadType=multipart";

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u32(profile: &str, key: &str, default: u32) -> u32 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    match profiled_env_opt(profile, key) {
        Some(v) => matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"),
        None => default,
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub credentials: CredentialsConfig,
    pub warehouse: WarehouseConfig,
    pub drive: DriveConfig,
    pub export: ExportConfig,
}

impl Config {
    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            credentials: CredentialsConfig::from_env_profiled(p),
            warehouse: WarehouseConfig::from_env_profiled(p),
            drive: DriveConfig::from_env_profiled(p),
            export: ExportConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Check that every value the run needs is present, before any query is issued.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.credentials.is_configured() {
            return Err(ConfigError::Missing(
                "GOOGLE_APPLICATION_CREDENTIALS or BIGQUERY_ACCESS_TOKEN".into(),
            ));
        }
        if self.credentials.key_file.is_none() && self.warehouse.project.is_none() {
            return Err(ConfigError::Missing("BIGQUERY_PROJECT".into()));
        }
        if self.warehouse.page_size == 0 {
            return Err(ConfigError::Invalid {
                key: "BIGQUERY_PAGE_SIZE".into(),
                value: "0".into(),
            });
        }
        if self.drive.enabled {
            if self.drive.folder_id.is_none() {
                return Err(ConfigError::Missing("DRIVE_FOLDER_ID".into()));
            }
            if self.drive.access_token.is_none() && self.credentials.key_file.is_none() {
                return Err(ConfigError::Missing("DRIVE_ACCESS_TOKEN".into()));
            }
        }
        Ok(())
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  credentials: key_file={}, static_token={}",
            self.credentials
                .key_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(none)".into()),
            self.credentials.access_token.is_some()
        );
        tracing::info!(
            "  warehouse:   project={}, dataset={}, timeout={}s",
            self.warehouse.project.as_deref().unwrap_or("(from key file)"),
            self.warehouse.dataset,
            self.warehouse.timeout_seconds
        );
        tracing::info!(
            "  drive:       enabled={}, folder={}",
            self.drive.enabled,
            self.drive.folder_id.as_deref().unwrap_or("(none)")
        );
        tracing::info!("  export:      output_dir={}", self.export.output_dir.display());
    }

    /// Return a redacted view safe for printing (no secrets).
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "credentials": {
                "key_file": self.credentials.key_file,
                "static_token": self.credentials.access_token.is_some(),
            },
            "warehouse": {
                "project": self.warehouse.project,
                "dataset": self.warehouse.dataset,
                "location": self.warehouse.location,
                "api_base": self.warehouse.api_base,
                "timeout_seconds": self.warehouse.timeout_seconds,
                "page_size": self.warehouse.page_size,
            },
            "drive": {
                "enabled": self.drive.enabled,
                "upload_url": self.drive.upload_url,
                "folder_id": self.drive.folder_id,
                "static_token": self.drive.access_token.is_some(),
            },
            "export": { "output_dir": self.export.output_dir },
        })
    }
}

// ── Credentials ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// Service account key file.
    pub key_file: Option<PathBuf>,
    /// Pre-minted OAuth access token; takes precedence over the key file.
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
}

impl CredentialsConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            key_file: profiled_env_opt(p, "GOOGLE_APPLICATION_CREDENTIALS").map(PathBuf::from),
            access_token: profiled_env_opt(p, "BIGQUERY_ACCESS_TOKEN"),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.key_file.is_some() || self.access_token.is_some()
    }
}

// ── Warehouse (BigQuery) ──────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseConfig {
    /// Billing project. Falls back to the key file's `project_id`.
    pub project: Option<String>,
    /// `project.dataset` qualifier substituted into the export SQL.
    pub dataset: String,
    /// Job location (e.g. "US"); BigQuery infers it when unset.
    pub location: Option<String>,
    pub api_base: String,
    pub timeout_seconds: u32,
    /// `maxResults` per result page.
    pub page_size: u32,
}

impl WarehouseConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            project: profiled_env_opt(p, "BIGQUERY_PROJECT"),
            dataset: profiled_env_or(p, "BIGQUERY_DATASET", DEFAULT_DATASET),
            location: profiled_env_opt(p, "BIGQUERY_LOCATION"),
            api_base: profiled_env_or(p, "BIGQUERY_API_BASE", DEFAULT_BIGQUERY_API_BASE)
                .trim_end_matches('/')
                .to_string(),
            timeout_seconds: profiled_env_u32(p, "BIGQUERY_TIMEOUT_SECONDS", 300),
            page_size: profiled_env_u32(p, "BIGQUERY_PAGE_SIZE", 10_000),
        }
    }
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            project: None,
            dataset: DEFAULT_DATASET.to_string(),
            location: None,
            api_base: DEFAULT_BIGQUERY_API_BASE.to_string(),
            timeout_seconds: 300,
            page_size: 10_000,
        }
    }
}

// ── Drive uploads ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveConfig {
    pub enabled: bool,
    pub upload_url: String,
    /// Destination folder id, sent as the single entry of `parents`.
    pub folder_id: Option<String>,
    /// Bearer token for the upload endpoint. When unset the service
    /// account key is used with the `drive.file` scope.
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
}

impl DriveConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            enabled: profiled_env_bool(p, "DRIVE_UPLOAD_ENABLED", true),
            upload_url: profiled_env_or(p, "DRIVE_UPLOAD_URL", DEFAULT_DRIVE_UPLOAD_URL),
            folder_id: profiled_env_opt(p, "DRIVE_FOLDER_ID"),
            access_token: profiled_env_opt(p, "DRIVE_ACCESS_TOKEN"),
        }
    }
}

// ── Local export ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    pub output_dir: PathBuf,
}

impl ExportConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            output_dir: PathBuf::from(profiled_env_or(p, "EXPORT_OUTPUT_DIR", ".")),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
