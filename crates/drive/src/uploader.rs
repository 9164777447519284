//! Multipart uploads of local files into a Drive folder.

use std::path::Path;

use async_trait::async_trait;
use edu_core::auth::TokenSource;
use edu_core::config::DriveConfig;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::DriveError;

const METADATA_MIME: &str = "application/json;charset=UTF-8";
const CSV_MIME: &str = "text/csv";

/// JSON metadata part of a multipart upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadMetadata {
    /// Name the file gets in Drive.
    pub name: String,
    /// Folder ids the file is placed in.
    pub parents: Vec<String>,
}

impl UploadMetadata {
    pub fn new(name: impl Into<String>, folder_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parents: vec![folder_id.into()],
        }
    }
}

/// The `files` resource returned by a successful upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

/// Anything that can put a local file somewhere remote.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, path: &Path, metadata: &UploadMetadata) -> Result<UploadedFile, DriveError>;
}

pub struct DriveUploader {
    config: DriveConfig,
    tokens: TokenSource,
    http: reqwest::Client,
}

impl DriveUploader {
    pub fn new(config: DriveConfig, tokens: TokenSource) -> Self {
        info!(
            upload_url = %config.upload_url,
            folder = config.folder_id.as_deref().unwrap_or("(none)"),
            "DriveUploader initialised"
        );
        Self {
            config,
            tokens,
            http: reqwest::Client::new(),
        }
    }

    /// Build the two-part form: JSON metadata, then the file bytes.
    pub fn build_form(metadata: &UploadMetadata, contents: Vec<u8>) -> Result<Form, DriveError> {
        let meta = Part::text(serde_json::to_string(metadata)?)
            .file_name("metadata")
            .mime_str(METADATA_MIME)?;
        let file = Part::bytes(contents)
            .file_name(metadata.name.clone())
            .mime_str(CSV_MIME)?;
        Ok(Form::new().part("data", meta).part("file", file))
    }

    /// POST `path` to the upload endpoint. Non-2xx responses are errors;
    /// nothing is retried.
    pub async fn upload_file(
        &self,
        path: &Path,
        metadata: &UploadMetadata,
    ) -> Result<UploadedFile, DriveError> {
        let contents = tokio::fs::read(path).await.map_err(|source| DriveError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let size = contents.len();
        let form = Self::build_form(metadata, contents)?;

        let resp = self
            .http
            .post(&self.config.upload_url)
            .bearer_auth(self.tokens.access_token().await?)
            .multipart(form)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            error!(file = %metadata.name, status = status.as_u16(), "Upload rejected");
            return Err(DriveError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let uploaded: UploadedFile = resp.json().await?;
        info!(
            file = %metadata.name,
            bytes = size,
            drive_id = %uploaded.id,
            "Uploaded file"
        );
        Ok(uploaded)
    }
}

#[async_trait]
impl Uploader for DriveUploader {
    async fn upload(&self, path: &Path, metadata: &UploadMetadata) -> Result<UploadedFile, DriveError> {
        self.upload_file(path, metadata).await
    }
}
