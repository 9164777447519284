use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DriveError {
    #[error("authentication failed: {0}")]
    Auth(#[from] edu_core::AuthError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("upload rejected with {status}: {body}")]
    Api { status: u16, body: String },

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
