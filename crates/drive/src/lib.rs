pub mod error;
pub mod uploader;

pub use error::DriveError;
pub use uploader::{DriveUploader, UploadMetadata, UploadedFile, Uploader};
