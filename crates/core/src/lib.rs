pub mod auth;
pub mod config;
pub mod error;

pub use auth::{AuthError, ServiceAccountKey, ServiceAccountTokenProvider, TokenSource};
pub use config::Config;
pub use error::*;
