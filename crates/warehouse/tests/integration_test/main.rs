//! Integration tests for edu-warehouse.
//!
//! The BigQuery REST API is replaced by an in-process axum server bound to
//! 127.0.0.1, so these run without Google credentials.

mod client;
mod export;
mod fake;
