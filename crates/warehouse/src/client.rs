//! BigQuery query execution client.
//!
//! Provides [`WarehouseClient`] for running SQL through the BigQuery REST
//! API (`jobs.query` + `jobs.getQueryResults`), with exponential-backoff
//! polling for long-running jobs, timeout enforcement with best-effort
//! cancellation, and page-by-page collection into a [`ResultTable`].

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use edu_core::auth::{AuthError, TokenSource};
use edu_core::config::WarehouseConfig;
use tracing::{debug, error, info, warn};

use crate::response::{
    decode_row, error_message, schema_to_columns, JobReference, QueryRequest, QueryResponse,
};
use crate::result::{QueryMetadata, ResultTable};

/// Server-side wait per request; polling continues client-side after it.
const SERVER_WAIT_MS: u64 = 10_000;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Errors that can occur while running a warehouse query.
#[derive(Debug, thiserror::Error)]
pub enum WarehouseError {
    #[error("warehouse not configured: {0}")]
    NotConfigured(String),

    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API rejected the request (bad SQL, missing table, permissions).
    #[error("BigQuery API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Job {job_id} timed out after {seconds}s")]
    QueryTimeout { job_id: String, seconds: u32 },

    #[error("Parse error: {0}")]
    ParseError(String),
}

// ---------------------------------------------------------------------------
// Runner seam
// ---------------------------------------------------------------------------

/// Anything that can turn SQL into a [`ResultTable`].
#[async_trait]
pub trait QueryRunner: Send + Sync {
    async fn run_query(&self, sql: &str) -> Result<ResultTable, WarehouseError>;
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct WarehouseClient {
    config: WarehouseConfig,
    project: String,
    tokens: TokenSource,
    http: reqwest::Client,
}

impl WarehouseClient {
    /// Create a client. The billing project comes from the config, falling
    /// back to the service account key's `project_id`.
    pub fn new(config: WarehouseConfig, tokens: TokenSource) -> Result<Self, WarehouseError> {
        let project = config
            .project
            .clone()
            .or_else(|| tokens.project_id().map(str::to_string))
            .ok_or_else(|| {
                WarehouseError::NotConfigured(
                    "no BIGQUERY_PROJECT and the credential has no project_id".into(),
                )
            })?;

        info!(
            project = %project,
            dataset = %config.dataset,
            location = config.location.as_deref().unwrap_or("(auto)"),
            "WarehouseClient initialised"
        );

        Ok(Self {
            config,
            project,
            tokens,
            http: reqwest::Client::new(),
        })
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn config(&self) -> &WarehouseConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Public API
    // -----------------------------------------------------------------------

    /// Run a SQL statement and return every row of its result.
    ///
    /// 1. Submit via `jobs.query`
    /// 2. Poll `getQueryResults` until the job completes (exponential backoff)
    /// 3. Follow `pageToken` until all pages are collected
    pub async fn execute_query(&self, sql: &str) -> Result<ResultTable, WarehouseError> {
        let start = Instant::now();
        info!(sql = %sql.trim(), "Starting BigQuery query");

        let first = self.start_query(sql).await?;
        let job = first.job_reference.clone().ok_or_else(|| {
            WarehouseError::ParseError("response has no jobReference".into())
        })?;
        info!(job_id = %job.job_id, "Query job submitted");

        let mut page = if first.job_complete {
            first
        } else {
            self.poll_until_complete(&job, start).await?
        };

        let schema = page.schema.clone().unwrap_or_default();
        let columns = schema_to_columns(&schema);
        let total_rows = page.total_rows();
        let bytes_processed = page.bytes_processed();
        let cache_hit = page.cache_hit.unwrap_or(false);

        let mut rows: Vec<Vec<Option<String>>> = Vec::with_capacity(total_rows as usize);
        let mut pages = 1usize;
        loop {
            rows.extend(page.rows.iter().map(|r| decode_row(&schema, r)));
            let Some(token) = page.page_token.take() else {
                break;
            };
            page = self.get_query_results(&job, Some(&token)).await?;
            pages += 1;
        }

        if rows.len() as u64 != total_rows {
            warn!(
                job_id = %job.job_id,
                collected = rows.len(),
                reported = total_rows,
                "Row count differs from totalRows"
            );
        }

        let metadata = QueryMetadata {
            job_id: job.job_id.clone(),
            location: job.location.clone(),
            total_rows,
            bytes_processed,
            cache_hit,
            elapsed_ms: start.elapsed().as_millis() as u64,
        };

        debug!(
            job_id = %metadata.job_id,
            columns = columns.len(),
            rows = rows.len(),
            pages,
            "Collected query results"
        );

        Ok(ResultTable {
            columns,
            rows,
            metadata,
        })
    }

    /// Ask BigQuery to cancel a running job.
    pub async fn cancel_job(&self, job: &JobReference) -> Result<(), WarehouseError> {
        info!(job_id = %job.job_id, "Cancelling job");

        let url = format!(
            "{}/projects/{}/jobs/{}/cancel",
            self.config.api_base, job.project_id, job.job_id
        );
        let mut req = self
            .http
            .post(&url)
            .bearer_auth(self.tokens.access_token().await?);
        if let Some(location) = job.location.as_deref() {
            req = req.query(&[("location", location)]);
        }
        let resp = req.send().await?;
        Self::check_status(resp).await?;

        info!(job_id = %job.job_id, "Job cancellation requested");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_seconds as u64)
    }

    fn server_wait_ms(&self) -> u64 {
        SERVER_WAIT_MS.min(self.timeout().as_millis() as u64)
    }

    async fn start_query(&self, sql: &str) -> Result<QueryResponse, WarehouseError> {
        let url = format!("{}/projects/{}/queries", self.config.api_base, self.project);
        let body = QueryRequest {
            query: sql,
            use_legacy_sql: false,
            max_results: self.config.page_size,
            timeout_ms: self.server_wait_ms(),
            location: self.config.location.as_deref(),
        };

        let resp = self
            .http
            .post(&url)
            .bearer_auth(self.tokens.access_token().await?)
            .json(&body)
            .send()
            .await?;

        Self::parse_response(resp).await
    }

    async fn get_query_results(
        &self,
        job: &JobReference,
        page_token: Option<&str>,
    ) -> Result<QueryResponse, WarehouseError> {
        let url = format!(
            "{}/projects/{}/queries/{}",
            self.config.api_base, job.project_id, job.job_id
        );

        let mut params: Vec<(&str, String)> = vec![
            ("maxResults", self.config.page_size.to_string()),
            ("timeoutMs", self.server_wait_ms().to_string()),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token.to_string()));
        }
        if let Some(location) = job.location.as_deref() {
            params.push(("location", location.to_string()));
        }

        let resp = self
            .http
            .get(&url)
            .bearer_auth(self.tokens.access_token().await?)
            .query(&params)
            .send()
            .await?;

        Self::parse_response(resp).await
    }

    /// Poll `getQueryResults` with exponential backoff until the job is
    /// complete or the configured timeout is exceeded.
    async fn poll_until_complete(
        &self,
        job: &JobReference,
        start: Instant,
    ) -> Result<QueryResponse, WarehouseError> {
        let initial_delay_ms: u64 = 200;
        let max_delay_ms: u64 = 2000;
        let backoff_factor: f64 = 1.5;

        let mut delay_ms = initial_delay_ms;

        loop {
            if start.elapsed() > self.timeout() {
                warn!(
                    job_id = %job.job_id,
                    timeout_seconds = self.config.timeout_seconds,
                    "Query timed out, cancelling"
                );
                // Best-effort cancel; the timeout is the error we report.
                if let Err(e) = self.cancel_job(job).await {
                    error!(job_id = %job.job_id, error = %e, "Cancel failed");
                }
                return Err(WarehouseError::QueryTimeout {
                    job_id: job.job_id.clone(),
                    seconds: self.config.timeout_seconds,
                });
            }

            // Jitter without rand: nanosecond fraction of the current time.
            let jitter_ms = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .subsec_nanos()
                % 100;
            tokio::time::sleep(Duration::from_millis(delay_ms + jitter_ms as u64)).await;
            delay_ms = ((delay_ms as f64 * backoff_factor) as u64).min(max_delay_ms);

            let page = self.get_query_results(job, None).await?;

            debug!(
                job_id = %job.job_id,
                complete = page.job_complete,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Polling job status"
            );

            if page.job_complete {
                return Ok(page);
            }
        }
    }

    async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, WarehouseError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        let message = error_message(&body);
        error!(status = status.as_u16(), message = %message, "BigQuery request failed");
        Err(WarehouseError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn parse_response(resp: reqwest::Response) -> Result<QueryResponse, WarehouseError> {
        let resp = Self::check_status(resp).await?;
        let text = resp.text().await?;
        serde_json::from_str(&text).map_err(|e| WarehouseError::ParseError(e.to_string()))
    }
}

#[async_trait]
impl QueryRunner for WarehouseClient {
    async fn run_query(&self, sql: &str) -> Result<ResultTable, WarehouseError> {
        self.execute_query(sql).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(project: Option<&str>) -> WarehouseConfig {
        WarehouseConfig {
            project: project.map(str::to_string),
            ..WarehouseConfig::default()
        }
    }

    #[test]
    fn project_from_config() {
        let client =
            WarehouseClient::new(config(Some("billing-1")), TokenSource::Static("t".into())).unwrap();
        assert_eq!(client.project(), "billing-1");
    }

    #[test]
    fn static_token_without_project_is_rejected() {
        let err = WarehouseClient::new(config(None), TokenSource::Static("t".into()))
            .err()
            .unwrap();
        assert!(matches!(err, WarehouseError::NotConfigured(_)));
    }

    #[test]
    fn server_wait_capped_by_timeout() {
        let mut cfg = config(Some("p"));
        cfg.timeout_seconds = 2;
        let client = WarehouseClient::new(cfg, TokenSource::Static("t".into())).unwrap();
        assert_eq!(client.server_wait_ms(), 2000);

        let client =
            WarehouseClient::new(config(Some("p")), TokenSource::Static("t".into())).unwrap();
        assert_eq!(client.server_wait_ms(), SERVER_WAIT_MS);
    }

    #[test]
    fn error_display_messages() {
        let err = WarehouseError::Api { status: 400, message: "Syntax error".into() };
        assert!(err.to_string().contains("400"));
        assert!(err.to_string().contains("Syntax error"));

        let err = WarehouseError::QueryTimeout { job_id: "job_9".into(), seconds: 60 };
        assert!(err.to_string().contains("job_9"));
        assert!(err.to_string().contains("60s"));
    }
}
