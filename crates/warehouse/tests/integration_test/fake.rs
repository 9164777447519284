//! Minimal stand-in for the BigQuery `queries` endpoints.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use edu_core::auth::TokenSource;
use edu_core::config::WarehouseConfig;
use edu_warehouse::WarehouseClient;

pub const TOKEN: &str = "ya29.test-token";

#[derive(Default)]
pub struct FakeBigQuery {
    /// Responses for `POST /queries`, in order.
    pub query_responses: Mutex<VecDeque<(StatusCode, Value)>>,
    /// Responses for `GET /queries/{job}`, in order.
    pub results_responses: Mutex<VecDeque<(StatusCode, Value)>>,
    /// Every request seen, as "METHOD path?pageToken".
    pub log: Mutex<Vec<String>>,
    pub query_bodies: Mutex<Vec<Value>>,
    pub cancelled: Mutex<Vec<String>>,
}

impl FakeBigQuery {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_query(&self, status: StatusCode, body: Value) {
        self.query_responses.lock().unwrap().push_back((status, body));
    }

    pub fn push_results(&self, status: StatusCode, body: Value) {
        self.results_responses.lock().unwrap().push_back((status, body));
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {TOKEN}"))
}

fn pop(queue: &Mutex<VecDeque<(StatusCode, Value)>>) -> Response {
    match queue.lock().unwrap().pop_front() {
        Some((status, body)) => (status, Json(body)).into_response(),
        None => (StatusCode::INTERNAL_SERVER_ERROR, "no scripted response").into_response(),
    }
}

async fn start_query(
    State(fake): State<Arc<FakeBigQuery>>,
    Path(project): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    fake.log.lock().unwrap().push(format!("POST {project}/queries"));
    fake.query_bodies.lock().unwrap().push(body);
    pop(&fake.query_responses)
}

async fn get_results(
    State(fake): State<Arc<FakeBigQuery>>,
    Path((project, job)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let token = params.get("pageToken").cloned().unwrap_or_default();
    fake.log
        .lock()
        .unwrap()
        .push(format!("GET {project}/queries/{job}?{token}"));
    pop(&fake.results_responses)
}

async fn cancel(
    State(fake): State<Arc<FakeBigQuery>>,
    Path((_project, job)): Path<(String, String)>,
) -> Json<Value> {
    fake.cancelled.lock().unwrap().push(job);
    Json(json!({"kind": "bigquery#jobCancelResponse"}))
}

/// Serve the fake and return its `api_base`.
pub async fn spawn(fake: Arc<FakeBigQuery>) -> String {
    let app = Router::new()
        .route("/projects/{project}/queries", post(start_query))
        .route("/projects/{project}/queries/{job}", get(get_results))
        .route("/projects/{project}/jobs/{job}/cancel", post(cancel))
        .with_state(fake);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

pub fn client(api_base: &str, timeout_seconds: u32) -> WarehouseClient {
    let config = WarehouseConfig {
        project: Some("billing-proj".into()),
        api_base: api_base.to_string(),
        timeout_seconds,
        page_size: 2,
        ..WarehouseConfig::default()
    };
    WarehouseClient::new(config, TokenSource::Static(TOKEN.into())).unwrap()
}

pub fn schema() -> Value {
    json!({"fields": [
        {"name": "student_id", "type": "INTEGER", "mode": "NULLABLE"},
        {"name": "minutes_watched", "type": "FLOAT", "mode": "NULLABLE"},
        {"name": "date_watched", "type": "DATE", "mode": "NULLABLE"}
    ]})
}

pub fn job_ref() -> Value {
    json!({"projectId": "billing-proj", "jobId": "job_42", "location": "US"})
}

pub fn row(id: &str, minutes: Option<&str>, date: &str) -> Value {
    json!({"f": [{"v": id}, {"v": minutes}, {"v": date}]})
}
