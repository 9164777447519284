//! WarehouseClient against the fake BigQuery endpoints.

use axum::http::StatusCode;
use serde_json::json;

use edu_warehouse::{QueryRunner, WarehouseError};

use crate::fake::{self, FakeBigQuery};

#[tokio::test]
async fn single_page_result() {
    let bq = FakeBigQuery::new();
    bq.push_query(
        StatusCode::OK,
        json!({
            "jobReference": fake::job_ref(),
            "jobComplete": true,
            "schema": fake::schema(),
            "totalRows": "2",
            "totalBytesProcessed": "1048576",
            "cacheHit": false,
            "rows": [
                fake::row("1", Some("12.5"), "2022-03-01"),
                fake::row("2", None, "2022-03-02")
            ]
        }),
    );
    let base = fake::spawn(bq.clone()).await;
    let client = fake::client(&base, 30);

    let result = client.execute_query("SELECT 1").await.unwrap();

    assert_eq!(result.column_names(), vec!["student_id", "minutes_watched", "date_watched"]);
    assert_eq!(result.row_count(), 2);
    assert_eq!(result.get_value(0, "minutes_watched"), Some("12.5"));
    assert_eq!(result.get_value(1, "minutes_watched"), None);
    assert_eq!(result.metadata.job_id, "job_42");
    assert_eq!(result.metadata.location.as_deref(), Some("US"));
    assert_eq!(result.metadata.bytes_processed, 1_048_576);
    assert_eq!(bq.log(), vec!["POST billing-proj/queries"]);

    let body = bq.query_bodies.lock().unwrap()[0].clone();
    assert_eq!(body["query"], "SELECT 1");
    assert_eq!(body["useLegacySql"], false);
    assert_eq!(body["maxResults"], 2);
}

#[tokio::test]
async fn pages_are_concatenated_in_order() {
    let bq = FakeBigQuery::new();
    bq.push_query(
        StatusCode::OK,
        json!({
            "jobReference": fake::job_ref(),
            "jobComplete": true,
            "schema": fake::schema(),
            "totalRows": "5",
            "pageToken": "page-2",
            "rows": [fake::row("1", Some("1"), "2022-01-01"), fake::row("2", Some("2"), "2022-01-02")]
        }),
    );
    bq.push_results(
        StatusCode::OK,
        json!({
            "jobReference": fake::job_ref(),
            "jobComplete": true,
            "totalRows": "5",
            "pageToken": "page-3",
            "rows": [fake::row("3", Some("3"), "2022-01-03"), fake::row("4", Some("4"), "2022-01-04")]
        }),
    );
    bq.push_results(
        StatusCode::OK,
        json!({
            "jobReference": fake::job_ref(),
            "jobComplete": true,
            "totalRows": "5",
            "rows": [fake::row("5", Some("5"), "2022-01-05")]
        }),
    );
    let base = fake::spawn(bq.clone()).await;

    let result = fake::client(&base, 30).execute_query("SELECT 1").await.unwrap();

    let ids: Vec<&str> = (0..result.row_count())
        .map(|i| result.get_value(i, "student_id").unwrap())
        .collect();
    assert_eq!(ids, vec!["1", "2", "3", "4", "5"]);
    assert_eq!(
        bq.log(),
        vec![
            "POST billing-proj/queries",
            "GET billing-proj/queries/job_42?page-2",
            "GET billing-proj/queries/job_42?page-3",
        ]
    );
}

#[tokio::test]
async fn incomplete_job_is_polled() {
    let bq = FakeBigQuery::new();
    bq.push_query(
        StatusCode::OK,
        json!({"jobReference": fake::job_ref(), "jobComplete": false}),
    );
    bq.push_results(
        StatusCode::OK,
        json!({"jobReference": fake::job_ref(), "jobComplete": false}),
    );
    bq.push_results(
        StatusCode::OK,
        json!({
            "jobReference": fake::job_ref(),
            "jobComplete": true,
            "schema": fake::schema(),
            "totalRows": "1",
            "rows": [fake::row("9", Some("30"), "2022-02-01")]
        }),
    );
    let base = fake::spawn(bq.clone()).await;

    let result = fake::client(&base, 30).execute_query("SELECT 1").await.unwrap();

    assert_eq!(result.row_count(), 1);
    assert_eq!(result.get_value(0, "student_id"), Some("9"));
    assert_eq!(bq.log().len(), 3);
}

#[tokio::test]
async fn api_error_carries_message() {
    let bq = FakeBigQuery::new();
    bq.push_query(
        StatusCode::BAD_REQUEST,
        json!({"error": {"code": 400, "message": "Unrecognized name: course_ratingz", "status": "INVALID_ARGUMENT"}}),
    );
    let base = fake::spawn(bq.clone()).await;

    let err = fake::client(&base, 30).run_query("SELECT course_ratingz").await.unwrap_err();

    match err {
        WarehouseError::Api { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "Unrecognized name: course_ratingz");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn timeout_cancels_job() {
    let bq = FakeBigQuery::new();
    bq.push_query(
        StatusCode::OK,
        json!({"jobReference": fake::job_ref(), "jobComplete": false}),
    );
    let base = fake::spawn(bq.clone()).await;

    let err = fake::client(&base, 0).execute_query("SELECT 1").await.unwrap_err();

    assert!(matches!(err, WarehouseError::QueryTimeout { ref job_id, seconds: 0 } if job_id == "job_42"));
    assert_eq!(*bq.cancelled.lock().unwrap(), vec!["job_42".to_string()]);
}

#[tokio::test]
async fn missing_job_reference_is_a_parse_error() {
    let bq = FakeBigQuery::new();
    bq.push_query(StatusCode::OK, json!({"jobComplete": true}));
    let base = fake::spawn(bq.clone()).await;

    let err = fake::client(&base, 30).execute_query("SELECT 1").await.unwrap_err();
    assert!(matches!(err, WarehouseError::ParseError(_)));
}
