//! ExportStep end to end: fake warehouse -> CSV on disk.

use axum::http::StatusCode;
use serde_json::json;

use edu_warehouse::{ExportStep, ExportStepError};

use crate::fake::{self, FakeBigQuery};

#[tokio::test]
async fn step_writes_query_result_as_csv() {
    let bq = FakeBigQuery::new();
    bq.push_query(
        StatusCode::OK,
        json!({
            "jobReference": fake::job_ref(),
            "jobComplete": true,
            "schema": fake::schema(),
            "totalRows": "2",
            "rows": [
                fake::row("258798", Some("18.75"), "2022-04-10"),
                fake::row("258800", None, "2022-04-11")
            ]
        }),
    );
    let base = fake::spawn(bq).await;
    let client = fake::client(&base, 30);
    let dir = tempfile::tempdir().unwrap();

    let step = ExportStep::new("student_watch_time", "student_watch_time.csv", "SELECT 1");
    let out = step.materialize(&client, dir.path()).await.unwrap();

    assert_eq!(out.rows, 2);
    assert_eq!(out.job_id, "job_42");
    let text = std::fs::read_to_string(dir.path().join("student_watch_time.csv")).unwrap();
    assert_eq!(
        text,
        "student_id,minutes_watched,date_watched\n258798,18.75,2022-04-10\n258800,,2022-04-11\n"
    );
}

#[tokio::test]
async fn typed_columns_reach_the_file_exactly() {
    let bq = FakeBigQuery::new();
    bq.push_query(
        StatusCode::OK,
        json!({
            "jobReference": fake::job_ref(),
            "jobComplete": true,
            "schema": {"fields": [
                {"name": "student_id", "type": "INTEGER", "mode": "NULLABLE"},
                {"name": "date_registered", "type": "TIMESTAMP", "mode": "NULLABLE"},
                {"name": "avg_rating", "type": "FLOAT", "mode": "NULLABLE"},
                {"name": "has_purchased", "type": "BOOLEAN", "mode": "NULLABLE"}
            ]},
            "totalRows": "3",
            "rows": [
                {"f": [{"v": "1"}, {"v": "1.674259200123456E9"}, {"v": "4.5"}, {"v": "true"}]},
                {"f": [{"v": "2"}, {"v": "1.6742592E9"}, {"v": null}, {"v": "false"}]},
                {"f": [{"v": "3"}, {"v": null}, {"v": "3.25"}, {"v": null}]}
            ]
        }),
    );
    let base = fake::spawn(bq).await;
    let client = fake::client(&base, 30);
    let dir = tempfile::tempdir().unwrap();

    let step = ExportStep::new("students_master", "students_master.csv", "SELECT 1");
    let out = step.materialize(&client, dir.path()).await.unwrap();

    assert_eq!(out.rows, 3);
    let text = std::fs::read_to_string(dir.path().join("students_master.csv")).unwrap();
    assert_eq!(
        text,
        "student_id,date_registered,avg_rating,has_purchased\n\
         1,2023-01-21T00:00:00.123456Z,4.5,true\n\
         2,2023-01-21T00:00:00Z,,false\n\
         3,,3.25,\n"
    );
}

#[tokio::test]
async fn failed_query_leaves_previous_file_untouched() {
    let bq = FakeBigQuery::new();
    bq.push_query(
        StatusCode::NOT_FOUND,
        json!({"error": {"code": 404, "message": "Not found: Table x"}}),
    );
    let base = fake::spawn(bq).await;
    let client = fake::client(&base, 30);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("students_master.csv");
    std::fs::write(&path, "previous run\n").unwrap();

    let step = ExportStep::new("students_master", "students_master.csv", "SELECT 1");
    let err = step.materialize(&client, dir.path()).await.unwrap_err();

    assert!(matches!(err, ExportStepError::Query { .. }));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "previous run\n");
}
