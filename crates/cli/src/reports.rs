//! The fixed set of report queries, in export order.
//!
//! SQL text is fixed; only the `project.dataset` qualifier is substituted
//! so the same reports can run against a copy of the dataset.

use edu_warehouse::ExportStep;

const DATASET_PLACEHOLDER: &str = "{dataset}";

struct Report {
    name: &'static str,
    sql: &'static str,
}

const REPORTS: &[Report] = &[
    Report {
        name: "top_5_rated_courses",
        sql: r#"
SELECT CI.course_title, AVG(CR.course_rating) AS avg_rating, COUNT(DISTINCT CR.student_id) AS num_ratings, SUM(SL.minutes_watched)/COUNT(DISTINCT CR.student_id) AS total_watched_time, COUNT(DISTINCT SL.student_id) AS num_watches
FROM `{dataset}.365_course_info` CI
LEFT JOIN `{dataset}.365_course_ratings` CR ON CI.course_id = CR.course_id
LEFT JOIN (
  SELECT course_id, student_id, SUM(minutes_watched) AS minutes_watched
  FROM `{dataset}.365_student_learning`
  GROUP BY course_id, student_id
) SL ON CI.course_id = SL.course_id
GROUP BY CI.course_id, CI.course_title
ORDER BY AVG(CR.course_rating) DESC
LIMIT 5
"#,
    },
    Report {
        name: "top_5_watched_courses",
        sql: r#"
SELECT CI.course_title, AVG(CR.course_rating) AS avg_rating, COUNT(DISTINCT CR.student_id) AS num_ratings, SUM(SL.minutes_watched)/COUNT(DISTINCT CR.student_id) AS total_watched_time, COUNT(DISTINCT SL.student_id) AS num_watches
FROM `{dataset}.365_course_info` CI
LEFT JOIN `{dataset}.365_course_ratings` CR ON CI.course_id = CR.course_id
LEFT JOIN (
  SELECT course_id, student_id, SUM(minutes_watched) AS minutes_watched
  FROM `{dataset}.365_student_learning`
  GROUP BY course_id, student_id
) SL ON CI.course_id = SL.course_id
GROUP BY CI.course_id, CI.course_title
ORDER BY SUM(SL.minutes_watched) DESC
LIMIT 5
"#,
    },
    Report {
        name: "students_master",
        sql: r#"
SELECT
  S.student_id,
  S.student_country,
  S.date_registered,
  CASE WHEN EXISTS (SELECT 1 FROM `{dataset}.365_student_purchases` WHERE student_id = S.student_id) THEN 'YES' ELSE 'NO' END AS has_purchased,
  CASE WHEN EXISTS (SELECT 1 FROM `{dataset}.365_student_engagement` WHERE student_id = S.student_id) THEN 'YES' ELSE 'NO' END AS has_onboarded
FROM
  `{dataset}.365_student_info` S
"#,
    },
    Report {
        name: "student_watch_time",
        sql: r#"
SELECT S.student_id,
  L.minutes_watched,
  L.date_watched
FROM `{dataset}.365_student_info` S
JOIN `{dataset}.365_student_learning` L
ON S.student_id = L.student_id
"#,
    },
    Report {
        name: "daily_active_users",
        sql: r#"
SELECT
    COUNT(DISTINCT student_id), date_engaged
FROM
 `{dataset}.365_student_engagement`
GROUP BY date_engaged
ORDER BY date_engaged
"#,
    },
    Report {
        name: "monthly_active_users",
        sql: r#"
SELECT
    COUNT(DISTINCT student_id), EXTRACT (MONTH FROM date_engaged) M
FROM
 `{dataset}.365_student_engagement`
GROUP BY M
ORDER BY M
"#,
    },
    Report {
        name: "student_active_days",
        sql: r#"
SELECT
    student_id, COUNT(DISTINCT date_engaged)
FROM
 `{dataset}.365_student_engagement`
GROUP BY student_id
"#,
    },
];

#[derive(Debug, thiserror::Error)]
#[error("unknown report '{name}' (known: {known})")]
pub struct UnknownReport {
    pub name: String,
    pub known: String,
}

/// Every report as an export step against `dataset`, in export order.
pub fn catalog(dataset: &str) -> Vec<ExportStep> {
    REPORTS
        .iter()
        .map(|r| {
            ExportStep::new(
                r.name,
                format!("{}.csv", r.name),
                r.sql.replace(DATASET_PLACEHOLDER, dataset),
            )
        })
        .collect()
}

/// Restrict `steps` to `only`, keeping catalog order. Empty `only` keeps all.
pub fn select(steps: Vec<ExportStep>, only: &[String]) -> Result<Vec<ExportStep>, UnknownReport> {
    if only.is_empty() {
        return Ok(steps);
    }
    if let Some(missing) = only.iter().find(|n| !steps.iter().any(|s| &s.name == *n)) {
        return Err(UnknownReport {
            name: missing.clone(),
            known: steps.iter().map(|s| s.name.as_str()).collect::<Vec<_>>().join(", "),
        });
    }
    Ok(steps.into_iter().filter(|s| only.contains(&s.name)).collect())
}
