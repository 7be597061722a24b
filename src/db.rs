use std::collections::HashMap;

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{
    DashboardCounts, Evaluation, NewEvaluation, NewVolunteer, Ratings, Volunteer,
    VolunteerEvaluation, VolunteerHistory, VolunteerStatus, VolunteerUpdate,
};

const VOLUNTEER_COLUMNS: &str = "v.id, v.first_name, v.last_name, v.email, v.phone, \
     v.status, v.first_volunteered_on";

const EVALUATION_COLUMNS: &str = "e.id, e.evaluation_code, e.volunteer_id, e.event_name, \
     e.role_performed, e.evaluation_date, e.reliability, e.quality_of_work, e.initiative, \
     e.teamwork, e.communication, e.strengths, e.areas_for_improvement, \
     e.additional_comments, e.evaluator_name, e.evaluator_email, e.evaluator_role, \
     e.submitted_at";

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("migrations applied");
    Ok(())
}

pub fn format_evaluation_code(number: i64) -> String {
    format!("EVAL-{number:05}")
}

/// Outcome of recording a submitted evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Recorded { evaluation_code: String },
    /// Same volunteer, evaluator, event and date already on file.
    Duplicate { evaluation_code: String },
    VolunteerInactive,
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let volunteers = vec![
        (
            Uuid::parse_str("6f1c2a9e-3b7d-4c55-9a8e-1d2f3b4c5d6e")?,
            "Stephanie",
            "Alexander",
            "stephanie.alexander@example.org",
        ),
        (
            Uuid::parse_str("a3e4b5c6-d7e8-4f90-8a1b-2c3d4e5f6a7b")?,
            "Neal",
            "Smith",
            "neal.smith@example.org",
        ),
        (
            Uuid::parse_str("c9d8e7f6-a5b4-4c3d-9e2f-1a0b9c8d7e6f")?,
            "Gabby",
            "Edigio",
            "gabby.edigio@example.org",
        ),
    ];

    let mut tx = pool.begin().await?;

    for (id, first_name, last_name, email) in &volunteers {
        sqlx::query(
            r#"
            INSERT INTO volunteer_evaluations.volunteers
            (id, first_name, last_name, email, status, first_volunteered_on)
            VALUES ($1, $2, $3, $4, 'active', $5)
            ON CONFLICT (email) DO UPDATE
            SET first_name = EXCLUDED.first_name, last_name = EXCLUDED.last_name
            "#,
        )
        .bind(id)
        .bind(first_name)
        .bind(last_name)
        .bind(email)
        .bind(NaiveDate::from_ymd_opt(2024, 1, 15).context("invalid date")?)
        .execute(&mut *tx)
        .await?;
    }

    // (source key, volunteer index, event, date, ratings)
    let evaluations: Vec<(&str, usize, &str, (i32, u32, u32), [i16; 5])> = vec![
        ("seed-001", 0, "WLR", (2025, 1, 12), [9, 9, 8, 9, 9]),
        ("seed-002", 0, "AFU", (2025, 2, 9), [9, 10, 9, 9, 8]),
        ("seed-003", 0, "Prog", (2025, 3, 16), [10, 9, 9, 10, 9]),
        ("seed-004", 0, "WLR", (2025, 4, 13), [10, 10, 9, 10, 10]),
        ("seed-005", 1, "WLR", (2025, 1, 12), [6, 5, 5, 6, 6]),
        ("seed-006", 1, "10-Day", (2025, 2, 23), [5, 6, 4, 5, 6]),
        ("seed-007", 2, "AFU", (2025, 2, 9), [7, 8, 7, 7, 8]),
        ("seed-008", 2, "Prog", (2025, 3, 16), [8, 7, 7, 8, 7]),
        ("seed-009", 2, "WLR", (2025, 4, 13), [7, 7, 8, 7, 7]),
    ];

    for (source_key, volunteer_index, event_name, (y, m, d), [r, q, i, t, c]) in evaluations {
        let email = volunteers[volunteer_index].3;
        let volunteer_id: Uuid = sqlx::query(
            "SELECT id FROM volunteer_evaluations.volunteers WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&mut *tx)
        .await?
        .get("id");

        let evaluation = NewEvaluation {
            volunteer_id,
            event_name: Some(event_name.to_string()),
            role_performed: Some("Group Leader".to_string()),
            evaluation_date: NaiveDate::from_ymd_opt(y, m, d).context("invalid date")?,
            ratings: Ratings {
                reliability: Some(r),
                quality_of_work: Some(q),
                initiative: Some(i),
                teamwork: Some(t),
                communication: Some(c),
            },
            strengths: None,
            areas_for_improvement: None,
            additional_comments: None,
            evaluator_name: "Morgan Blake".to_string(),
            evaluator_email: Some("morgan.blake@example.org".to_string()),
            evaluator_role: Some("Event Lead".to_string()),
            submitted_at: None,
            source_key: Some(source_key.to_string()),
        };
        insert_evaluation(&mut tx, &evaluation).await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Serializes writers on the evaluations table until the transaction ends.
/// Taking it again in the same transaction is a no-op.
async fn lock_evaluations(conn: &mut PgConnection) -> anyhow::Result<()> {
    sqlx::query("LOCK TABLE volunteer_evaluations.evaluations IN SHARE ROW EXCLUSIVE MODE")
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Locks the evaluations table for the rest of the transaction and returns the
/// next free evaluation code.
async fn next_evaluation_code(conn: &mut PgConnection) -> anyhow::Result<String> {
    lock_evaluations(&mut *conn).await?;

    let last: i64 = sqlx::query(
        r#"
        SELECT COALESCE(MAX(CAST(SUBSTRING(evaluation_code FROM 6) AS BIGINT)), 0) AS last
        FROM volunteer_evaluations.evaluations
        WHERE evaluation_code ~ '^EVAL-[0-9]+$'
        "#,
    )
    .fetch_one(&mut *conn)
    .await?
    .get("last");

    Ok(format_evaluation_code(last + 1))
}

/// Inserts one evaluation, skipping it when its source key is already on file.
/// Returns the assigned code for inserted rows.
async fn insert_evaluation(
    conn: &mut PgConnection,
    evaluation: &NewEvaluation,
) -> anyhow::Result<Option<String>> {
    let evaluation_code = next_evaluation_code(conn).await?;
    evaluation.ratings.validate(&evaluation_code)?;

    let result = sqlx::query(
        r#"
        INSERT INTO volunteer_evaluations.evaluations
        (id, evaluation_code, volunteer_id, event_name, role_performed, evaluation_date,
         reliability, quality_of_work, initiative, teamwork, communication,
         strengths, areas_for_improvement, additional_comments,
         evaluator_name, evaluator_email, evaluator_role, submitted_at, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                COALESCE($18, now()), $19)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&evaluation_code)
    .bind(evaluation.volunteer_id)
    .bind(&evaluation.event_name)
    .bind(&evaluation.role_performed)
    .bind(evaluation.evaluation_date)
    .bind(evaluation.ratings.reliability)
    .bind(evaluation.ratings.quality_of_work)
    .bind(evaluation.ratings.initiative)
    .bind(evaluation.ratings.teamwork)
    .bind(evaluation.ratings.communication)
    .bind(&evaluation.strengths)
    .bind(&evaluation.areas_for_improvement)
    .bind(&evaluation.additional_comments)
    .bind(&evaluation.evaluator_name)
    .bind(&evaluation.evaluator_email)
    .bind(&evaluation.evaluator_role)
    .bind(evaluation.submitted_at)
    .bind(&evaluation.source_key)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() > 0 {
        debug!(%evaluation_code, volunteer_id = %evaluation.volunteer_id, "evaluation inserted");
        Ok(Some(evaluation_code))
    } else {
        debug!(source_key = ?evaluation.source_key, "evaluation already imported");
        Ok(None)
    }
}

pub async fn submit_evaluation(
    pool: &PgPool,
    evaluation: &NewEvaluation,
) -> anyhow::Result<SubmitOutcome> {
    let mut tx = pool.begin().await?;
    // The duplicate check and the insert must see the same table.
    lock_evaluations(&mut tx).await?;

    let status: String = sqlx::query(
        "SELECT status FROM volunteer_evaluations.volunteers WHERE id = $1 FOR SHARE",
    )
    .bind(evaluation.volunteer_id)
    .fetch_optional(&mut *tx)
    .await?
    .map(|row| row.get::<String, _>("status"))
    .with_context(|| format!("no volunteer with id {}", evaluation.volunteer_id))?;
    let status = VolunteerStatus::parse(&status)
        .with_context(|| format!("unknown volunteer status {status:?}"))?;
    if !status.accepts_evaluations() {
        warn!(
            volunteer_id = %evaluation.volunteer_id,
            "evaluation for inactive volunteer rejected"
        );
        return Ok(SubmitOutcome::VolunteerInactive);
    }

    let existing: Option<String> = sqlx::query(
        r#"
        SELECT evaluation_code FROM volunteer_evaluations.evaluations
        WHERE volunteer_id = $1
          AND evaluator_name = $2
          AND event_name IS NOT DISTINCT FROM $3
          AND evaluation_date = $4
        LIMIT 1
        "#,
    )
    .bind(evaluation.volunteer_id)
    .bind(&evaluation.evaluator_name)
    .bind(&evaluation.event_name)
    .bind(evaluation.evaluation_date)
    .fetch_optional(&mut *tx)
    .await?
    .map(|row| row.get("evaluation_code"));

    if let Some(evaluation_code) = existing {
        warn!(%evaluation_code, "duplicate evaluation submission rejected");
        return Ok(SubmitOutcome::Duplicate { evaluation_code });
    }

    let evaluation_code = insert_evaluation(&mut tx, evaluation)
        .await?
        .context("evaluation with this source key already exists")?;
    tx.commit().await?;

    info!(%evaluation_code, "evaluation recorded");
    Ok(SubmitOutcome::Recorded { evaluation_code })
}

pub async fn delete_evaluation(pool: &PgPool, evaluation_code: &str) -> anyhow::Result<bool> {
    let result =
        sqlx::query("DELETE FROM volunteer_evaluations.evaluations WHERE evaluation_code = $1")
            .bind(evaluation_code)
            .execute(pool)
            .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn add_volunteer(pool: &PgPool, volunteer: &NewVolunteer) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO volunteer_evaluations.volunteers
        (id, first_name, last_name, email, phone, status, first_volunteered_on)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(volunteer.first_name.trim())
    .bind(volunteer.last_name.trim())
    .bind(&volunteer.email)
    .bind(&volunteer.phone)
    .bind(volunteer.status.as_str())
    .bind(volunteer.first_volunteered_on)
    .fetch_one(pool)
    .await
    .context("failed to insert volunteer")?
    .get("id");

    info!(%id, "volunteer added");
    Ok(id)
}

/// Applies the fields present in `update`. Returns false for an unknown id.
pub async fn update_volunteer(
    pool: &PgPool,
    volunteer_id: Uuid,
    update: &VolunteerUpdate,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE volunteer_evaluations.volunteers
        SET first_name = COALESCE($2, first_name),
            last_name = COALESCE($3, last_name),
            status = COALESCE($4, status)
        WHERE id = $1
        "#,
    )
    .bind(volunteer_id)
    .bind(update.first_name.as_deref().map(str::trim))
    .bind(update.last_name.as_deref().map(str::trim))
    .bind(update.status.map(VolunteerStatus::as_str))
    .execute(pool)
    .await?;

    if result.rows_affected() > 0 {
        info!(%volunteer_id, "volunteer updated");
    }
    Ok(result.rows_affected() > 0)
}

/// Removes a volunteer together with all of their evaluations. Returns how many
/// evaluations went with them, or `None` for an unknown id.
pub async fn delete_volunteer(pool: &PgPool, volunteer_id: Uuid) -> anyhow::Result<Option<u64>> {
    let mut tx = pool.begin().await?;

    let evaluations =
        sqlx::query("DELETE FROM volunteer_evaluations.evaluations WHERE volunteer_id = $1")
            .bind(volunteer_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
    let removed = sqlx::query("DELETE FROM volunteer_evaluations.volunteers WHERE id = $1")
        .bind(volunteer_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    if removed == 0 {
        return Ok(None);
    }
    tx.commit().await?;

    info!(%volunteer_id, evaluations, "volunteer deleted");
    Ok(Some(evaluations))
}

fn volunteer_from_row(row: &PgRow) -> anyhow::Result<Volunteer> {
    let status: String = row.get("status");
    Ok(Volunteer {
        id: row.get("id"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        email: row.get("email"),
        phone: row.get("phone"),
        status: VolunteerStatus::parse(&status)
            .with_context(|| format!("unknown volunteer status {status:?}"))?,
        first_volunteered_on: row.get("first_volunteered_on"),
    })
}

fn evaluation_from_row(row: &PgRow) -> Evaluation {
    Evaluation {
        id: row.get("id"),
        evaluation_code: row.get("evaluation_code"),
        volunteer_id: row.get("volunteer_id"),
        event_name: row.get("event_name"),
        role_performed: row.get("role_performed"),
        evaluation_date: row.get("evaluation_date"),
        ratings: Ratings {
            reliability: row.get("reliability"),
            quality_of_work: row.get("quality_of_work"),
            initiative: row.get("initiative"),
            teamwork: row.get("teamwork"),
            communication: row.get("communication"),
        },
        strengths: row.get("strengths"),
        areas_for_improvement: row.get("areas_for_improvement"),
        additional_comments: row.get("additional_comments"),
        evaluator_name: row.get("evaluator_name"),
        evaluator_email: row.get("evaluator_email"),
        evaluator_role: row.get("evaluator_role"),
        submitted_at: row.get("submitted_at"),
    }
}

fn volunteer_evaluation_from_row(row: &PgRow) -> VolunteerEvaluation {
    VolunteerEvaluation {
        volunteer_first_name: row.get("volunteer_first_name"),
        volunteer_last_name: row.get("volunteer_last_name"),
        evaluation: evaluation_from_row(row),
    }
}

pub async fn list_volunteers(
    pool: &PgPool,
    status: Option<VolunteerStatus>,
    search: Option<&str>,
) -> anyhow::Result<Vec<Volunteer>> {
    let mut query = format!(
        "SELECT {VOLUNTEER_COLUMNS} FROM volunteer_evaluations.volunteers v WHERE TRUE"
    );
    let mut param = 0;

    if status.is_some() {
        param += 1;
        query.push_str(&format!(" AND v.status = ${param}"));
    }
    if search.is_some() {
        param += 1;
        query.push_str(&format!(
            " AND (v.first_name ILIKE ${param} OR v.last_name ILIKE ${param})"
        ));
    }
    query.push_str(" ORDER BY v.last_name, v.first_name");

    let mut rows = sqlx::query(&query);
    if let Some(value) = status {
        rows = rows.bind(value.as_str());
    }
    if let Some(value) = search {
        rows = rows.bind(format!("%{}%", value.trim()));
    }

    rows.fetch_all(pool)
        .await?
        .iter()
        .map(volunteer_from_row)
        .collect()
}

pub async fn fetch_volunteer(
    pool: &PgPool,
    volunteer_id: Option<Uuid>,
    email: Option<&str>,
) -> anyhow::Result<Option<Volunteer>> {
    let query = format!(
        "SELECT {VOLUNTEER_COLUMNS} FROM volunteer_evaluations.volunteers v \
         WHERE v.id = $1 OR ($2::TEXT IS NOT NULL AND lower(v.email) = lower($2))"
    );
    let row = sqlx::query(&query)
        .bind(volunteer_id)
        .bind(email)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(volunteer_from_row).transpose()
}

pub async fn fetch_history(pool: &PgPool, volunteer: Volunteer) -> anyhow::Result<VolunteerHistory> {
    let query = format!(
        "SELECT {EVALUATION_COLUMNS} FROM volunteer_evaluations.evaluations e \
         WHERE e.volunteer_id = $1 ORDER BY e.submitted_at"
    );
    let evaluations = sqlx::query(&query)
        .bind(volunteer.id)
        .fetch_all(pool)
        .await?
        .iter()
        .map(evaluation_from_row)
        .collect();

    Ok(VolunteerHistory {
        volunteer,
        evaluations,
    })
}

/// Loads every volunteer (optionally filtered by status) with their evaluations.
pub async fn fetch_histories(
    pool: &PgPool,
    status: Option<VolunteerStatus>,
) -> anyhow::Result<Vec<VolunteerHistory>> {
    let volunteers = list_volunteers(pool, status, None).await?;

    let query = format!(
        "SELECT {EVALUATION_COLUMNS} FROM volunteer_evaluations.evaluations e \
         JOIN volunteer_evaluations.volunteers v ON v.id = e.volunteer_id \
         WHERE ($1::TEXT IS NULL OR v.status = $1) ORDER BY e.submitted_at"
    );
    let rows = sqlx::query(&query)
        .bind(status.map(VolunteerStatus::as_str))
        .fetch_all(pool)
        .await?;

    let mut by_volunteer: HashMap<Uuid, Vec<Evaluation>> = HashMap::new();
    for row in &rows {
        let evaluation = evaluation_from_row(row);
        by_volunteer
            .entry(evaluation.volunteer_id)
            .or_default()
            .push(evaluation);
    }

    debug!(
        volunteers = volunteers.len(),
        evaluations = rows.len(),
        "loaded evaluation snapshot"
    );

    Ok(volunteers
        .into_iter()
        .map(|volunteer| VolunteerHistory {
            evaluations: by_volunteer.remove(&volunteer.id).unwrap_or_default(),
            volunteer,
        })
        .collect())
}

/// Evaluations joined with volunteer names, newest submission first.
pub async fn fetch_volunteer_evaluations(
    pool: &PgPool,
    limit: Option<i64>,
) -> anyhow::Result<Vec<VolunteerEvaluation>> {
    let query = format!(
        "SELECT {EVALUATION_COLUMNS}, v.first_name AS volunteer_first_name, \
         v.last_name AS volunteer_last_name \
         FROM volunteer_evaluations.evaluations e \
         JOIN volunteer_evaluations.volunteers v ON v.id = e.volunteer_id \
         ORDER BY e.submitted_at DESC LIMIT $1"
    );
    let rows = sqlx::query(&query).bind(limit).fetch_all(pool).await?;

    Ok(rows.iter().map(volunteer_evaluation_from_row).collect())
}

pub async fn fetch_evaluation(
    pool: &PgPool,
    evaluation_code: &str,
) -> anyhow::Result<Option<VolunteerEvaluation>> {
    let query = format!(
        "SELECT {EVALUATION_COLUMNS}, v.first_name AS volunteer_first_name, \
         v.last_name AS volunteer_last_name \
         FROM volunteer_evaluations.evaluations e \
         JOIN volunteer_evaluations.volunteers v ON v.id = e.volunteer_id \
         WHERE e.evaluation_code = $1"
    );
    let row = sqlx::query(&query)
        .bind(evaluation_code.trim())
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(volunteer_evaluation_from_row))
}

pub async fn dashboard_counts(pool: &PgPool) -> anyhow::Result<DashboardCounts> {
    let row = sqlx::query(
        r#"
        SELECT
            (SELECT COUNT(*) FROM volunteer_evaluations.volunteers WHERE status = 'active')
                AS active_volunteers,
            (SELECT COUNT(*) FROM volunteer_evaluations.evaluations) AS total_evaluations
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(DashboardCounts {
        active_volunteers: row.get("active_volunteers"),
        total_evaluations: row.get("total_evaluations"),
    })
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        first_name: String,
        last_name: String,
        email: String,
        event_name: Option<String>,
        role_performed: Option<String>,
        evaluation_date: NaiveDate,
        reliability: Option<i16>,
        quality_of_work: Option<i16>,
        initiative: Option<i16>,
        teamwork: Option<i16>,
        communication: Option<i16>,
        evaluator_name: String,
        evaluator_email: Option<String>,
        evaluator_role: Option<String>,
        strengths: Option<String>,
        areas_for_improvement: Option<String>,
        additional_comments: Option<String>,
        submitted_at: Option<DateTime<Utc>>,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut tx = pool.begin().await?;
    let mut inserted = 0usize;

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("invalid CSV record {}", index + 1))?;

        let volunteer_id: Uuid = sqlx::query(
            r#"
            INSERT INTO volunteer_evaluations.volunteers
            (id, first_name, last_name, email, status)
            VALUES ($1, $2, $3, $4, 'active')
            ON CONFLICT (email) DO UPDATE
            SET first_name = EXCLUDED.first_name, last_name = EXCLUDED.last_name
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(row.first_name.trim())
        .bind(row.last_name.trim())
        .bind(row.email.trim())
        .fetch_one(&mut *tx)
        .await?
        .get("id");

        let evaluation = NewEvaluation {
            volunteer_id,
            event_name: row.event_name,
            role_performed: row.role_performed,
            evaluation_date: row.evaluation_date,
            ratings: Ratings {
                reliability: row.reliability,
                quality_of_work: row.quality_of_work,
                initiative: row.initiative,
                teamwork: row.teamwork,
                communication: row.communication,
            },
            strengths: row.strengths,
            areas_for_improvement: row.areas_for_improvement,
            additional_comments: row.additional_comments,
            evaluator_name: row.evaluator_name,
            evaluator_email: row.evaluator_email,
            evaluator_role: row.evaluator_role,
            submitted_at: row.submitted_at,
            source_key: Some(
                row.source_key
                    .unwrap_or_else(|| format!("import-{}", Uuid::new_v4())),
            ),
        };

        if insert_evaluation(&mut tx, &evaluation)
            .await
            .with_context(|| format!("failed to import CSV record {}", index + 1))?
            .is_some()
        {
            inserted += 1;
        }
    }

    tx.commit().await?;
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    #[test]
    fn evaluation_codes_are_zero_padded() {
        assert_eq!(format_evaluation_code(1), "EVAL-00001");
        assert_eq!(format_evaluation_code(4217), "EVAL-04217");
        assert_eq!(format_evaluation_code(123456), "EVAL-123456");
    }

    async fn test_pool() -> PgPool {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must name a scratch database");
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect(&url)
            .await
            .unwrap();
        init_db(&pool).await.unwrap();
        pool
    }

    async fn scratch_volunteer(pool: &PgPool, status: VolunteerStatus) -> Uuid {
        add_volunteer(
            pool,
            &NewVolunteer {
                first_name: "Jordan".to_string(),
                last_name: "Pike".to_string(),
                email: Some(format!("{}@example.test", Uuid::new_v4())),
                phone: None,
                status,
                first_volunteered_on: None,
            },
        )
        .await
        .unwrap()
    }

    fn submission(volunteer_id: Uuid) -> NewEvaluation {
        NewEvaluation {
            volunteer_id,
            event_name: None,
            role_performed: Some("Group Leader".to_string()),
            evaluation_date: NaiveDate::from_ymd_opt(2025, 6, 14).unwrap(),
            ratings: Ratings {
                reliability: Some(8),
                quality_of_work: Some(7),
                initiative: Some(9),
                teamwork: Some(8),
                communication: Some(6),
            },
            strengths: Some("Kept the route on time".to_string()),
            areas_for_improvement: None,
            additional_comments: None,
            evaluator_name: "Casey Ruiz".to_string(),
            evaluator_email: None,
            evaluator_role: None,
            submitted_at: None,
            source_key: None,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    #[ignore] // Requires a Postgres DATABASE_URL, run with --ignored
    async fn concurrent_duplicate_submissions_record_once() {
        let pool = test_pool().await;
        let volunteer_id = scratch_volunteer(&pool, VolunteerStatus::Active).await;
        let evaluation = submission(volunteer_id);

        let (first, second) = tokio::join!(
            submit_evaluation(&pool, &evaluation),
            submit_evaluation(&pool, &evaluation)
        );
        let outcomes = [first.unwrap(), second.unwrap()];
        let recorded = outcomes
            .iter()
            .filter(|outcome| matches!(outcome, SubmitOutcome::Recorded { .. }))
            .count();
        assert_eq!(recorded, 1);
        assert!(outcomes
            .iter()
            .any(|outcome| matches!(outcome, SubmitOutcome::Duplicate { .. })));

        assert_eq!(delete_volunteer(&pool, volunteer_id).await.unwrap(), Some(1));
    }

    #[tokio::test]
    #[ignore] // Requires a Postgres DATABASE_URL, run with --ignored
    async fn inactive_volunteer_submission_is_rejected() {
        let pool = test_pool().await;
        let volunteer_id = scratch_volunteer(&pool, VolunteerStatus::Inactive).await;

        let outcome = submit_evaluation(&pool, &submission(volunteer_id)).await.unwrap();
        assert_eq!(outcome, SubmitOutcome::VolunteerInactive);

        assert_eq!(delete_volunteer(&pool, volunteer_id).await.unwrap(), Some(0));
    }

    #[tokio::test]
    #[ignore] // Requires a Postgres DATABASE_URL, run with --ignored
    async fn edit_show_and_delete_volunteer() {
        let pool = test_pool().await;
        let volunteer_id = scratch_volunteer(&pool, VolunteerStatus::Active).await;

        let update = VolunteerUpdate {
            last_name: Some("  Pike-Moreno ".to_string()),
            ..VolunteerUpdate::default()
        };
        assert!(update_volunteer(&pool, volunteer_id, &update).await.unwrap());
        assert!(!update_volunteer(&pool, Uuid::new_v4(), &update).await.unwrap());

        let SubmitOutcome::Recorded { evaluation_code } =
            submit_evaluation(&pool, &submission(volunteer_id)).await.unwrap()
        else {
            panic!("evaluation was not recorded");
        };
        let shown = fetch_evaluation(&pool, &evaluation_code).await.unwrap().unwrap();
        assert_eq!(shown.volunteer_first_name, "Jordan");
        assert_eq!(shown.volunteer_last_name, "Pike-Moreno");
        assert_eq!(shown.evaluation.ratings.initiative, Some(9));

        assert_eq!(delete_volunteer(&pool, volunteer_id).await.unwrap(), Some(1));
        assert!(fetch_evaluation(&pool, &evaluation_code).await.unwrap().is_none());
        assert_eq!(delete_volunteer(&pool, volunteer_id).await.unwrap(), None);
    }
}
