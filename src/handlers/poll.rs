// src/handlers/poll.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    formats::{self, PollSummary},
    models::poll::{
        CreatePollRequest, Poll, PollFormat, PollListItem, PollResponse, PublicPoll, RawSubmission,
    },
};

const POLL_COLUMNS: &str = "id, question_text, choices, question_format, correct_answer, active, \
                            countdown_started, countdown_start_time, course_id, created_at";

async fn fetch_poll(pool: &SqlitePool, id: &str) -> Result<Poll, AppError> {
    sqlx::query_as::<_, Poll>(&format!("SELECT {} FROM polls WHERE id = ?1", POLL_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch poll: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?
        .ok_or(AppError::NotFound("Poll not found".to_string()))
}

pub(crate) async fn ensure_course_exists(pool: &SqlitePool, course_id: &str) -> Result<(), AppError> {
    sqlx::query("SELECT id FROM courses WHERE id = ?1")
        .bind(course_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .ok_or(AppError::NotFound("Course not found".to_string()))?;
    Ok(())
}

/// Query parameters for the list and active-poll endpoints.
#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub course_id: Option<String>,
}

/// Lists all polls with their response counts, newest first.
/// Professors only.
pub async fn list_polls(
    State(pool): State<SqlitePool>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, AppError> {
    let polls = sqlx::query_as::<_, PollListItem>(
        r#"
        SELECT p.id, p.question_text, p.choices, p.question_format, p.correct_answer, p.active,
               p.countdown_started, p.countdown_start_time, p.course_id, p.created_at,
               (SELECT COUNT(*) FROM poll_responses r WHERE r.poll_id = p.id) AS response_count
        FROM polls p
        WHERE (?1 IS NULL OR p.course_id = ?1)
        ORDER BY p.created_at DESC
        "#,
    )
    .bind(&params.course_id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list polls: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(polls))
}

/// Creates a new poll. The format is fixed at creation; only the active
/// flag and countdown fields are mutable afterwards.
/// Professors only.
pub async fn create_poll(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreatePollRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let tag = payload.question_format.as_deref().unwrap_or("single_choice");
    let format = PollFormat::parse(tag)
        .ok_or_else(|| AppError::BadRequest(format!("Unsupported poll format '{}'", tag)))?;

    if let Some(answer) = payload.correct_answer {
        if answer < 0 || answer as usize >= payload.choices.len() {
            return Err(AppError::BadRequest(
                "correct_answer must index into choices".to_string(),
            ));
        }
    }

    if let Some(course_id) = &payload.course_id {
        ensure_course_exists(&pool, course_id).await?;
    }

    let id = Uuid::new_v4().to_string();
    let choices_json = serde_json::to_string(&payload.choices)?;

    sqlx::query(
        r#"
        INSERT INTO polls
        (id, question_text, choices, question_format, correct_answer, active, countdown_started, course_id, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, 0, 0, ?6, ?7)
        "#,
    )
    .bind(&id)
    .bind(payload.question_text.trim())
    .bind(&choices_json)
    .bind(format.as_str())
    .bind(payload.correct_answer)
    .bind(&payload.course_id)
    .bind(Utc::now())
    .execute(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create poll: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((StatusCode::CREATED, Json(json!({"id": id}))))
}

/// Student-facing: the most recently created active poll, optionally
/// scoped to a course.
pub async fn get_active_poll(
    State(pool): State<SqlitePool>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, AppError> {
    let poll = sqlx::query_as::<_, Poll>(&format!(
        "SELECT {} FROM polls WHERE active = 1 AND (?1 IS NULL OR course_id = ?1) \
         ORDER BY created_at DESC LIMIT 1",
        POLL_COLUMNS
    ))
    .bind(&params.course_id)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch active poll: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?
    .ok_or(AppError::NotFound(
        "No active poll at the moment. Please wait for your instructor.".to_string(),
    ))?;

    Ok(Json(PublicPoll::from(poll)))
}

/// Retrieves a single poll for the display view.
pub async fn get_poll(
    State(pool): State<SqlitePool>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let poll = fetch_poll(&pool, &id.to_string()).await?;
    Ok(Json(poll))
}

/// Records a student submission.
///
/// The raw fields are decoded and validated by the codec registered for
/// the poll's format; a refused submission is a 400 and nothing is
/// persisted. A poll whose stored format tag is not supported refuses
/// all submissions.
pub async fn vote(
    State(pool): State<SqlitePool>,
    Path(id): Path<Uuid>,
    Json(raw): Json<RawSubmission>,
) -> Result<impl IntoResponse, AppError> {
    let poll = fetch_poll(&pool, &id.to_string()).await?;

    let format = poll.format().ok_or_else(|| {
        tracing::warn!(
            "Dropping submission for poll {}: unsupported format tag '{}'",
            poll.id,
            poll.question_format
        );
        AppError::BadRequest(format!(
            "Unsupported poll format '{}'",
            poll.question_format
        ))
    })?;

    let payload = formats::registry(format).decode(&poll, &raw)?;
    let choice_json = serde_json::to_string(&payload)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    sqlx::query("INSERT INTO poll_responses (id, poll_id, choice, created_at) VALUES (?1, ?2, ?3, ?4)")
        .bind(Uuid::new_v4().to_string())
        .bind(&poll.id)
        .bind(&choice_json)
        .bind(Utc::now())
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to record response: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    Ok((StatusCode::CREATED, Json(json!({"recorded": true}))))
}

/// Computes the results summary for a poll.
///
/// Reads the full response set and hands it to the aggregator registered
/// for the poll's format. Pure recomputation on every call; a poll with
/// an unsupported format tag renders the empty summary instead of
/// failing.
pub async fn poll_results(
    State(pool): State<SqlitePool>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let poll = fetch_poll(&pool, &id.to_string()).await?;

    let rows = sqlx::query_as::<_, PollResponse>(
        "SELECT id, poll_id, choice, created_at FROM poll_responses WHERE poll_id = ?1 ORDER BY created_at",
    )
    .bind(&poll.id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch responses: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let payloads: Vec<_> = rows.into_iter().map(|row| row.choice.0).collect();

    let summary = match poll.format() {
        Some(format) => formats::registry(format).aggregate(&poll, &payloads),
        None => {
            tracing::warn!(
                "Rendering empty results for poll {}: unsupported format tag '{}'",
                poll.id,
                poll.question_format
            );
            PollSummary::Empty { total: 0 }
        }
    };

    Ok(Json(summary))
}

/// Flips a poll's active flag. Last write wins; no transactional guard is
/// needed for this domain.
/// Professors only.
pub async fn toggle_poll_active(
    State(pool): State<SqlitePool>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let active = sqlx::query_scalar::<_, bool>(
        "UPDATE polls SET active = NOT active WHERE id = ?1 RETURNING active",
    )
    .bind(id.to_string())
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to toggle poll: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?
    .ok_or(AppError::NotFound("Poll not found".to_string()))?;

    Ok(Json(json!({"id": id, "active": active})))
}

/// Starts the countdown for a speed-ranking round. Overwrites any prior
/// countdown state.
/// Professors only.
pub async fn start_countdown(
    State(pool): State<SqlitePool>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let now = Utc::now();
    let result =
        sqlx::query("UPDATE polls SET countdown_started = 1, countdown_start_time = ?1 WHERE id = ?2")
            .bind(now)
            .bind(id.to_string())
            .execute(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to start countdown: {:?}", e);
                AppError::InternalServerError(e.to_string())
            })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Poll not found".to_string()));
    }

    Ok(Json(json!({
        "countdown_started": true,
        "countdown_start_time": now,
    })))
}

/// Deletes a poll and, through the schema's cascade, all of its
/// responses.
/// Professors only.
pub async fn delete_poll(
    State(pool): State<SqlitePool>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM polls WHERE id = ?1")
        .bind(id.to_string())
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete poll: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Poll not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
