// src/handlers/exit_ticket.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use sqlx::SqlitePool;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    models::exit_ticket::{
        CreateTicketRequest, ExitTicket, SubmitTicketRequest, TicketAnswer, TicketListItem,
    },
};

use super::poll::{ListParams, ensure_course_exists};

async fn fetch_ticket(pool: &SqlitePool, id: &str) -> Result<ExitTicket, AppError> {
    sqlx::query_as::<_, ExitTicket>(
        "SELECT id, prompt_text, active, course_id, created_at FROM exit_tickets WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch exit ticket: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?
    .ok_or(AppError::NotFound("Exit ticket not found".to_string()))
}

/// Lists all exit tickets with their response counts, newest first.
/// Professors only.
pub async fn list_tickets(
    State(pool): State<SqlitePool>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, AppError> {
    let tickets = sqlx::query_as::<_, TicketListItem>(
        r#"
        SELECT t.id, t.prompt_text, t.active, t.course_id, t.created_at,
               (SELECT COUNT(*) FROM exit_ticket_responses r WHERE r.ticket_id = t.id) AS response_count
        FROM exit_tickets t
        WHERE (?1 IS NULL OR t.course_id = ?1)
        ORDER BY t.created_at DESC
        "#,
    )
    .bind(&params.course_id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list exit tickets: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(tickets))
}

/// Creates an exit ticket.
/// Professors only.
pub async fn create_ticket(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateTicketRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    if let Some(course_id) = &payload.course_id {
        ensure_course_exists(&pool, course_id).await?;
    }

    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO exit_tickets (id, prompt_text, active, course_id, created_at) VALUES (?1, ?2, 0, ?3, ?4)",
    )
    .bind(&id)
    .bind(payload.prompt_text.trim())
    .bind(&payload.course_id)
    .bind(Utc::now())
    .execute(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create exit ticket: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((StatusCode::CREATED, Json(json!({"id": id}))))
}

/// Student-facing: the most recently created active ticket, optionally
/// scoped to a course.
pub async fn get_active_ticket(
    State(pool): State<SqlitePool>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, AppError> {
    let ticket = sqlx::query_as::<_, ExitTicket>(
        "SELECT id, prompt_text, active, course_id, created_at FROM exit_tickets \
         WHERE active = 1 AND (?1 IS NULL OR course_id = ?1) ORDER BY created_at DESC LIMIT 1",
    )
    .bind(&params.course_id)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch active ticket: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?
    .ok_or(AppError::NotFound(
        "No active exit ticket at the moment.".to_string(),
    ))?;

    Ok(Json(ticket))
}

/// Retrieves a single ticket for the answer view.
pub async fn get_ticket(
    State(pool): State<SqlitePool>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let ticket = fetch_ticket(&pool, &id.to_string()).await?;
    Ok(Json(ticket))
}

/// Records a free-text answer to a ticket.
pub async fn submit_ticket_response(
    State(pool): State<SqlitePool>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SubmitTicketRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }
    let answer = payload.answer.trim();
    if answer.is_empty() {
        return Err(AppError::BadRequest("Answer cannot be empty".to_string()));
    }

    let ticket = fetch_ticket(&pool, &id.to_string()).await?;

    sqlx::query(
        "INSERT INTO exit_ticket_responses (id, ticket_id, answer, created_at) VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&ticket.id)
    .bind(answer)
    .bind(Utc::now())
    .execute(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to record ticket response: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((StatusCode::CREATED, Json(json!({"recorded": true}))))
}

/// Results view: all answers for a ticket, newest first, plus the count.
/// Professors only.
pub async fn ticket_results(
    State(pool): State<SqlitePool>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let ticket = fetch_ticket(&pool, &id.to_string()).await?;

    let responses = sqlx::query_as::<_, TicketAnswer>(
        "SELECT answer, created_at FROM exit_ticket_responses WHERE ticket_id = ?1 ORDER BY created_at DESC",
    )
    .bind(&ticket.id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch ticket responses: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(json!({
        "ticket": ticket,
        "total": responses.len(),
        "responses": responses,
    })))
}

/// Flips a ticket's active flag.
/// Professors only.
pub async fn toggle_ticket_active(
    State(pool): State<SqlitePool>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let active = sqlx::query_scalar::<_, bool>(
        "UPDATE exit_tickets SET active = NOT active WHERE id = ?1 RETURNING active",
    )
    .bind(id.to_string())
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to toggle ticket: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?
    .ok_or(AppError::NotFound("Exit ticket not found".to_string()))?;

    Ok(Json(json!({"id": id, "active": active})))
}

/// Deletes a ticket and, through the cascade, its responses.
/// Professors only.
pub async fn delete_ticket(
    State(pool): State<SqlitePool>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM exit_tickets WHERE id = ?1")
        .bind(id.to_string())
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete ticket: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Exit ticket not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
