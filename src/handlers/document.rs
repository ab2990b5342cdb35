// src/handlers/document.rs

use std::path::Path as FsPath;

use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::{Value, json};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    error::AppError,
    llm,
    models::document::{Document, GeneratedQuestion, ReviewRequest},
    models::poll::PollFormat,
    state::AppState,
    utils::extract::extract_text_from_file,
};

use super::poll::ensure_course_exists;

const MAX_GENERATED_QUESTIONS: usize = 6;
/// Inline edits keep at most this many choices, like the review form.
const MAX_EDITED_CHOICES: usize = 4;

/// Lists recent uploads, newest first.
/// Professors only.
pub async fn list_documents(
    State(pool): State<SqlitePool>,
) -> Result<impl IntoResponse, AppError> {
    let documents = sqlx::query_as::<_, Document>(
        "SELECT id, title, file_path, course_id, uploaded_at FROM documents \
         ORDER BY uploaded_at DESC LIMIT 20",
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list documents: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(documents))
}

/// Uploads course material and generates review-pending questions from it.
///
/// Multipart fields: `file` (required), `title`, `course_id`. The stored
/// file is run through text extraction and the question generator; the
/// response carries the generation diagnostic so the instructor can see
/// whether the model or the mock set produced the items.
/// Professors only.
pub async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut title: Option<String> = None;
    let mut course_id: Option<String> = None;
    let mut file_name: Option<String> = None;
    let mut file_bytes: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => {
                title = Some(field.text().await.map_err(|e| AppError::BadRequest(e.to_string()))?)
            }
            "course_id" => {
                course_id =
                    Some(field.text().await.map_err(|e| AppError::BadRequest(e.to_string()))?)
            }
            "file" => {
                file_name = field.file_name().map(|name| name.to_string());
                file_bytes = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| AppError::BadRequest(e.to_string()))?
                        .to_vec(),
                );
            }
            _ => {}
        }
    }

    let bytes = file_bytes.ok_or(AppError::BadRequest("Missing file field".to_string()))?;
    let original_name = file_name.unwrap_or_else(|| "upload.txt".to_string());
    let title = title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| original_name.clone());
    let course_id = course_id.filter(|c| !c.trim().is_empty());

    if let Some(course) = &course_id {
        ensure_course_exists(&state.pool, course).await?;
    }

    let doc_id = Uuid::new_v4().to_string();
    let stored_name = format!("{}_{}", doc_id, original_name);
    let upload_dir = FsPath::new(&state.config.upload_dir);
    tokio::fs::create_dir_all(upload_dir)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    let stored_path = upload_dir.join(&stored_name);
    tokio::fs::write(&stored_path, &bytes)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    let text = extract_text_from_file(&stored_path).await;
    let (items, diagnostic) =
        llm::generate_questions(&state.config, &text, MAX_GENERATED_QUESTIONS).await;

    sqlx::query(
        "INSERT INTO documents (id, title, file_path, course_id, uploaded_at) VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(&doc_id)
    .bind(&title)
    .bind(&stored_name)
    .bind(&course_id)
    .bind(Utc::now())
    .execute(&state.pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create document: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    for item in &items {
        let choices_json = serde_json::to_string(&item.choices)?;
        sqlx::query(
            "INSERT INTO generated_questions (id, document_id, text, choices, status, kind, created_at) \
             VALUES (?1, ?2, ?3, ?4, 'pending', 'mcq', ?5)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&doc_id)
        .bind(&item.text)
        .bind(&choices_json)
        .bind(Utc::now())
        .execute(&state.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to store generated question: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;
    }

    tracing::info!(
        "Generated {} questions for document {} via {}",
        items.len(),
        doc_id,
        diagnostic.source
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "id": doc_id,
            "title": title,
            "question_count": items.len(),
            "generation": diagnostic,
        })),
    ))
}

/// Deletes a document, its generated questions (cascade) and its stored
/// file.
/// Professors only.
pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let document = sqlx::query_as::<_, Document>(
        "SELECT id, title, file_path, course_id, uploaded_at FROM documents WHERE id = ?1",
    )
    .bind(id.to_string())
    .fetch_optional(&state.pool)
    .await
    .map_err(|e| AppError::InternalServerError(e.to_string()))?
    .ok_or(AppError::NotFound("Document not found".to_string()))?;

    sqlx::query("DELETE FROM documents WHERE id = ?1")
        .bind(&document.id)
        .execute(&state.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete document: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    // Best-effort file cleanup; the row is already gone.
    let stored_path = FsPath::new(&state.config.upload_dir).join(&document.file_path);
    tokio::fs::remove_file(stored_path).await.ok();

    Ok(StatusCode::NO_CONTENT)
}

/// Lists a document's questions still awaiting review.
/// Professors only.
pub async fn list_generated_questions(
    State(pool): State<SqlitePool>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    sqlx::query("SELECT id FROM documents WHERE id = ?1")
        .bind(id.to_string())
        .fetch_optional(&pool)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .ok_or(AppError::NotFound("Document not found".to_string()))?;

    let questions = sqlx::query_as::<_, GeneratedQuestion>(
        "SELECT id, document_id, text, choices, status, kind, created_at \
         FROM generated_questions WHERE document_id = ?1 AND status = 'pending' \
         ORDER BY created_at",
    )
    .bind(id.to_string())
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list generated questions: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(questions))
}

/// Review workflow: applies any inline edits, then accepts or rejects a
/// pending generated question. Accepting an 'mcq' item creates a poll in
/// the requested format; accepting an 'exit' item creates an exit ticket.
/// Professors only.
pub async fn review_question(
    State(pool): State<SqlitePool>,
    Path(doc_id): Path<Uuid>,
    Json(payload): Json<ReviewRequest>,
) -> Result<impl IntoResponse, AppError> {
    let question = sqlx::query_as::<_, GeneratedQuestion>(
        "SELECT id, document_id, text, choices, status, kind, created_at \
         FROM generated_questions WHERE id = ?1 AND document_id = ?2",
    )
    .bind(&payload.question_id)
    .bind(doc_id.to_string())
    .fetch_optional(&pool)
    .await
    .map_err(|e| AppError::InternalServerError(e.to_string()))?
    .ok_or(AppError::NotFound("Generated question not found".to_string()))?;

    if question.status != "pending" {
        return Err(AppError::Conflict("Question already reviewed".to_string()));
    }

    // Inline edits, applied before the action takes effect.
    let text = payload
        .text
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(&question.text)
        .to_string();
    let choices: Vec<String> = match &payload.choices {
        Some(edited) => {
            let cleaned: Vec<String> = edited
                .iter()
                .map(|choice| choice.trim().to_string())
                .filter(|choice| !choice.is_empty())
                .take(MAX_EDITED_CHOICES)
                .collect();
            if cleaned.is_empty() {
                question.choices.0.clone()
            } else {
                cleaned
            }
        }
        None => question.choices.0.clone(),
    };
    let choices_json = serde_json::to_string(&choices)?;

    let (status, body): (StatusCode, Value) = match payload.action.as_str() {
        "reject" => {
            sqlx::query(
                "UPDATE generated_questions SET text = ?1, choices = ?2, status = 'rejected' WHERE id = ?3",
            )
            .bind(&text)
            .bind(&choices_json)
            .bind(&question.id)
            .execute(&pool)
            .await
            .map_err(|e| AppError::InternalServerError(e.to_string()))?;

            (StatusCode::OK, json!({"status": "rejected"}))
        }
        "accept" => {
            let created = if question.kind == "exit" {
                let ticket_id = Uuid::new_v4().to_string();
                sqlx::query(
                    "INSERT INTO exit_tickets (id, prompt_text, active, created_at) VALUES (?1, ?2, 0, ?3)",
                )
                .bind(&ticket_id)
                .bind(&text)
                .bind(Utc::now())
                .execute(&pool)
                .await
                .map_err(|e| AppError::InternalServerError(e.to_string()))?;

                json!({"status": "accepted", "ticket_id": ticket_id})
            } else {
                let tag = payload.question_format.as_deref().unwrap_or("single_choice");
                let format = PollFormat::parse(tag).ok_or_else(|| {
                    AppError::BadRequest(format!("Unsupported poll format '{}'", tag))
                })?;
                if choices.len() < 2 {
                    return Err(AppError::BadRequest(
                        "A poll needs at least two choices".to_string(),
                    ));
                }
                if let Some(answer) = payload.correct_answer {
                    if answer < 0 || answer as usize >= choices.len() {
                        return Err(AppError::BadRequest(
                            "correct_answer must index into choices".to_string(),
                        ));
                    }
                }

                let poll_id = Uuid::new_v4().to_string();
                sqlx::query(
                    r#"
                    INSERT INTO polls
                    (id, question_text, choices, question_format, correct_answer, active, countdown_started, created_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, 0, 0, ?6)
                    "#,
                )
                .bind(&poll_id)
                .bind(&text)
                .bind(&choices_json)
                .bind(format.as_str())
                .bind(payload.correct_answer)
                .bind(Utc::now())
                .execute(&pool)
                .await
                .map_err(|e| AppError::InternalServerError(e.to_string()))?;

                json!({"status": "accepted", "poll_id": poll_id})
            };

            sqlx::query(
                "UPDATE generated_questions SET text = ?1, choices = ?2, status = 'accepted' WHERE id = ?3",
            )
            .bind(&text)
            .bind(&choices_json)
            .bind(&question.id)
            .execute(&pool)
            .await
            .map_err(|e| AppError::InternalServerError(e.to_string()))?;

            (StatusCode::CREATED, created)
        }
        other => {
            return Err(AppError::BadRequest(format!(
                "Unknown review action '{}'",
                other
            )));
        }
    };

    Ok((status, Json(body)))
}
