// src/handlers/course.rs

use axum::{
    Json,
    extract::{Extension, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde_json::json;
use sqlx::SqlitePool;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    models::course::{Course, CreateCourseRequest, JoinCourseRequest},
    utils::jwt::Claims,
};

const JOIN_CODE_LEN: usize = 8;
const JOIN_CODE_ATTEMPTS: usize = 5;

fn generate_join_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(JOIN_CODE_LEN)
        .map(char::from)
        .collect::<String>()
        .to_uppercase()
}

/// Lists the courses the current user created or enrolled in.
pub async fn list_courses(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let courses = sqlx::query_as::<_, Course>(
        r#"
        SELECT DISTINCT c.id, c.name, c.join_code, c.created_by, c.created_at
        FROM courses c
        LEFT JOIN enrollments e ON e.course_id = c.id
        WHERE c.created_by = ?1 OR e.user_id = ?1
        ORDER BY c.created_at DESC
        "#,
    )
    .bind(&claims.sub)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list courses: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(courses))
}

/// Creates a new course with a fresh join code.
/// Professors only; the route shares its path with the list so the role
/// check lives here instead of in middleware.
pub async fn create_course(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateCourseRequest>,
) -> Result<impl IntoResponse, AppError> {
    if claims.role != "professor" {
        return Err(AppError::Forbidden("Professor role required".to_string()));
    }
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let id = Uuid::new_v4().to_string();

    // Join codes are random; retry the insert on the unlikely collision.
    for _ in 0..JOIN_CODE_ATTEMPTS {
        let join_code = generate_join_code();
        let result = sqlx::query(
            "INSERT INTO courses (id, name, join_code, created_by, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&id)
        .bind(payload.name.trim())
        .bind(&join_code)
        .bind(&claims.sub)
        .bind(Utc::now())
        .execute(&pool)
        .await;

        match result {
            Ok(_) => {
                return Ok((
                    StatusCode::CREATED,
                    Json(json!({
                        "id": id,
                        "name": payload.name.trim(),
                        "join_code": join_code,
                    })),
                ));
            }
            Err(e) if e.to_string().contains("UNIQUE constraint failed") => continue,
            Err(e) => {
                tracing::error!("Failed to create course: {:?}", e);
                return Err(AppError::InternalServerError(e.to_string()));
            }
        }
    }

    Err(AppError::InternalServerError(
        "Could not allocate a unique join code".to_string(),
    ))
}

/// Enrolls the current user in a course by join code.
pub async fn join_course(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<JoinCourseRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let course = sqlx::query_as::<_, Course>(
        "SELECT id, name, join_code, created_by, created_at FROM courses WHERE join_code = ?1",
    )
    .bind(payload.join_code.trim().to_uppercase())
    .fetch_optional(&pool)
    .await
    .map_err(|e| AppError::InternalServerError(e.to_string()))?
    .ok_or(AppError::NotFound("Invalid join code".to_string()))?;

    sqlx::query(
        "INSERT INTO enrollments (id, user_id, course_id, role, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&claims.sub)
    .bind(&course.id)
    .bind(&claims.role)
    .bind(Utc::now())
    .execute(&pool)
    .await
    .map_err(|e| {
        if e.to_string().contains("UNIQUE constraint failed") {
            AppError::Conflict("Already enrolled in this course".to_string())
        } else {
            tracing::error!("Failed to enroll: {:?}", e);
            AppError::InternalServerError(e.to_string())
        }
    })?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "course_id": course.id,
            "name": course.name,
        })),
    ))
}
