// src/models/course.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'courses' table. Students enroll with the join code.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    pub name: String,
    pub join_code: String,
    pub created_by: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for creating a course.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCourseRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
}

/// DTO for joining a course by code.
#[derive(Debug, Deserialize, Validate)]
pub struct JoinCourseRequest {
    #[validate(length(min = 1, max = 12))]
    pub join_code: String,
}
