// src/models/document.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};

/// Represents the 'documents' table: an uploaded piece of course material.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    /// Path of the stored upload, relative to the configured upload dir.
    pub file_path: String,
    pub course_id: Option<String>,
    pub uploaded_at: chrono::DateTime<chrono::Utc>,
}

/// Represents the 'generated_questions' table: an LLM-generated item
/// awaiting instructor review.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct GeneratedQuestion {
    pub id: String,
    pub document_id: String,
    pub text: String,
    pub choices: Json<Vec<String>>,
    /// 'pending', 'accepted' or 'rejected'.
    pub status: String,
    /// 'mcq' (becomes a poll) or 'exit' (becomes an exit ticket).
    pub kind: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for the review endpoint. Inline edits are applied before the
/// accept/reject action takes effect.
#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub question_id: String,
    /// 'accept' or 'reject'.
    pub action: String,
    pub text: Option<String>,
    pub choices: Option<Vec<String>>,
    /// Format for the poll created on accept; defaults to 'single_choice'.
    pub question_format: Option<String>,
    pub correct_answer: Option<i64>,
}
