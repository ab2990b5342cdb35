// src/models/exit_ticket.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'exit_tickets' table: a free-text reflection prompt.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ExitTicket {
    pub id: String,
    pub prompt_text: String,
    pub active: bool,
    pub course_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A single free-text answer, cascade-deleted with its ticket.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ExitTicketResponse {
    pub id: String,
    pub ticket_id: String,
    pub answer: String,
    pub created_at: DateTime<Utc>,
}

/// DTO for creating an exit ticket.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTicketRequest {
    #[validate(length(min = 1, max = 2000))]
    pub prompt_text: String,
    pub course_id: Option<String>,
}

/// DTO for submitting an answer.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitTicketRequest {
    #[validate(length(min = 1, max = 5000))]
    pub answer: String,
}

/// Results-view row: answer text plus submission time.
#[derive(Debug, Serialize, FromRow)]
pub struct TicketAnswer {
    pub answer: String,
    pub created_at: DateTime<Utc>,
}

/// Manage-list row: a ticket plus its response count.
#[derive(Debug, Serialize, FromRow)]
pub struct TicketListItem {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub ticket: ExitTicket,
    pub response_count: i64,
}
