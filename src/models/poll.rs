// src/models/poll.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

/// Answer format of a poll. Closed set; each tag selects the codec and
/// aggregator used at submission and results time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollFormat {
    SingleChoice,
    SpeedRanking,
    TeamBattle,
    MetaPrediction,
}

impl PollFormat {
    /// Parses a stored format tag. Returns `None` for tags outside the
    /// supported set so callers can degrade instead of failing the read.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "single_choice" => Some(Self::SingleChoice),
            "speed_ranking" => Some(Self::SpeedRanking),
            "team_battle" => Some(Self::TeamBattle),
            "meta_prediction" => Some(Self::MetaPrediction),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SingleChoice => "single_choice",
            Self::SpeedRanking => "speed_ranking",
            Self::TeamBattle => "team_battle",
            Self::MetaPrediction => "meta_prediction",
        }
    }
}

/// Represents the 'polls' table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Poll {
    pub id: String,

    pub question_text: String,

    /// Ordered choice labels. Order is significant: it is the index space
    /// that responses refer to.
    pub choices: Json<Vec<String>>,

    /// Raw format tag. Kept as text so a row with an unsupported tag still
    /// loads; parsed through `PollFormat::parse` at use sites.
    pub question_format: String,

    /// Index of the correct choice. Only meaningful for team battles.
    pub correct_answer: Option<i64>,

    pub active: bool,

    /// Countdown state for speed-ranking rounds.
    pub countdown_started: bool,
    pub countdown_start_time: Option<DateTime<Utc>>,

    pub course_id: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl Poll {
    pub fn format(&self) -> Option<PollFormat> {
        PollFormat::parse(&self.question_format)
    }

    pub fn choice_labels(&self) -> &[String] {
        &self.choices.0
    }
}

/// Represents the 'poll_responses' table. A response is created once per
/// submission and never mutated; it is removed only when the parent poll
/// is deleted.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PollResponse {
    pub id: String,
    pub poll_id: String,
    pub choice: Json<ResponsePayload>,
    pub created_at: DateTime<Utc>,
}

/// The stored response payload, one variant per poll format.
///
/// Serialized untagged so the JSON column keeps the historical shapes:
/// bare int (single choice), array of choice indices (speed ranking),
/// `{team, answer}` (team battle), `{predictions, answer}` (meta
/// prediction), plus the legacy bare team string from the schema version
/// that predates per-team answers. Legacy rows count toward participation
/// only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponsePayload {
    TeamBattle { team: String, answer: i64 },
    MetaPrediction { predictions: Vec<i64>, answer: i64 },
    SingleChoice(i64),
    SpeedRanking(Vec<i64>),
    LegacyTeam(String),
}

/// Raw body of the vote endpoint. Which fields are required depends on
/// the poll's format; the codec for that format checks them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSubmission {
    /// single_choice: selected choice index.
    pub choice: Option<i64>,
    /// speed_ranking: one rank value per choice index, 1-based.
    pub ranks: Option<Vec<i64>>,
    /// team_battle: "left" or "right".
    pub team: Option<String>,
    /// team_battle / meta_prediction: answer index.
    pub answer: Option<i64>,
    /// meta_prediction: percentage estimate per choice index. Missing
    /// entries default to 0.
    pub predictions: Option<Vec<i64>>,
}

/// DTO for creating a poll.
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePollRequest {
    #[validate(length(min = 1, max = 2000))]
    pub question_text: String,
    #[validate(custom(function = validate_choices))]
    pub choices: Vec<String>,
    /// Format tag; defaults to 'single_choice'. Immutable after creation.
    pub question_format: Option<String>,
    pub correct_answer: Option<i64>,
    pub course_id: Option<String>,
}

pub fn validate_choices(choices: &[String]) -> Result<(), validator::ValidationError> {
    if choices.len() < 2 {
        return Err(validator::ValidationError::new("at_least_two_choices"));
    }
    for choice in choices {
        if choice.trim().is_empty() {
            return Err(validator::ValidationError::new("choice_cannot_be_empty"));
        }
        if choice.len() > 500 {
            return Err(validator::ValidationError::new("choice_too_long"));
        }
    }
    Ok(())
}

/// Student-facing view of a poll (what the answer page needs).
#[derive(Debug, Serialize)]
pub struct PublicPoll {
    pub id: String,
    pub question: String,
    pub choices: Vec<String>,
    pub question_format: String,
    pub countdown_started: bool,
    pub countdown_start_time: Option<DateTime<Utc>>,
}

impl From<Poll> for PublicPoll {
    fn from(poll: Poll) -> Self {
        Self {
            id: poll.id,
            question: poll.question_text,
            choices: poll.choices.0,
            question_format: poll.question_format,
            countdown_started: poll.countdown_started,
            countdown_start_time: poll.countdown_start_time,
        }
    }
}

/// Manage-list row: a poll plus its recorded response count.
#[derive(Debug, Serialize, FromRow)]
pub struct PollListItem {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub poll: Poll,
    pub response_count: i64,
}
