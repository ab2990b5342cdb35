// src/formats/mod.rs
//
// Format dispatch for poll submissions and results. Each poll format has
// a codec (validate + encode a raw submission) and an aggregator (compute
// the results summary); the registry maps a format tag to its pair so
// handlers never branch over formats themselves.

pub mod aggregate;
pub mod codec;

use std::fmt;

pub use aggregate::{ChoiceCount, PollSummary, PredictionRow, RankingRow, TeamSide};

use crate::models::poll::{Poll, PollFormat, RawSubmission, ResponsePayload};

/// Why a submission was refused. Human-readable through `Display`; the
/// vote handler surfaces it as a 400 and persists nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    MissingField(&'static str),
    OutOfRange {
        field: &'static str,
        value: i64,
        len: usize,
    },
    WrongRankCount {
        expected: usize,
        got: usize,
    },
    DuplicateRank,
    UnknownFormat(String),
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::MissingField(field) => {
                write!(f, "Missing required field '{}'", field)
            }
            SubmitError::OutOfRange { field, value, len } => {
                write!(
                    f,
                    "Value {} for '{}' is out of range for {} choices",
                    value, field, len
                )
            }
            SubmitError::WrongRankCount { expected, got } => {
                write!(f, "Expected {} ranks, got {}", expected, got)
            }
            SubmitError::DuplicateRank => write!(f, "duplicate rank"),
            SubmitError::UnknownFormat(tag) => {
                write!(f, "Unsupported poll format '{}'", tag)
            }
        }
    }
}

impl std::error::Error for SubmitError {}

/// Codec + aggregator pair for one poll format.
///
/// Adding a fifth format is one new impl plus one arm in `registry`; no
/// handler changes.
pub trait FormatStrategy: Send + Sync {
    /// Validates the raw submitted fields and produces the storage payload.
    /// Never persists anything itself.
    fn decode(&self, poll: &Poll, raw: &RawSubmission) -> Result<ResponsePayload, SubmitError>;

    /// Computes the results summary from the full response set. Pure:
    /// recomputed on every call, tolerates an empty set.
    fn aggregate(&self, poll: &Poll, responses: &[ResponsePayload]) -> PollSummary;
}

struct SingleChoiceFormat;
struct SpeedRankingFormat;
struct TeamBattleFormat;
struct MetaPredictionFormat;

impl FormatStrategy for SingleChoiceFormat {
    fn decode(&self, poll: &Poll, raw: &RawSubmission) -> Result<ResponsePayload, SubmitError> {
        codec::decode_single_choice(poll, raw)
    }

    fn aggregate(&self, poll: &Poll, responses: &[ResponsePayload]) -> PollSummary {
        aggregate::single_choice(poll, responses)
    }
}

impl FormatStrategy for SpeedRankingFormat {
    fn decode(&self, poll: &Poll, raw: &RawSubmission) -> Result<ResponsePayload, SubmitError> {
        codec::decode_speed_ranking(poll, raw)
    }

    fn aggregate(&self, poll: &Poll, responses: &[ResponsePayload]) -> PollSummary {
        aggregate::speed_ranking(poll, responses)
    }
}

impl FormatStrategy for TeamBattleFormat {
    fn decode(&self, poll: &Poll, raw: &RawSubmission) -> Result<ResponsePayload, SubmitError> {
        codec::decode_team_battle(poll, raw)
    }

    fn aggregate(&self, poll: &Poll, responses: &[ResponsePayload]) -> PollSummary {
        aggregate::team_battle(poll, responses)
    }
}

impl FormatStrategy for MetaPredictionFormat {
    fn decode(&self, poll: &Poll, raw: &RawSubmission) -> Result<ResponsePayload, SubmitError> {
        codec::decode_meta_prediction(poll, raw)
    }

    fn aggregate(&self, poll: &Poll, responses: &[ResponsePayload]) -> PollSummary {
        aggregate::meta_prediction(poll, responses)
    }
}

/// Looks up the strategy for a format. The set is closed; the enum keeps
/// the dispatch exhaustive.
pub fn registry(format: PollFormat) -> &'static dyn FormatStrategy {
    match format {
        PollFormat::SingleChoice => &SingleChoiceFormat,
        PollFormat::SpeedRanking => &SpeedRankingFormat,
        PollFormat::TeamBattle => &TeamBattleFormat,
        PollFormat::MetaPrediction => &MetaPredictionFormat,
    }
}
