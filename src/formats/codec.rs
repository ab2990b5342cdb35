// src/formats/codec.rs
//
// Per-format submission decoding. Each function validates the raw fields
// against the poll's choice list and returns the payload that will be
// stored, or a `SubmitError` the vote handler turns into a 400.

use super::SubmitError;
use crate::models::poll::{Poll, RawSubmission, ResponsePayload};

fn check_index(field: &'static str, value: i64, len: usize) -> Result<(), SubmitError> {
    if value < 0 || value as usize >= len {
        return Err(SubmitError::OutOfRange { field, value, len });
    }
    Ok(())
}

/// single_choice: one choice index in `[0, N)`, stored as a bare int.
pub(super) fn decode_single_choice(
    poll: &Poll,
    raw: &RawSubmission,
) -> Result<ResponsePayload, SubmitError> {
    let choice = raw.choice.ok_or(SubmitError::MissingField("choice"))?;
    check_index("choice", choice, poll.choice_labels().len())?;
    Ok(ResponsePayload::SingleChoice(choice))
}

/// speed_ranking: one rank value per choice index, each in `[1, N]`, the
/// whole set covering `1..=N` exactly. Stored as the choice indices
/// ordered by earned rank (position 0 = rank 1). The sort is stable, so
/// equal ranks would keep submission order, though validation rules
/// duplicates out.
pub(super) fn decode_speed_ranking(
    poll: &Poll,
    raw: &RawSubmission,
) -> Result<ResponsePayload, SubmitError> {
    let n = poll.choice_labels().len();
    let ranks = raw.ranks.as_ref().ok_or(SubmitError::MissingField("ranks"))?;

    if ranks.len() != n {
        return Err(SubmitError::WrongRankCount {
            expected: n,
            got: ranks.len(),
        });
    }

    let mut seen = vec![false; n];
    for &rank in ranks {
        if rank < 1 || rank as usize > n {
            return Err(SubmitError::OutOfRange {
                field: "ranks",
                value: rank,
                len: n,
            });
        }
        if seen[rank as usize - 1] {
            return Err(SubmitError::DuplicateRank);
        }
        seen[rank as usize - 1] = true;
    }
    // n distinct values in [1, n]: every rank is covered, no gaps possible.

    let mut order: Vec<i64> = (0..n as i64).collect();
    order.sort_by_key(|&idx| ranks[idx as usize]);
    Ok(ResponsePayload::SpeedRanking(order))
}

/// team_battle: a team tag plus an answer index. The tag is stored as
/// submitted; it is matched against "left"/"right" at aggregation time.
pub(super) fn decode_team_battle(
    poll: &Poll,
    raw: &RawSubmission,
) -> Result<ResponsePayload, SubmitError> {
    let team = raw.team.clone().ok_or(SubmitError::MissingField("team"))?;
    let answer = raw.answer.ok_or(SubmitError::MissingField("answer"))?;
    check_index("answer", answer, poll.choice_labels().len())?;
    Ok(ResponsePayload::TeamBattle { team, answer })
}

/// meta_prediction: a percentage estimate per choice index plus the
/// submitter's own answer index. Missing estimates default to 0; extras
/// beyond the choice count are dropped.
pub(super) fn decode_meta_prediction(
    poll: &Poll,
    raw: &RawSubmission,
) -> Result<ResponsePayload, SubmitError> {
    let n = poll.choice_labels().len();
    let answer = raw.answer.ok_or(SubmitError::MissingField("answer"))?;
    check_index("answer", answer, n)?;

    let mut predictions = raw.predictions.clone().unwrap_or_default();
    predictions.resize(n, 0);
    Ok(ResponsePayload::MetaPrediction { predictions, answer })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::poll::PollFormat;
    use chrono::Utc;
    use sqlx::types::Json;

    fn poll(format: PollFormat, choices: &[&str]) -> Poll {
        Poll {
            id: "test-poll".to_string(),
            question_text: "Which statement best describes formative assessment?".to_string(),
            choices: Json(choices.iter().map(|c| c.to_string()).collect()),
            question_format: format.as_str().to_string(),
            correct_answer: None,
            active: true,
            countdown_started: false,
            countdown_start_time: None,
            course_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn single_choice_accepts_in_range_index() {
        let poll = poll(PollFormat::SingleChoice, &["A", "B", "C"]);
        let raw = RawSubmission {
            choice: Some(2),
            ..Default::default()
        };
        assert_eq!(
            decode_single_choice(&poll, &raw),
            Ok(ResponsePayload::SingleChoice(2))
        );
    }

    #[test]
    fn single_choice_rejects_index_equal_to_len() {
        let poll = poll(PollFormat::SingleChoice, &["A", "B", "C"]);
        let raw = RawSubmission {
            choice: Some(3),
            ..Default::default()
        };
        assert_eq!(
            decode_single_choice(&poll, &raw),
            Err(SubmitError::OutOfRange {
                field: "choice",
                value: 3,
                len: 3
            })
        );
    }

    #[test]
    fn single_choice_rejects_negative_and_missing() {
        let poll = poll(PollFormat::SingleChoice, &["A", "B"]);
        let negative = RawSubmission {
            choice: Some(-1),
            ..Default::default()
        };
        assert!(decode_single_choice(&poll, &negative).is_err());

        let missing = RawSubmission::default();
        assert_eq!(
            decode_single_choice(&poll, &missing),
            Err(SubmitError::MissingField("choice"))
        );
    }

    #[test]
    fn speed_ranking_orders_indices_by_rank() {
        let poll = poll(PollFormat::SpeedRanking, &["A", "B", "C", "D"]);
        let raw = RawSubmission {
            ranks: Some(vec![2, 1, 4, 3]),
            ..Default::default()
        };
        assert_eq!(
            decode_speed_ranking(&poll, &raw),
            Ok(ResponsePayload::SpeedRanking(vec![1, 0, 3, 2]))
        );
    }

    #[test]
    fn speed_ranking_rejects_duplicate_ranks() {
        let poll = poll(PollFormat::SpeedRanking, &["A", "B", "C", "D"]);
        let raw = RawSubmission {
            ranks: Some(vec![1, 1, 2, 3]),
            ..Default::default()
        };
        let err = decode_speed_ranking(&poll, &raw).unwrap_err();
        assert_eq!(err, SubmitError::DuplicateRank);
        assert_eq!(err.to_string(), "duplicate rank");
    }

    #[test]
    fn speed_ranking_rejects_wrong_count_and_out_of_range() {
        let poll = poll(PollFormat::SpeedRanking, &["A", "B", "C"]);
        let short = RawSubmission {
            ranks: Some(vec![1, 2]),
            ..Default::default()
        };
        assert_eq!(
            decode_speed_ranking(&poll, &short),
            Err(SubmitError::WrongRankCount {
                expected: 3,
                got: 2
            })
        );

        let zero_based = RawSubmission {
            ranks: Some(vec![0, 1, 2]),
            ..Default::default()
        };
        assert!(matches!(
            decode_speed_ranking(&poll, &zero_based),
            Err(SubmitError::OutOfRange { .. })
        ));
    }

    #[test]
    fn team_battle_keeps_team_tag_as_submitted() {
        let poll = poll(PollFormat::TeamBattle, &["A", "B"]);
        let raw = RawSubmission {
            team: Some("left".to_string()),
            answer: Some(1),
            ..Default::default()
        };
        assert_eq!(
            decode_team_battle(&poll, &raw),
            Ok(ResponsePayload::TeamBattle {
                team: "left".to_string(),
                answer: 1
            })
        );
    }

    #[test]
    fn team_battle_requires_team_and_valid_answer() {
        let poll = poll(PollFormat::TeamBattle, &["A", "B"]);
        let no_team = RawSubmission {
            answer: Some(0),
            ..Default::default()
        };
        assert_eq!(
            decode_team_battle(&poll, &no_team),
            Err(SubmitError::MissingField("team"))
        );

        let bad_answer = RawSubmission {
            team: Some("right".to_string()),
            answer: Some(2),
            ..Default::default()
        };
        assert!(matches!(
            decode_team_battle(&poll, &bad_answer),
            Err(SubmitError::OutOfRange { .. })
        ));
    }

    #[test]
    fn meta_prediction_pads_missing_estimates_with_zero() {
        let poll = poll(PollFormat::MetaPrediction, &["A", "B", "C"]);
        let raw = RawSubmission {
            predictions: Some(vec![60]),
            answer: Some(0),
            ..Default::default()
        };
        assert_eq!(
            decode_meta_prediction(&poll, &raw),
            Ok(ResponsePayload::MetaPrediction {
                predictions: vec![60, 0, 0],
                answer: 0
            })
        );
    }

    #[test]
    fn meta_prediction_requires_answer_in_range() {
        let poll = poll(PollFormat::MetaPrediction, &["A", "B"]);
        let missing = RawSubmission {
            predictions: Some(vec![50, 50]),
            ..Default::default()
        };
        assert_eq!(
            decode_meta_prediction(&poll, &missing),
            Err(SubmitError::MissingField("answer"))
        );

        let out_of_range = RawSubmission {
            predictions: Some(vec![50, 50]),
            answer: Some(2),
            ..Default::default()
        };
        assert!(decode_meta_prediction(&poll, &out_of_range).is_err());
    }

    #[test]
    fn stored_payload_shapes_match_the_historical_encodings() {
        // The JSON column keeps the shapes older rows were written with,
        // including the bare team string from the pre-answer schema.
        let single = serde_json::to_string(&ResponsePayload::SingleChoice(2)).unwrap();
        assert_eq!(single, "2");

        let ranking =
            serde_json::to_string(&ResponsePayload::SpeedRanking(vec![1, 0])).unwrap();
        assert_eq!(ranking, "[1,0]");

        let legacy: ResponsePayload = serde_json::from_str("\"left\"").unwrap();
        assert_eq!(legacy, ResponsePayload::LegacyTeam("left".to_string()));

        let battle: ResponsePayload =
            serde_json::from_str(r#"{"team":"right","answer":1}"#).unwrap();
        assert_eq!(
            battle,
            ResponsePayload::TeamBattle {
                team: "right".to_string(),
                answer: 1
            }
        );
    }
}
