// src/formats/aggregate.rs
//
// Per-format result aggregation. Every function is a pure function of the
// poll and its stored responses, recomputed in full on each results call.
// All of them tolerate an empty response set: percentages and averages
// come back as 0 instead of dividing by zero. Payload variants that do
// not match the poll's format are skipped.

use serde::Serialize;

use crate::models::poll::{Poll, ResponsePayload};

/// Results summary, one variant per poll format. Serialized directly as
/// the results endpoint body, tagged by format.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum PollSummary {
    SingleChoice {
        total: u64,
        counts: Vec<ChoiceCount>,
    },
    SpeedRanking {
        total: u64,
        choices: Vec<RankingRow>,
    },
    TeamBattle {
        total: u64,
        left: TeamSide,
        right: TeamSide,
        /// "left", "right" or "tie".
        winner: String,
    },
    MetaPrediction {
        total: u64,
        choices: Vec<PredictionRow>,
        overall_accuracy: f64,
    },
    /// Rendered when a poll's stored format tag is not supported.
    Empty { total: u64 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChoiceCount {
    pub label: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingRow {
    pub label: String,
    /// `rank_counts[position]`: how many responses put this choice at
    /// that position (position 0 = rank 1).
    pub rank_counts: Vec<u64>,
    pub average_rank: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TeamSide {
    pub total: u64,
    pub correct: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRow {
    pub label: String,
    /// Average predicted percentage across responses.
    pub predicted: f64,
    /// Actual share of responses that picked this choice.
    pub actual: f64,
    pub actual_count: u64,
    /// `max(0, 100 - |predicted - actual|)`.
    pub accuracy: f64,
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Count per choice index, aligned with the poll's choice order.
pub(super) fn single_choice(poll: &Poll, responses: &[ResponsePayload]) -> PollSummary {
    let labels = poll.choice_labels();
    let mut counts = vec![0u64; labels.len()];

    for payload in responses {
        if let ResponsePayload::SingleChoice(choice) = payload {
            if let Some(slot) = usize::try_from(*choice)
                .ok()
                .and_then(|idx| counts.get_mut(idx))
            {
                *slot += 1;
            }
        }
    }

    let total = counts.iter().sum();
    let counts = labels
        .iter()
        .zip(counts)
        .map(|(label, count)| ChoiceCount {
            label: label.clone(),
            count,
        })
        .collect();

    PollSummary::SingleChoice { total, counts }
}

/// N x N rank matrix plus average earned rank per choice. A stored
/// sequence lists choice indices by rank, so position p contributes
/// rank p+1 to the choice found there.
pub(super) fn speed_ranking(poll: &Poll, responses: &[ResponsePayload]) -> PollSummary {
    let labels = poll.choice_labels();
    let n = labels.len();
    let mut rank_counts = vec![vec![0u64; n]; n];
    let mut total = 0u64;

    for payload in responses {
        if let ResponsePayload::SpeedRanking(sequence) = payload {
            total += 1;
            for (position, &value) in sequence.iter().enumerate() {
                if position >= n {
                    break;
                }
                if let Some(row) = usize::try_from(value)
                    .ok()
                    .and_then(|idx| rank_counts.get_mut(idx))
                {
                    row[position] += 1;
                }
            }
        }
    }

    let choices = labels
        .iter()
        .enumerate()
        .map(|(idx, label)| {
            let row = rank_counts[idx].clone();
            let average_rank = if total == 0 {
                0.0
            } else {
                let weighted: u64 = row
                    .iter()
                    .enumerate()
                    .map(|(position, count)| (position as u64 + 1) * count)
                    .sum();
                round2(weighted as f64 / total as f64)
            };
            RankingRow {
                label: label.clone(),
                rank_counts: row,
                average_rank,
            }
        })
        .collect();

    PollSummary::SpeedRanking { total, choices }
}

#[derive(Default)]
struct SideTally {
    total: u64,
    correct: u64,
}

impl SideTally {
    fn into_side(self) -> TeamSide {
        let percentage = if self.total == 0 {
            0.0
        } else {
            round1(self.correct as f64 / self.total as f64 * 100.0)
        };
        TeamSide {
            total: self.total,
            correct: self.correct,
            percentage,
        }
    }
}

/// Correctness shootout between the two sides. Legacy bare-string rows
/// (the schema version before per-team answers) count toward a side's
/// participation but not its correctness.
pub(super) fn team_battle(poll: &Poll, responses: &[ResponsePayload]) -> PollSummary {
    let mut left = SideTally::default();
    let mut right = SideTally::default();

    for payload in responses {
        match payload {
            ResponsePayload::TeamBattle { team, answer } => {
                let side = match team.as_str() {
                    "left" => &mut left,
                    "right" => &mut right,
                    _ => continue,
                };
                side.total += 1;
                if poll.correct_answer == Some(*answer) {
                    side.correct += 1;
                }
            }
            ResponsePayload::LegacyTeam(team) => {
                let side = match team.as_str() {
                    "left" => &mut left,
                    "right" => &mut right,
                    _ => continue,
                };
                side.total += 1;
            }
            _ => {}
        }
    }

    let left = left.into_side();
    let right = right.into_side();
    let winner = if left.percentage > right.percentage {
        "left"
    } else if right.percentage > left.percentage {
        "right"
    } else {
        "tie"
    };

    PollSummary::TeamBattle {
        total: left.total + right.total,
        left,
        right,
        winner: winner.to_string(),
    }
}

/// Average predicted percentage vs. the actual answer distribution, with
/// an accuracy score per choice and the mean accuracy overall.
pub(super) fn meta_prediction(poll: &Poll, responses: &[ResponsePayload]) -> PollSummary {
    let labels = poll.choice_labels();
    let entries: Vec<(&[i64], i64)> = responses
        .iter()
        .filter_map(|payload| match payload {
            ResponsePayload::MetaPrediction { predictions, answer } => {
                Some((predictions.as_slice(), *answer))
            }
            _ => None,
        })
        .collect();
    let total = entries.len() as u64;

    let mut choices = Vec::with_capacity(labels.len());
    let mut accuracy_sum = 0.0;
    for (idx, label) in labels.iter().enumerate() {
        let actual_count = entries
            .iter()
            .filter(|(_, answer)| *answer == idx as i64)
            .count() as u64;

        let (predicted, actual, accuracy) = if total == 0 {
            (0.0, 0.0, 0.0)
        } else {
            let predicted_sum: i64 = entries
                .iter()
                .map(|(predictions, _)| predictions.get(idx).copied().unwrap_or(0))
                .sum();
            let predicted = round1(predicted_sum as f64 / total as f64);
            let actual = round1(actual_count as f64 / total as f64 * 100.0);
            let accuracy = round1((100.0 - (predicted - actual).abs()).max(0.0));
            (predicted, actual, accuracy)
        };
        accuracy_sum += accuracy;

        choices.push(PredictionRow {
            label: label.clone(),
            predicted,
            actual,
            actual_count,
            accuracy,
        });
    }

    let overall_accuracy = if choices.is_empty() {
        0.0
    } else {
        round1(accuracy_sum / choices.len() as f64)
    };

    PollSummary::MetaPrediction {
        total,
        choices,
        overall_accuracy,
    }
}
