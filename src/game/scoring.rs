// Scoring rules: answering points reward speed and streaks, author points
// reward questions that are neither trivial nor unanswerable. Everything in
// this module is a pure function of its inputs.

use std::collections::{BTreeMap, HashMap};

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::room::models::{Answer, Player};

/// Points for an instant correct answer.
const MAX_BASE_SCORE: f64 = 1000.0;
/// Points lost by using the full time budget.
const SPEED_PENALTY: f64 = 500.0;
/// Decay constant for author points. Chosen so ~75% correct in a large
/// class lands near 80 points.
const AUTHOR_DECAY: f64 = 3.2;
/// Penalty for a question everyone answered correctly.
const TOO_EASY_PENALTY: i64 = -500;

/// Base score for a correct answer: linear decay from 1000 (instant)
/// to 500 (full time budget used).
pub fn base_score(time_to_answer_seconds: f64, question_timer_seconds: u32) -> i64 {
    let time_fraction = if question_timer_seconds == 0 {
        1.0
    } else {
        (time_to_answer_seconds.max(0.0) / question_timer_seconds as f64).min(1.0)
    };
    (MAX_BASE_SCORE - SPEED_PENALTY * time_fraction).round() as i64
}

/// Streak multiplier. The streak counts consecutive correct answers
/// including the current one.
pub fn streak_multiplier(streak: u32) -> f64 {
    match streak {
        s if s >= 5 => 1.5,
        4 => 1.3,
        3 => 1.2,
        2 => 1.1,
        _ => 1.0,
    }
}

/// Outcome of scoring one answer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnsweringPoints {
    pub points: i64,
    pub new_streak: u32,
}

/// Points for a single answer. Wrong (or missing) answers score zero and
/// reset the streak.
pub fn answering_points(
    is_correct: bool,
    time_to_answer_seconds: f64,
    question_timer_seconds: u32,
    streak_before: u32,
) -> AnsweringPoints {
    if !is_correct {
        return AnsweringPoints {
            points: 0,
            new_streak: 0,
        };
    }
    let new_streak = streak_before + 1;
    let base = base_score(time_to_answer_seconds, question_timer_seconds) as f64;
    let points = (base * streak_multiplier(new_streak)).round() as i64;
    AnsweringPoints { points, new_streak }
}

/// Author points from the non-author answer tallies.
///
/// Exactly one correct answer is the ideal (1000 points), decaying
/// exponentially as more respondents succeed. Everyone correct is a -500
/// penalty, nobody correct scores nothing, and fewer than two respondents
/// is too small a sample to judge.
pub fn author_points(total_non_author_answers: usize, wrong_count: usize) -> i64 {
    if total_non_author_answers < 2 {
        return 0;
    }
    let correct_count = total_non_author_answers - wrong_count;
    if correct_count == 0 {
        return 0;
    }
    if correct_count == total_non_author_answers {
        return TOO_EASY_PENALTY;
    }
    // Map 1 correct -> 0 and all correct -> 1 before decaying.
    let fraction = (correct_count - 1) as f64 / (total_non_author_answers - 1) as f64;
    (MAX_BASE_SCORE * (-AUTHOR_DECAY * fraction).exp()).round() as i64
}

/// Per-player result for one resolved question.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerAnswerResult {
    pub is_correct: bool,
    pub points: i64,
    pub new_streak: u32,
    /// Seconds taken, rounded to one decimal place. Non-answers report the
    /// full timer.
    pub time_to_answer: f64,
}

/// Aggregate outcome of resolving one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionOutcome {
    pub player_results: HashMap<String, PlayerAnswerResult>,
    pub author_points: i64,
    /// Submission counts per answer index, the author's own answer included.
    pub answer_distribution: BTreeMap<usize, u32>,
}

/// Scores every answer to a question in a single pass.
///
/// The author's own answer counts in the distribution but never in
/// `player_results` or the difficulty sample. Non-author players without a
/// recorded answer are scored as wrong with the full timer elapsed.
pub fn process_question_results(
    answers: &HashMap<String, Answer>,
    correct_index: usize,
    author_id: &str,
    players: &HashMap<String, Player>,
    question_start_ms: i64,
    question_timer_seconds: u32,
) -> QuestionOutcome {
    let mut player_results = HashMap::new();
    let mut answer_distribution: BTreeMap<usize, u32> = BTreeMap::new();
    let mut wrong_count = 0usize;
    let mut total_non_author_answers = 0usize;

    for (player_id, answer) in answers {
        *answer_distribution.entry(answer.answer_index).or_insert(0) += 1;

        if player_id == author_id {
            continue;
        }

        total_non_author_answers += 1;
        let is_correct = answer.answer_index == correct_index;
        if !is_correct {
            wrong_count += 1;
        }

        let time_to_answer =
            ((answer.timestamp_ms - question_start_ms) as f64 / 1000.0).max(0.0);
        let streak_before = players.get(player_id).map(|p| p.streak).unwrap_or(0);
        let scored = answering_points(
            is_correct,
            time_to_answer,
            question_timer_seconds,
            streak_before,
        );

        player_results.insert(
            player_id.clone(),
            PlayerAnswerResult {
                is_correct,
                points: scored.points,
                new_streak: scored.new_streak,
                time_to_answer: (time_to_answer * 10.0).round() / 10.0,
            },
        );
    }

    // Players who never answered score zero and lose their streak, and they
    // count against the question's difficulty the same as a wrong answer.
    for player_id in players.keys() {
        if player_id == author_id || answers.contains_key(player_id) {
            continue;
        }
        player_results.insert(
            player_id.clone(),
            PlayerAnswerResult {
                is_correct: false,
                points: 0,
                new_streak: 0,
                time_to_answer: question_timer_seconds as f64,
            },
        );
        total_non_author_answers += 1;
        wrong_count += 1;
    }

    QuestionOutcome {
        player_results,
        author_points: author_points(total_non_author_answers, wrong_count),
        answer_distribution,
    }
}

/// Fisher-Yates permutation of a copy of the input. The input is unchanged.
pub fn shuffled<T: Clone>(items: &[T]) -> Vec<T> {
    let mut copy = items.to_vec();
    copy.shuffle(&mut rand::rng());
    copy
}
