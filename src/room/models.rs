use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Maximum player display name length (characters).
pub const NAME_MAX_CHARS: usize = 20;
/// Maximum question text length (characters).
pub const QUESTION_TEXT_MAX_CHARS: usize = 200;
/// Number of avatars in the fixed catalog (ids 1..=26).
pub const AVATAR_CATALOG_SIZE: u8 = 26;
/// Option count for multiple choice questions.
pub const MULTIPLE_CHOICE_OPTIONS: usize = 4;
/// Option count for true/false questions.
pub const TRUE_FALSE_OPTIONS: usize = 2;

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Room lifecycle phase. Transitions are strictly forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Lobby,
    Writing,
    Review,
    Quiz,
    Results,
}

/// Host-paced sub-stage of the RESULTS phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RevealStage {
    RunningLeaderboard,
    ProlificAuthor,
    ChallengingAuthor,
    Podium,
}

impl RevealStage {
    /// The stage after this one, or None at the podium.
    pub fn next(self) -> Option<RevealStage> {
        match self {
            RevealStage::RunningLeaderboard => Some(RevealStage::ProlificAuthor),
            RevealStage::ProlificAuthor => Some(RevealStage::ChallengingAuthor),
            RevealStage::ChallengingAuthor => Some(RevealStage::Podium),
            RevealStage::Podium => None,
        }
    }
}

/// Question format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionKind {
    #[serde(rename = "multiple-choice")]
    MultipleChoice,
    #[serde(rename = "true-false")]
    TrueFalse,
}

impl QuestionKind {
    /// How many options a question of this kind must carry.
    pub fn expected_options(self) -> usize {
        match self {
            QuestionKind::MultipleChoice => MULTIPLE_CHOICE_OPTIONS,
            QuestionKind::TrueFalse => TRUE_FALSE_OPTIONS,
        }
    }
}

/// Per-room game settings plus award bookkeeping.
///
/// The winner id fields are written exactly once, when the corresponding
/// reveal stage first applies its bonus. They double as the idempotency
/// guard against a replayed reveal advance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSettings {
    pub phase: Phase,
    pub writing_timer_seconds: u32,
    pub question_timer_seconds: u32,
    pub max_questions: Option<usize>,
    pub reveal_stage: Option<RevealStage>,
    pub prolific_winner_id: Option<String>,
    pub challenging_winner_id: Option<String>,
    pub created_at_ms: i64,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            phase: Phase::Lobby,
            writing_timer_seconds: 600,
            question_timer_seconds: 20,
            max_questions: None,
            reveal_stage: None,
            prolific_winner_id: None,
            challenging_winner_id: None,
            created_at_ms: now_ms(),
        }
    }
}

/// A player in a room. Never hard-deleted except by host kick;
/// disconnects only flip the `connected` flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    pub avatar: Option<u8>,
    pub score: i64,
    pub answering_score: i64,
    pub author_score: i64,
    pub streak: u32,
    pub connected: bool,
}

impl Player {
    pub fn new(name: String, avatar: Option<u8>) -> Self {
        Self {
            name,
            avatar,
            score: 0,
            answering_score: 0,
            author_score: 0,
            streak: 0,
            connected: true,
        }
    }
}

/// A player-authored question. `author_id` is copied by value so the
/// question stays scoreable even if the author is kicked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    pub options: Vec<String>,
    pub correct_index: usize,
    pub author_id: String,
}

/// An incoming question before validation assigns it an id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionDraft {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    pub options: Vec<String>,
    pub correct_index: usize,
}

impl QuestionDraft {
    /// Validates the draft against the format rules. Returns a
    /// user-facing message on failure.
    pub fn validate(&self) -> Result<(), String> {
        let text = self.text.trim();
        if text.is_empty() {
            return Err("Question text is required".to_string());
        }
        if text.chars().count() > QUESTION_TEXT_MAX_CHARS {
            return Err(format!(
                "Question text must be {} characters or less",
                QUESTION_TEXT_MAX_CHARS
            ));
        }
        let expected = self.kind.expected_options();
        if self.options.len() != expected {
            return Err(format!("Expected exactly {} options", expected));
        }
        if self.options.iter().any(|o| o.trim().is_empty()) {
            return Err("All options must be non-empty".to_string());
        }
        if self.correct_index >= self.options.len() {
            return Err("Correct answer index is out of range".to_string());
        }
        Ok(())
    }

    /// Consumes the draft into a stored question for the given author,
    /// trimming the text.
    pub fn into_question(self, author_id: String) -> Question {
        Question {
            text: self.text.trim().to_string(),
            kind: self.kind,
            options: self.options,
            correct_index: self.correct_index,
            author_id,
        }
    }
}

/// A single recorded answer. At most one per (question, player);
/// the first submission wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub answer_index: usize,
    pub timestamp_ms: i64,
}

/// In-progress quiz run state. `question_order` is fixed once the quiz
/// starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizRun {
    pub current_question_index: usize,
    pub question_order: Vec<String>,
    pub current_question_start_ms: i64,
    pub showing_results: bool,
}

/// Award winners, cached on entry to RESULTS.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AwardWinners {
    pub prolific: Option<String>,
    pub challenging: Option<String>,
}

/// Root aggregate for one game session, keyed by a 4-digit room code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomModel {
    pub code: String,
    pub host_id: String,
    pub settings: RoomSettings,
    pub players: HashMap<String, Player>,
    pub questions: HashMap<String, Question>,
    pub quiz: Option<QuizRun>,
    /// question id -> player id -> answer
    pub answers: HashMap<String, HashMap<String, Answer>>,
    pub awards: Option<AwardWinners>,
}

impl RoomModel {
    /// Creates a fresh room in LOBBY with default settings.
    pub fn new(code: String, host_id: String) -> Self {
        Self {
            code,
            host_id,
            settings: RoomSettings::default(),
            players: HashMap::new(),
            questions: HashMap::new(),
            quiz: None,
            answers: HashMap::new(),
            awards: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.settings.phase
    }

    pub fn has_player(&self, player_id: &str) -> bool {
        self.players.contains_key(player_id)
    }

    pub fn connected_player_count(&self) -> usize {
        self.players.values().filter(|p| p.connected).count()
    }

    /// Whether an avatar is already claimed by a *connected* player other
    /// than `exclude_player_id`. Disconnected players release their avatar.
    pub fn is_avatar_taken(&self, avatar: u8, exclude_player_id: &str) -> bool {
        self.players
            .iter()
            .any(|(id, p)| id != exclude_player_id && p.connected && p.avatar == Some(avatar))
    }

    /// The id of the question currently being asked, if a quiz is running.
    pub fn current_question_id(&self) -> Option<&str> {
        let quiz = self.quiz.as_ref()?;
        quiz.question_order
            .get(quiz.current_question_index)
            .map(String::as_str)
    }

    /// Players ordered by score descending. Ties break on player id so the
    /// ranking is stable across reads.
    pub fn ranked_players(&self) -> Vec<(&String, &Player)> {
        let mut ranked: Vec<_> = self.players.iter().collect();
        ranked.sort_by(|(a_id, a), (b_id, b)| b.score.cmp(&a.score).then_with(|| a_id.cmp(b_id)));
        ranked
    }

    /// Number of surviving questions per author id.
    pub fn question_count_by_author(&self) -> HashMap<&str, usize> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for question in self.questions.values() {
            *counts.entry(question.author_id.as_str()).or_insert(0) += 1;
        }
        counts
    }

    /// Recorded answers for one question (empty map if none yet).
    pub fn answers_for(&self, question_id: &str) -> HashMap<String, Answer> {
        self.answers.get(question_id).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room_with_players(scores: &[(&str, i64)]) -> RoomModel {
        let mut room = RoomModel::new("1234".to_string(), "h_host".to_string());
        for (id, score) in scores {
            let mut player = Player::new(format!("name-{}", id), None);
            player.score = *score;
            room.players.insert(id.to_string(), player);
        }
        room
    }

    #[test]
    fn test_new_room_starts_in_lobby() {
        let room = RoomModel::new("4321".to_string(), "h_abc".to_string());
        assert_eq!(room.phase(), Phase::Lobby);
        assert_eq!(room.settings.writing_timer_seconds, 600);
        assert_eq!(room.settings.question_timer_seconds, 20);
        assert!(room.settings.max_questions.is_none());
        assert!(room.players.is_empty());
        assert!(room.quiz.is_none());
    }

    #[test]
    fn test_ranked_players_sorts_by_score_descending() {
        let room = room_with_players(&[("p_a", 100), ("p_b", 300), ("p_c", 200)]);
        let ranked = room.ranked_players();
        let ids: Vec<&str> = ranked.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["p_b", "p_c", "p_a"]);
    }

    #[test]
    fn test_ranked_players_ties_break_on_id() {
        let room = room_with_players(&[("p_b", 100), ("p_a", 100)]);
        let ranked = room.ranked_players();
        let ids: Vec<&str> = ranked.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["p_a", "p_b"]);
    }

    #[test]
    fn test_avatar_taken_only_counts_connected_players() {
        let mut room = room_with_players(&[("p_a", 0), ("p_b", 0)]);
        room.players.get_mut("p_a").unwrap().avatar = Some(7);

        assert!(room.is_avatar_taken(7, "p_b"));
        // The owner themselves can keep it
        assert!(!room.is_avatar_taken(7, "p_a"));

        // Disconnected players release the avatar
        room.players.get_mut("p_a").unwrap().connected = false;
        assert!(!room.is_avatar_taken(7, "p_b"));
    }

    #[test]
    fn test_question_draft_validation() {
        let valid = QuestionDraft {
            text: "What is 2 + 2?".to_string(),
            kind: QuestionKind::MultipleChoice,
            options: vec!["1", "2", "3", "4"]
                .into_iter()
                .map(String::from)
                .collect(),
            correct_index: 3,
        };
        assert!(valid.validate().is_ok());

        let empty_text = QuestionDraft {
            text: "   ".to_string(),
            ..valid.clone()
        };
        assert!(empty_text.validate().is_err());

        let too_long = QuestionDraft {
            text: "x".repeat(QUESTION_TEXT_MAX_CHARS + 1),
            ..valid.clone()
        };
        assert!(too_long.validate().is_err());

        let wrong_option_count = QuestionDraft {
            options: vec!["a".to_string(), "b".to_string()],
            ..valid.clone()
        };
        assert!(wrong_option_count.validate().is_err());

        let blank_option = QuestionDraft {
            options: vec!["a", "b", " ", "d"]
                .into_iter()
                .map(String::from)
                .collect(),
            ..valid.clone()
        };
        assert!(blank_option.validate().is_err());

        let bad_index = QuestionDraft {
            correct_index: 4,
            ..valid.clone()
        };
        assert!(bad_index.validate().is_err());
    }

    #[test]
    fn test_true_false_draft_requires_two_options() {
        let draft = QuestionDraft {
            text: "The sky is blue.".to_string(),
            kind: QuestionKind::TrueFalse,
            options: vec!["True".to_string(), "False".to_string()],
            correct_index: 0,
        };
        assert!(draft.validate().is_ok());

        let four_options = QuestionDraft {
            options: vec!["True", "False", "Maybe", "Never"]
                .into_iter()
                .map(String::from)
                .collect(),
            ..draft
        };
        assert!(four_options.validate().is_err());
    }

    #[test]
    fn test_question_count_by_author() {
        let mut room = room_with_players(&[("p_a", 0), ("p_b", 0)]);
        for (qid, author) in [("q1", "p_a"), ("q2", "p_a"), ("q3", "p_b")] {
            room.questions.insert(
                qid.to_string(),
                Question {
                    text: "q".to_string(),
                    kind: QuestionKind::TrueFalse,
                    options: vec!["True".to_string(), "False".to_string()],
                    correct_index: 0,
                    author_id: author.to_string(),
                },
            );
        }
        let counts = room.question_count_by_author();
        assert_eq!(counts.get("p_a"), Some(&2));
        assert_eq!(counts.get("p_b"), Some(&1));
    }

    #[test]
    fn test_current_question_id_follows_index() {
        let mut room = room_with_players(&[("p_a", 0)]);
        assert!(room.current_question_id().is_none());

        room.quiz = Some(QuizRun {
            current_question_index: 1,
            question_order: vec!["q1".to_string(), "q2".to_string()],
            current_question_start_ms: now_ms(),
            showing_results: false,
        });
        assert_eq!(room.current_question_id(), Some("q2"));
    }

    #[test]
    fn test_phase_round_trips_through_strings() {
        assert_eq!(Phase::Lobby.to_string(), "LOBBY");
        assert_eq!(Phase::Writing.to_string(), "WRITING");
        assert_eq!("RESULTS".parse::<Phase>().unwrap(), Phase::Results);
    }
}
