use serde::{Deserialize, Serialize};

use crate::game::scoring::QuestionOutcome;
use crate::room::models::{Phase, RevealStage};

/// Events emitted after every accepted room mutation.
///
/// Events are facts about committed state changes. The transport layer
/// subscribes per room and fans them out; consumers re-read the room
/// snapshot rather than applying deltas, so at-least-once delivery of the
/// latest event is enough.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RoomEvent {
    /// A room was created and is waiting in the lobby.
    RoomCreated { room_code: String },

    /// A player joined (or reconnected to) the room.
    PlayerJoined {
        room_code: String,
        player_id: String,
        name: String,
        player_count: usize,
    },

    /// The host removed a player entirely.
    PlayerKicked {
        room_code: String,
        player_id: String,
    },

    /// A player's connection flag changed. Advisory only.
    PlayerConnectionChanged {
        room_code: String,
        player_id: String,
        connected: bool,
    },

    /// The room moved to a new phase.
    PhaseChanged { room_code: String, phase: Phase },

    /// A question was accepted during the writing phase.
    QuestionSubmitted {
        room_code: String,
        question_id: String,
        author_id: String,
        question_count: usize,
    },

    /// The host deleted a question during review.
    QuestionDeleted {
        room_code: String,
        question_id: String,
        question_count: usize,
    },

    /// The quiz started with a fixed question order.
    QuizStarted {
        room_code: String,
        total_questions: usize,
    },

    /// A player's answer was recorded.
    AnswerSubmitted {
        room_code: String,
        question_id: String,
        player_id: String,
        answer_count: usize,
    },

    /// The current question was scored and results are showing.
    QuestionResolved {
        room_code: String,
        question_id: String,
        outcome: QuestionOutcome,
    },

    /// The quiz moved on to the next question.
    QuestionAdvanced {
        room_code: String,
        question_index: usize,
    },

    /// The results reveal moved to the next stage. `award_winner_id` is set
    /// when entering a stage applied an award bonus.
    RevealAdvanced {
        room_code: String,
        stage: RevealStage,
        award_winner_id: Option<String>,
    },

    /// The room was deleted.
    RoomDeleted { room_code: String },
}

impl RoomEvent {
    /// The room this event belongs to. Every event is room-scoped.
    pub fn room_code(&self) -> &str {
        match self {
            RoomEvent::RoomCreated { room_code, .. } => room_code,
            RoomEvent::PlayerJoined { room_code, .. } => room_code,
            RoomEvent::PlayerKicked { room_code, .. } => room_code,
            RoomEvent::PlayerConnectionChanged { room_code, .. } => room_code,
            RoomEvent::PhaseChanged { room_code, .. } => room_code,
            RoomEvent::QuestionSubmitted { room_code, .. } => room_code,
            RoomEvent::QuestionDeleted { room_code, .. } => room_code,
            RoomEvent::QuizStarted { room_code, .. } => room_code,
            RoomEvent::AnswerSubmitted { room_code, .. } => room_code,
            RoomEvent::QuestionResolved { room_code, .. } => room_code,
            RoomEvent::QuestionAdvanced { room_code, .. } => room_code,
            RoomEvent::RevealAdvanced { room_code, .. } => room_code,
            RoomEvent::RoomDeleted { room_code, .. } => room_code,
        }
    }

    /// Stable string tag for logging and wire formats.
    pub fn event_type(&self) -> &'static str {
        match self {
            RoomEvent::RoomCreated { .. } => "room_created",
            RoomEvent::PlayerJoined { .. } => "player_joined",
            RoomEvent::PlayerKicked { .. } => "player_kicked",
            RoomEvent::PlayerConnectionChanged { .. } => "player_connection_changed",
            RoomEvent::PhaseChanged { .. } => "phase_changed",
            RoomEvent::QuestionSubmitted { .. } => "question_submitted",
            RoomEvent::QuestionDeleted { .. } => "question_deleted",
            RoomEvent::QuizStarted { .. } => "quiz_started",
            RoomEvent::AnswerSubmitted { .. } => "answer_submitted",
            RoomEvent::QuestionResolved { .. } => "question_resolved",
            RoomEvent::QuestionAdvanced { .. } => "question_advanced",
            RoomEvent::RevealAdvanced { .. } => "reveal_advanced",
            RoomEvent::RoomDeleted { .. } => "room_deleted",
        }
    }
}
