use serde::{Deserialize, Serialize};

use super::models::{QuestionDraft, RoomModel};
use crate::game::controller::WritingSettings;

/// Request payload for creating a new room. The host id is minted
/// server-side when the client does not supply one.
#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub host_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateRoomResponse {
    pub room_code: String,
    pub host_id: String,
}

/// Request payload for joining a room. A missing player id mints a fresh
/// one; a returning id reconnects the existing player.
#[derive(Debug, Deserialize)]
pub struct JoinRoomRequest {
    pub player_id: Option<String>,
    pub name: String,
    pub avatar: Option<u8>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JoinRoomResponse {
    pub player_id: String,
    pub room: RoomModel,
}

#[derive(Debug, Deserialize)]
pub struct KickPlayerRequest {
    pub host_id: String,
    pub player_id: String,
}

#[derive(Debug, Deserialize)]
pub struct PresenceRequest {
    pub player_id: String,
    pub connected: bool,
}

/// Payload for host-only actions that carry no other data (end writing,
/// start quiz, next question, advance reveal, delete question).
#[derive(Debug, Deserialize)]
pub struct HostRequest {
    pub host_id: String,
}

#[derive(Debug, Deserialize)]
pub struct StartWritingRequest {
    pub host_id: String,
    #[serde(flatten)]
    pub settings: WritingSettings,
}

#[derive(Debug, Deserialize)]
pub struct SubmitQuestionRequest {
    pub player_id: String,
    #[serde(flatten)]
    pub draft: QuestionDraft,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitQuestionResponse {
    pub question_id: String,
    pub question_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct SubmitAnswerRequest {
    pub player_id: String,
    pub question_id: String,
    pub answer_index: usize,
}

/// One row of the score-ranked leaderboard, derived from the room
/// snapshot on demand.
#[derive(Debug, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub player_id: String,
    pub name: String,
    pub score: i64,
    pub answering_score: i64,
    pub author_score: i64,
    pub streak: u32,
    pub connected: bool,
}

impl LeaderboardEntry {
    /// Builds the full ranked leaderboard for a room.
    pub fn ranking(room: &RoomModel) -> Vec<LeaderboardEntry> {
        room.ranked_players()
            .into_iter()
            .enumerate()
            .map(|(index, (player_id, player))| LeaderboardEntry {
                rank: index + 1,
                player_id: player_id.clone(),
                name: player.name.clone(),
                score: player.score,
                answering_score: player.answering_score,
                author_score: player.author_score,
                streak: player.streak,
                connected: player.connected,
            })
            .collect()
    }
}
