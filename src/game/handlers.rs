use axum::{
    extract::{Path, State},
    Json,
};
use tracing::instrument;

use crate::room::models::RoomModel;
use crate::room::types::{
    HostRequest, StartWritingRequest, SubmitAnswerRequest, SubmitQuestionRequest,
    SubmitQuestionResponse,
};
use crate::shared::{AppError, AppState};

/// HTTP handler starting the writing phase
///
/// POST /rooms/{code}/writing
#[instrument(name = "start_writing", skip(state, request))]
pub async fn start_writing(
    State(state): State<AppState>,
    Path(room_code): Path<String>,
    Json(request): Json<StartWritingRequest>,
) -> Result<Json<RoomModel>, AppError> {
    let room = state
        .controller
        .start_writing(&room_code, &request.host_id, request.settings)
        .await?;
    Ok(Json(room))
}

/// HTTP handler for the host ending the writing phase early
///
/// POST /rooms/{code}/writing/end
#[instrument(name = "end_writing", skip(state, request))]
pub async fn end_writing(
    State(state): State<AppState>,
    Path(room_code): Path<String>,
    Json(request): Json<HostRequest>,
) -> Result<Json<RoomModel>, AppError> {
    let room = state
        .controller
        .end_writing_early(&room_code, &request.host_id)
        .await?;
    Ok(Json(room))
}

/// HTTP handler accepting a player's question
///
/// POST /rooms/{code}/questions
#[instrument(name = "submit_question", skip(state, request))]
pub async fn submit_question(
    State(state): State<AppState>,
    Path(room_code): Path<String>,
    Json(request): Json<SubmitQuestionRequest>,
) -> Result<Json<SubmitQuestionResponse>, AppError> {
    let (question_id, room) = state
        .controller
        .submit_question(&room_code, &request.player_id, request.draft)
        .await?;
    Ok(Json(SubmitQuestionResponse {
        question_id,
        question_count: room.questions.len(),
    }))
}

/// HTTP handler for the host deleting a question during review
///
/// POST /rooms/{code}/questions/{question_id}/delete
#[instrument(name = "delete_question", skip(state, request))]
pub async fn delete_question(
    State(state): State<AppState>,
    Path((room_code, question_id)): Path<(String, String)>,
    Json(request): Json<HostRequest>,
) -> Result<Json<RoomModel>, AppError> {
    let room = state
        .controller
        .delete_question(&room_code, &request.host_id, &question_id)
        .await?;
    Ok(Json(room))
}

/// HTTP handler starting the quiz
///
/// POST /rooms/{code}/quiz
#[instrument(name = "start_quiz", skip(state, request))]
pub async fn start_quiz(
    State(state): State<AppState>,
    Path(room_code): Path<String>,
    Json(request): Json<HostRequest>,
) -> Result<Json<RoomModel>, AppError> {
    let room = state
        .controller
        .start_quiz(&room_code, &request.host_id)
        .await?;
    Ok(Json(room))
}

/// HTTP handler recording a player's answer
///
/// POST /rooms/{code}/answers
#[instrument(name = "submit_answer", skip(state, request))]
pub async fn submit_answer(
    State(state): State<AppState>,
    Path(room_code): Path<String>,
    Json(request): Json<SubmitAnswerRequest>,
) -> Result<Json<RoomModel>, AppError> {
    let room = state
        .controller
        .submit_answer(
            &room_code,
            &request.player_id,
            &request.question_id,
            request.answer_index,
        )
        .await?;
    Ok(Json(room))
}

/// HTTP handler for the host forcing resolution or advancement
///
/// POST /rooms/{code}/quiz/next
#[instrument(name = "next_question", skip(state, request))]
pub async fn next_question(
    State(state): State<AppState>,
    Path(room_code): Path<String>,
    Json(request): Json<HostRequest>,
) -> Result<Json<RoomModel>, AppError> {
    let room = state
        .controller
        .force_next_question(&room_code, &request.host_id)
        .await?;
    Ok(Json(room))
}

/// HTTP handler advancing the results reveal
///
/// POST /rooms/{code}/reveal
#[instrument(name = "advance_reveal", skip(state, request))]
pub async fn advance_reveal(
    State(state): State<AppState>,
    Path(room_code): Path<String>,
    Json(request): Json<HostRequest>,
) -> Result<Json<RoomModel>, AppError> {
    let room = state
        .controller
        .advance_reveal_stage(&room_code, &request.host_id)
        .await?;
    Ok(Json(room))
}
