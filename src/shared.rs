use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use crate::event::EventBus;
use crate::game::GameController;
use crate::room::code::RandomRoomCodeGenerator;
use crate::room::locks::RoomLocks;
use crate::room::repository::RoomRepository;
use crate::room::service::RoomService;

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub room_repository: Arc<dyn RoomRepository + Send + Sync>,
    pub event_bus: EventBus,
    pub room_service: Arc<RoomService>,
    pub controller: Arc<GameController>,
}

impl AppState {
    /// Wires the services over a repository and event bus. The room
    /// service and controller share one set of per-room action locks.
    pub fn new(
        room_repository: Arc<dyn RoomRepository + Send + Sync>,
        event_bus: EventBus,
    ) -> Self {
        let locks = Arc::new(RoomLocks::new());
        let controller = GameController::new(
            Arc::clone(&room_repository),
            event_bus.clone(),
            Arc::clone(&locks),
        );
        let room_service = Arc::new(RoomService::new(
            Arc::clone(&room_repository),
            Arc::new(RandomRoomCodeGenerator::new()),
            locks,
            event_bus.clone(),
        ));
        Self {
            room_repository,
            event_bus,
            room_service,
            controller,
        }
    }
}

/// Error taxonomy for the quiz server. Validation and not-found errors are
/// user-facing; phase guards and races surface as conflicts and leave room
/// state untouched.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Wrong phase: {0}")]
    WrongPhase(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error")]
    Internal,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::WrongPhase(msg) => (StatusCode::CONFLICT, msg),
            AppError::Unauthorized(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
pub mod test_utils {
    use super::*;
    use crate::room::repository::InMemoryRoomRepository;

    /// Builder for creating AppState with overrides for testing
    pub struct AppStateBuilder {
        room_repository: Option<Arc<dyn RoomRepository + Send + Sync>>,
        event_bus: Option<EventBus>,
    }

    impl AppStateBuilder {
        pub fn new() -> Self {
            Self {
                room_repository: None,
                event_bus: None,
            }
        }

        pub fn with_room_repository(
            mut self,
            repo: Arc<dyn RoomRepository + Send + Sync>,
        ) -> Self {
            self.room_repository = Some(repo);
            self
        }

        pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
            self.event_bus = Some(event_bus);
            self
        }

        pub fn build(self) -> AppState {
            let room_repository = self
                .room_repository
                .unwrap_or_else(|| Arc::new(InMemoryRoomRepository::new()));
            let event_bus = self.event_bus.unwrap_or_default();
            AppState::new(room_repository, event_bus)
        }
    }

    impl Default for AppStateBuilder {
        fn default() -> Self {
            Self::new()
        }
    }
}
