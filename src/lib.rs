// Library crate for the QuizClash game server
// This file exposes the public API for integration tests

pub mod event;
pub mod game;
pub mod identity;
pub mod room;
pub mod shared;

// Re-export commonly used types for easier access in tests
pub use event::{EventBus, RoomEvent};
pub use game::controller::WritingSettings;
pub use game::GameController;
pub use room::{models::RoomModel, repository::RoomRepository, RoomService};
pub use shared::{AppError, AppState};
