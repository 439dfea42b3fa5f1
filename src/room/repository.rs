use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::models::{now_ms, RoomModel};
use crate::shared::AppError;

/// Trait for room storage operations. The engine assumes a single
/// authoritative process, so the only shipped implementation is in-memory;
/// the trait keeps the persistence seam open.
#[async_trait]
pub trait RoomRepository {
    async fn create_room(&self, room: &RoomModel) -> Result<(), AppError>;
    async fn get_room(&self, room_code: &str) -> Result<Option<RoomModel>, AppError>;

    /// Replaces the stored aggregate for the room's code.
    async fn update_room(&self, room: &RoomModel) -> Result<(), AppError>;

    async fn delete_room(&self, room_code: &str) -> Result<(), AppError>;

    /// Whether a code currently resolves to a live room. Used by code
    /// generation to probe for collisions.
    async fn room_exists(&self, room_code: &str) -> Result<bool, AppError>;

    /// Codes of rooms created longer ago than `max_age`.
    async fn expired_room_codes(&self, max_age: Duration) -> Result<Vec<String>, AppError>;
}

/// In-memory implementation of RoomRepository for the single-process server
pub struct InMemoryRoomRepository {
    rooms: Mutex<HashMap<String, RoomModel>>,
}

impl Default for InMemoryRoomRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRoomRepository {
    /// Creates a new empty in-memory repository
    pub fn new() -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl RoomRepository for InMemoryRoomRepository {
    #[instrument(skip(self, room))]
    async fn create_room(&self, room: &RoomModel) -> Result<(), AppError> {
        debug!(room_code = %room.code, "Creating room in memory");

        let mut rooms = self.rooms.lock().unwrap();
        if rooms.contains_key(&room.code) {
            warn!(room_code = %room.code, "Room code already in use");
            return Err(AppError::Conflict("Room already exists".to_string()));
        }
        rooms.insert(room.code.clone(), room.clone());

        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_room(&self, room_code: &str) -> Result<Option<RoomModel>, AppError> {
        let rooms = self.rooms.lock().unwrap();
        Ok(rooms.get(room_code).cloned())
    }

    #[instrument(skip(self, room))]
    async fn update_room(&self, room: &RoomModel) -> Result<(), AppError> {
        let mut rooms = self.rooms.lock().unwrap();
        match rooms.get_mut(&room.code) {
            Some(stored) => {
                *stored = room.clone();
                Ok(())
            }
            None => {
                debug!(room_code = %room.code, "Update for unknown room");
                Err(AppError::NotFound("Game not found".to_string()))
            }
        }
    }

    #[instrument(skip(self))]
    async fn delete_room(&self, room_code: &str) -> Result<(), AppError> {
        let mut rooms = self.rooms.lock().unwrap();
        match rooms.remove(room_code) {
            Some(_) => {
                debug!(room_code = %room_code, "Room deleted");
                Ok(())
            }
            None => Err(AppError::NotFound("Game not found".to_string())),
        }
    }

    #[instrument(skip(self))]
    async fn room_exists(&self, room_code: &str) -> Result<bool, AppError> {
        let rooms = self.rooms.lock().unwrap();
        Ok(rooms.contains_key(room_code))
    }

    #[instrument(skip(self))]
    async fn expired_room_codes(&self, max_age: Duration) -> Result<Vec<String>, AppError> {
        let cutoff_ms = now_ms() - max_age.as_millis() as i64;
        let rooms = self.rooms.lock().unwrap();
        Ok(rooms
            .values()
            .filter(|room| room.settings.created_at_ms < cutoff_ms)
            .map(|room| room.code.clone())
            .collect())
    }
}
