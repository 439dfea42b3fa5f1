use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::{
    code::RoomCodeGenerator,
    locks::RoomLocks,
    models::{Player, RoomModel, AVATAR_CATALOG_SIZE, NAME_MAX_CHARS},
    repository::RoomRepository,
};
use crate::event::{EventBus, RoomEvent};
use crate::shared::AppError;

/// How many create attempts may lose the probe-then-insert race before we
/// give up.
const CREATE_ATTEMPTS: usize = 3;

/// Service for room lifecycle: creation, joining, kicks, and presence.
pub struct RoomService {
    repository: Arc<dyn RoomRepository + Send + Sync>,
    code_generator: Arc<dyn RoomCodeGenerator>,
    locks: Arc<RoomLocks>,
    event_bus: EventBus,
}

impl RoomService {
    pub fn new(
        repository: Arc<dyn RoomRepository + Send + Sync>,
        code_generator: Arc<dyn RoomCodeGenerator>,
        locks: Arc<RoomLocks>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            repository,
            code_generator,
            locks,
            event_bus,
        }
    }

    /// Creates a new room in LOBBY with a freshly probed 4-digit code.
    #[instrument(skip(self))]
    pub async fn create_room(&self, host_id: String) -> Result<RoomModel, AppError> {
        if host_id.trim().is_empty() {
            return Err(AppError::Validation("Host id is required".to_string()));
        }

        // Probing and inserting are separate steps, so a concurrent create
        // can steal the code in between; redraw and try again.
        for _ in 0..CREATE_ATTEMPTS {
            let code = self.code_generator.generate(self.repository.as_ref()).await?;
            let room = RoomModel::new(code.clone(), host_id.clone());
            match self.repository.create_room(&room).await {
                Ok(()) => {
                    info!(room_code = %code, "Room created");
                    self.event_bus
                        .emit(RoomEvent::RoomCreated { room_code: code })
                        .await;
                    return Ok(room);
                }
                Err(AppError::Conflict(_)) => {
                    debug!(room_code = %code, "Lost code race, redrawing");
                    continue;
                }
                Err(other) => return Err(other),
            }
        }
        Err(AppError::Internal)
    }

    /// Adds a player to a room, or reconnects a returning player id.
    ///
    /// Reconnecting preserves score, streak, and sub-totals; only the name,
    /// avatar, and connected flag are refreshed.
    #[instrument(skip(self, name))]
    pub async fn join_room(
        &self,
        room_code: &str,
        player_id: String,
        name: String,
        avatar: Option<u8>,
    ) -> Result<RoomModel, AppError> {
        let name = name.trim().to_string();
        validate_room_code(room_code)?;
        if player_id.trim().is_empty() {
            return Err(AppError::Validation("Player id is required".to_string()));
        }
        if name.is_empty() {
            return Err(AppError::Validation("Enter a display name".to_string()));
        }
        if name.chars().count() > NAME_MAX_CHARS {
            return Err(AppError::Validation(format!(
                "Name must be {} characters or less",
                NAME_MAX_CHARS
            )));
        }
        if let Some(avatar) = avatar {
            if !(1..=AVATAR_CATALOG_SIZE).contains(&avatar) {
                return Err(AppError::Validation("Unknown avatar".to_string()));
            }
        }

        let _guard = self.locks.acquire(room_code).await;
        let mut room = self.load(room_code).await?;

        if let Some(avatar) = avatar {
            if room.is_avatar_taken(avatar, &player_id) {
                return Err(AppError::Validation(
                    "That avatar is already taken".to_string(),
                ));
            }
        }

        match room.players.get_mut(&player_id) {
            Some(existing) => {
                existing.name = name.clone();
                existing.avatar = avatar;
                existing.connected = true;
                debug!(room_code = %room_code, player_id = %player_id, "Player reconnected");
            }
            None => {
                room.players
                    .insert(player_id.clone(), Player::new(name.clone(), avatar));
            }
        }

        self.repository.update_room(&room).await?;

        info!(
            room_code = %room_code,
            player_id = %player_id,
            player_count = room.players.len(),
            "Player joined room"
        );
        self.event_bus
            .emit(RoomEvent::PlayerJoined {
                room_code: room_code.to_string(),
                player_id,
                name,
                player_count: room.players.len(),
            })
            .await;

        Ok(room)
    }

    /// Removes a player entirely. Host only; kicking an already-removed
    /// player is a no-op.
    #[instrument(skip(self))]
    pub async fn kick_player(
        &self,
        room_code: &str,
        host_id: &str,
        player_id: &str,
    ) -> Result<RoomModel, AppError> {
        let _guard = self.locks.acquire(room_code).await;
        let mut room = self.load(room_code).await?;
        ensure_host(&room, host_id)?;

        if room.players.remove(player_id).is_some() {
            self.repository.update_room(&room).await?;
            info!(room_code = %room_code, player_id = %player_id, "Player kicked");
            self.event_bus
                .emit(RoomEvent::PlayerKicked {
                    room_code: room_code.to_string(),
                    player_id: player_id.to_string(),
                })
                .await;
        } else {
            debug!(room_code = %room_code, player_id = %player_id, "Kick for absent player");
        }

        Ok(room)
    }

    /// Updates a player's advisory connection flag. Unknown players are
    /// ignored.
    #[instrument(skip(self))]
    pub async fn set_connected(
        &self,
        room_code: &str,
        player_id: &str,
        connected: bool,
    ) -> Result<RoomModel, AppError> {
        let _guard = self.locks.acquire(room_code).await;
        let mut room = self.load(room_code).await?;

        let changed = match room.players.get_mut(player_id) {
            Some(player) if player.connected != connected => {
                player.connected = connected;
                true
            }
            _ => false,
        };

        if changed {
            self.repository.update_room(&room).await?;
            self.event_bus
                .emit(RoomEvent::PlayerConnectionChanged {
                    room_code: room_code.to_string(),
                    player_id: player_id.to_string(),
                    connected,
                })
                .await;
        }

        Ok(room)
    }

    /// Read-only snapshot fetch.
    #[instrument(skip(self))]
    pub async fn get_room(&self, room_code: &str) -> Result<RoomModel, AppError> {
        self.load(room_code).await
    }

    async fn load(&self, room_code: &str) -> Result<RoomModel, AppError> {
        self.repository
            .get_room(room_code)
            .await?
            .ok_or_else(|| AppError::NotFound("Game not found. Check the room code.".to_string()))
    }
}

/// Room codes are exactly four ASCII digits.
pub fn validate_room_code(room_code: &str) -> Result<(), AppError> {
    if room_code.len() != 4 || !room_code.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::Validation(
            "Enter a 4-digit room code".to_string(),
        ));
    }
    Ok(())
}

/// Host-only actions check the caller against the immutable host id.
pub fn ensure_host(room: &RoomModel, host_id: &str) -> Result<(), AppError> {
    if room.host_id != host_id {
        return Err(AppError::Unauthorized(
            "Only the host can do that".to_string(),
        ));
    }
    Ok(())
}
