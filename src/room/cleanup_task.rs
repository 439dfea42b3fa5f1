use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{error, info, instrument, warn};

use super::repository::RoomRepository;
use crate::game::GameController;

/// Configuration for the cleanup task
#[derive(Debug, Clone)]
pub struct CleanupConfig {
    /// How often to run the cleanup task
    pub cleanup_interval: Duration,
    /// How long after creation a room is considered expired
    pub max_room_age: Duration,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            cleanup_interval: Duration::from_secs(30 * 60), // 30 minutes
            max_room_age: Duration::from_secs(12 * 60 * 60), // 12 hours
        }
    }
}

/// Starts the background task that periodically deletes expired rooms.
/// A classroom game lasts an hour at most; anything older is abandoned.
#[instrument(skip(room_repository, controller))]
pub async fn start_cleanup_task(
    room_repository: Arc<dyn RoomRepository + Send + Sync>,
    controller: Arc<GameController>,
    config: CleanupConfig,
) {
    info!(
        cleanup_interval_secs = config.cleanup_interval.as_secs(),
        max_room_age_secs = config.max_room_age.as_secs(),
        "Starting room cleanup background task"
    );

    let mut cleanup_interval = interval(config.cleanup_interval);

    loop {
        cleanup_interval.tick().await;

        match cleanup_expired_rooms(&room_repository, &controller, config.max_room_age).await {
            Ok(deleted_count) => {
                info!(deleted_count, "Room cleanup completed");
            }
            Err(e) => {
                error!(error = %e, "Room cleanup task failed");
            }
        }
    }
}

/// Deletes rooms older than the threshold. Returns how many were removed.
#[instrument(skip(room_repository, controller))]
async fn cleanup_expired_rooms(
    room_repository: &Arc<dyn RoomRepository + Send + Sync>,
    controller: &Arc<GameController>,
    max_room_age: Duration,
) -> Result<usize, crate::shared::AppError> {
    let expired_codes = room_repository.expired_room_codes(max_room_age).await?;

    if expired_codes.is_empty() {
        return Ok(0);
    }

    info!(count = expired_codes.len(), "Found expired rooms to delete");

    let mut deleted_count = 0;
    for room_code in expired_codes {
        match controller.delete_room(&room_code).await {
            Ok(()) => {
                deleted_count += 1;
                info!(room_code = %room_code, "Deleted expired room");
            }
            Err(e) => {
                warn!(
                    room_code = %room_code,
                    error = %e,
                    "Failed to delete expired room"
                );
            }
        }
    }

    Ok(deleted_count)
}
