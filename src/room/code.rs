use async_trait::async_trait;
use rand::Rng;
use tracing::debug;

use super::repository::RoomRepository;
use crate::shared::AppError;

/// Upper bound on collision probes. With 9000 possible codes this only
/// trips when the active-room set is effectively saturated.
const MAX_PROBES: usize = 10_000;

/// Trait for generating room codes
#[async_trait]
pub trait RoomCodeGenerator: Send + Sync {
    /// Picks a code that no live room currently uses.
    async fn generate(
        &self,
        repository: &(dyn RoomRepository + Send + Sync),
    ) -> Result<String, AppError>;
}

/// Random 4-digit code generator with collision probing: candidates that
/// already resolve to a room are rejected and redrawn.
pub struct RandomRoomCodeGenerator;

impl RandomRoomCodeGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RandomRoomCodeGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoomCodeGenerator for RandomRoomCodeGenerator {
    async fn generate(
        &self,
        repository: &(dyn RoomRepository + Send + Sync),
    ) -> Result<String, AppError> {
        for _ in 0..MAX_PROBES {
            let candidate = rand::rng().random_range(1000..10_000).to_string();
            if !repository.room_exists(&candidate).await? {
                return Ok(candidate);
            }
            debug!(code = %candidate, "Room code collision, retrying");
        }
        Err(AppError::Internal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::models::RoomModel;
    use crate::room::repository::InMemoryRoomRepository;

    #[tokio::test]
    async fn test_generates_four_digit_codes() {
        let repo = InMemoryRoomRepository::new();
        let generator = RandomRoomCodeGenerator::new();

        for _ in 0..20 {
            let code = generator.generate(&repo).await.unwrap();
            assert_eq!(code.len(), 4);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
            assert!(code.parse::<u32>().unwrap() >= 1000);
        }
    }

    #[tokio::test]
    async fn test_skips_taken_codes() {
        let repo = InMemoryRoomRepository::new();
        let generator = RandomRoomCodeGenerator::new();

        let first = generator.generate(&repo).await.unwrap();
        repo.create_room(&RoomModel::new(first.clone(), "h_a".to_string()))
            .await
            .unwrap();

        // Generated codes must never collide with the live room
        for _ in 0..50 {
            let code = generator.generate(&repo).await.unwrap();
            assert_ne!(code, first);
        }
    }
}
