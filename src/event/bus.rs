use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use super::events::RoomEvent;

/// Per-room broadcast capacity. Consumers that lag past this many events
/// re-read the room snapshot anyway.
const ROOM_CHANNEL_CAPACITY: usize = 100;

/// Event bus distributing room events to subscribers.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    /// Room-specific event channels: room code -> sender
    room_channels: Arc<RwLock<HashMap<String, broadcast::Sender<RoomEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            room_channels: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Emits an event to all subscribers of the event's room.
    pub async fn emit(&self, event: RoomEvent) {
        let room_code = event.room_code().to_string();
        let room_channels = self.room_channels.read().await;

        if let Some(sender) = room_channels.get(&room_code) {
            match sender.send(event) {
                Ok(receiver_count) => {
                    debug!(
                        room_code = %room_code,
                        receivers = receiver_count,
                        "Room event emitted"
                    );
                }
                Err(_) => {
                    debug!(room_code = %room_code, "Room event emitted with no receivers");
                }
            }
        } else {
            debug!(room_code = %room_code, "No room channel found - creating one");
            drop(room_channels);

            // Create room channel if it doesn't exist
            let mut room_channels = self.room_channels.write().await;
            let sender = room_channels
                .entry(room_code.clone())
                .or_insert_with(|| broadcast::channel(ROOM_CHANNEL_CAPACITY).0)
                .clone();

            if sender.send(event).is_err() {
                debug!(room_code = %room_code, "Room event sent to new channel with no receivers");
            }
        }
    }

    /// Subscribe to events for a specific room.
    pub async fn subscribe_to_room(&self, room_code: &str) -> broadcast::Receiver<RoomEvent> {
        let room_channels = self.room_channels.read().await;

        if let Some(sender) = room_channels.get(room_code) {
            sender.subscribe()
        } else {
            debug!(room_code = %room_code, "Creating new room channel for subscription");
            drop(room_channels);

            let mut room_channels = self.room_channels.write().await;
            room_channels
                .entry(room_code.to_string())
                .or_insert_with(|| broadcast::channel(ROOM_CHANNEL_CAPACITY).0)
                .subscribe()
        }
    }

    /// Drops a deleted room's channel so stale senders don't accumulate.
    pub async fn remove_room_channel(&self, room_code: &str) {
        let mut room_channels = self.room_channels.write().await;
        if room_channels.remove(room_code).is_some() {
            debug!(room_code = %room_code, "Removed room event channel");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_emitted_event() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe_to_room("1234").await;

        bus.emit(RoomEvent::RoomCreated {
            room_code: "1234".to_string(),
        })
        .await;

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.event_type(), "room_created");
        assert_eq!(event.room_code(), "1234");
    }

    #[tokio::test]
    async fn test_rooms_are_isolated() {
        let bus = EventBus::new();
        let mut receiver_a = bus.subscribe_to_room("1111").await;
        let mut receiver_b = bus.subscribe_to_room("2222").await;

        bus.emit(RoomEvent::RoomCreated {
            room_code: "1111".to_string(),
        })
        .await;

        assert_eq!(receiver_a.recv().await.unwrap().room_code(), "1111");
        // The other room's subscriber sees nothing
        assert!(matches!(
            receiver_b.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_does_not_error() {
        let bus = EventBus::new();
        bus.emit(RoomEvent::RoomDeleted {
            room_code: "9999".to_string(),
        })
        .await;
    }
}
