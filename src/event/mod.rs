// Event-driven fan-out: the controller emits one RoomEvent per committed
// mutation and the transport layer handles delivery.

pub mod bus;
pub mod events;

pub use bus::EventBus;
pub use events::RoomEvent;
