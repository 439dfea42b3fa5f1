// Room lifecycle: the aggregate model, code generation, storage, and the
// join/kick/presence service. Game-phase transitions live in crate::game.

pub mod cleanup_task;
pub mod code;
pub mod handlers;
pub mod locks;
pub mod models;
pub mod repository;
pub mod service;
pub mod types;

pub use models::RoomModel;
pub use service::RoomService;
