// The game session core: pure scoring, the phase state machine, and the
// deadline timers that drive it.

pub mod controller;
pub mod handlers;
pub mod scoring;
pub mod timers;

pub use controller::GameController;
