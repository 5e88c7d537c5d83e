//! Client Session: the per-connection WebSocket actor (`actor::Session`)
//! and the wire message types it (de)serializes (`message`).
pub mod actor;
pub mod message;

pub use actor::Session;
