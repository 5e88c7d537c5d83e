//! Room module: the Room Store (`store`), Code Generator (`code`), and
//! the Room Coordinator actor (`actor`) that owns both and dispatches
//! every inbound event to the right room.
pub mod actor;
pub mod code;
pub mod store;

pub use actor::Coordinator;
