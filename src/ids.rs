//! Shared identifier types threaded between the session and room layers.
use uuid::Uuid;

/// Opaque, process-wide-unique id for one transport connection. Exposed
/// to clients as its string form under the wire `sid` field.
pub type ConnectionId = Uuid;

/// Network identity used as a ban/mute key. Advisory only: it identifies
/// the connecting peer well enough to survive a reconnect, not a
/// verified account.
pub type Identity = String;

/// Normalized room id: trimmed and lowercased.
pub type RoomId = String;

pub fn normalize_room_id(raw: &str) -> RoomId {
    raw.trim().to_lowercase()
}
