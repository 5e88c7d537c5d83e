//! Room Store: the authoritative data structure holding every active
//! room's membership, lock state, and ban/mute lists. This module holds
//! the plain data types and mutation logic; atomicity comes from the
//! fact that every method here is only ever called from inside the
//! Coordinator actor's message handlers (see `room::actor`), never
//! concurrently.
use crate::ids::{normalize_room_id, ConnectionId, Identity, RoomId};
use ahash::HashMap;

pub const MAX_DISPLAY_NAME_LEN: usize = 64;
pub const MAX_AVATAR_LEN: usize = 256;
pub const MAX_CHAT_MESSAGE_LEN: usize = 200;

#[derive(Debug, Clone)]
pub struct Member {
    pub connection_id: ConnectionId,
    pub display_name: String,
    pub avatar: String,
    pub identity: Identity,
    pub is_admin: bool,
    pub video_enabled: bool,
    pub audio_enabled: bool,
    pub hand_raised: bool,
}

#[derive(Default)]
struct Room {
    members: HashMap<ConnectionId, Member>,
    locked: bool,
    banned: HashMap<Identity, u64>,
    muted: HashMap<Identity, u64>,
}

impl Room {
    fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Lazily purges one expired entry and reports remaining seconds if
    /// still active. An expired entry is logically absent and is purged
    /// at the next time it's consulted.
    fn consult_expiry(map: &mut HashMap<Identity, u64>, identity: &str, now: u64) -> Option<u64> {
        match map.get(identity).copied() {
            Some(expiry) if expiry > now => Some(expiry - now),
            Some(_) => {
                map.remove(identity);
                None
            }
            None => None,
        }
    }

    fn ban_remaining(&mut self, identity: &str, now: u64) -> Option<u64> {
        Self::consult_expiry(&mut self.banned, identity, now)
    }

    fn mute_remaining(&mut self, identity: &str, now: u64) -> Option<u64> {
        Self::consult_expiry(&mut self.muted, identity, now)
    }

    /// Periodic housekeeping sweep: drops every entry whose expiry has
    /// already passed. Purely a memory bound; changes no externally
    /// observable behavior since expired entries are already logically
    /// absent.
    fn sweep_expired(&mut self, now: u64) {
        self.banned.retain(|_, expiry| *expiry > now);
        self.muted.retain(|_, expiry| *expiry > now);
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// A ban/mute can never outlive this many minutes, no matter what an
/// admin supplies — about 68 years, comfortably past any real process
/// lifetime, chosen so the `* 60` below cannot overflow `u64` seconds.
const MAX_MODERATION_MINUTES: u64 = u64::MAX / 60 / 2;

/// Absolute expiry timestamp for a ban/mute issued `minutes` from `now`,
/// clamped so an admin-supplied duration can't overflow or wrap past
/// `u64::MAX`.
fn expiry_at(now: u64, minutes: u64) -> u64 {
    let minutes = minutes.min(MAX_MODERATION_MINUTES);
    now.saturating_add(minutes.saturating_mul(60))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinRejection {
    Banned { seconds_remaining: u64 },
    Locked,
}

pub struct JoinSuccess {
    pub is_admin: bool,
    pub existing_members: Vec<Member>,
    pub mute_remaining: Option<u64>,
}

pub type JoinOutcome = Result<JoinSuccess, JoinRejection>;

pub struct LeaveSuccess {
    pub room_id: RoomId,
    pub was_admin: bool,
    pub room_now_empty: bool,
}

#[derive(Clone, Copy)]
pub enum AdminAction {
    Kick {
        target: ConnectionId,
    },
    Ban {
        target: ConnectionId,
        minutes: u64,
    },
    Mute {
        target: ConnectionId,
        minutes: u64,
    },
    Unmute {
        target: ConnectionId,
    },
    ToggleLock,
}

pub enum AdminOutcome {
    Kicked {
        target: ConnectionId,
    },
    Banned {
        target: ConnectionId,
    },
    Muted {
        target: ConnectionId,
        duration_secs: u64,
    },
    Unmuted {
        target: ConnectionId,
    },
    LockToggled {
        locked: bool,
    },
    NotAuthorized,
    TargetNotFound,
}

/// Default ban/mute duration (minutes) when an admin action omits one.
pub const DEFAULT_MODERATION_MINUTES: u64 = 5;

#[derive(Default)]
pub struct RoomStore {
    rooms: HashMap<RoomId, Room>,
}

impl RoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn room_exists(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn try_join(
        &mut self,
        room_id_raw: &str,
        connection_id: ConnectionId,
        identity: &str,
        display_name: &str,
        avatar: &str,
        video_enabled: bool,
        audio_enabled: bool,
        now: u64,
    ) -> (RoomId, JoinOutcome) {
        let room_id = normalize_room_id(room_id_raw);
        let room = self.rooms.entry(room_id.clone()).or_default();

        if let Some(seconds_remaining) = room.ban_remaining(identity, now) {
            return (room_id, Err(JoinRejection::Banned { seconds_remaining }));
        }
        if room.locked && !room.is_empty() {
            return (room_id, Err(JoinRejection::Locked));
        }

        let is_admin = room.is_empty();
        let mute_remaining = room.mute_remaining(identity, now);
        let existing_members: Vec<Member> = room.members.values().cloned().collect();

        let member = Member {
            connection_id,
            display_name: truncate_chars(display_name, MAX_DISPLAY_NAME_LEN),
            avatar: truncate_chars(avatar, MAX_AVATAR_LEN),
            identity: identity.to_string(),
            is_admin,
            video_enabled,
            audio_enabled,
            hand_raised: false,
        };
        room.members.insert(connection_id, member);

        (
            room_id,
            Ok(JoinSuccess {
                is_admin,
                existing_members,
                mute_remaining,
            }),
        )
    }

    /// Removes `connection_id` from `room_id`. If the room becomes empty,
    /// it (and its moderation metadata) is deleted atomically.
    pub fn leave(&mut self, room_id: &str, connection_id: ConnectionId) -> Option<LeaveSuccess> {
        let room = self.rooms.get_mut(room_id)?;
        let member = room.members.remove(&connection_id)?;
        let room_now_empty = room.is_empty();
        if room_now_empty {
            self.rooms.remove(room_id);
        }
        Some(LeaveSuccess {
            room_id: room_id.to_string(),
            was_admin: member.is_admin,
            room_now_empty,
        })
    }

    pub fn set_media_state(
        &mut self,
        room_id: &str,
        connection_id: ConnectionId,
        video: bool,
        audio: bool,
    ) -> bool {
        match self
            .rooms
            .get_mut(room_id)
            .and_then(|room| room.members.get_mut(&connection_id))
        {
            Some(member) => {
                member.video_enabled = video;
                member.audio_enabled = audio;
                true
            }
            None => false,
        }
    }

    pub fn set_hand_raised(&mut self, room_id: &str, connection_id: ConnectionId, raised: bool) {
        if let Some(member) = self
            .rooms
            .get_mut(room_id)
            .and_then(|room| room.members.get_mut(&connection_id))
        {
            member.hand_raised = raised;
        }
    }

    pub fn is_admin(&self, room_id: &str, connection_id: ConnectionId) -> bool {
        self.rooms
            .get(room_id)
            .and_then(|room| room.members.get(&connection_id))
            .map(|m| m.is_admin)
            .unwrap_or(false)
    }

    pub fn member_info(&self, room_id: &str, connection_id: ConnectionId) -> Option<&Member> {
        self.rooms.get(room_id)?.members.get(&connection_id)
    }

    pub fn admin_mutate(
        &mut self,
        room_id: &str,
        actor: ConnectionId,
        action: AdminAction,
        now: u64,
    ) -> AdminOutcome {
        let Some(room) = self.rooms.get_mut(room_id) else {
            return AdminOutcome::NotAuthorized;
        };
        let is_actor_admin = room
            .members
            .get(&actor)
            .map(|m| m.is_admin)
            .unwrap_or(false);
        if !is_actor_admin {
            return AdminOutcome::NotAuthorized;
        }

        match action {
            AdminAction::Kick { target } => {
                if room.members.contains_key(&target) {
                    AdminOutcome::Kicked { target }
                } else {
                    AdminOutcome::TargetNotFound
                }
            }
            AdminAction::Ban { target, minutes } => {
                let Some(member) = room.members.get(&target) else {
                    return AdminOutcome::TargetNotFound;
                };
                let identity = member.identity.clone();
                room.banned.insert(identity, expiry_at(now, minutes));
                AdminOutcome::Banned { target }
            }
            AdminAction::Mute { target, minutes } => {
                let Some(member) = room.members.get(&target) else {
                    return AdminOutcome::TargetNotFound;
                };
                let identity = member.identity.clone();
                let expiry = expiry_at(now, minutes);
                room.muted.insert(identity, expiry);
                AdminOutcome::Muted {
                    target,
                    duration_secs: expiry.saturating_sub(now),
                }
            }
            AdminAction::Unmute { target } => {
                let Some(member) = room.members.get(&target) else {
                    return AdminOutcome::TargetNotFound;
                };
                room.muted.remove(&member.identity);
                AdminOutcome::Unmuted { target }
            }
            AdminAction::ToggleLock => {
                room.locked = !room.locked;
                AdminOutcome::LockToggled {
                    locked: room.locked,
                }
            }
        }
    }

    pub fn room_member_ids(&self, room_id: &str) -> Vec<ConnectionId> {
        self.rooms
            .get(room_id)
            .map(|room| room.members.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Periodic housekeeping across every room; does not touch rooms with
    /// no expired entries.
    pub fn sweep_expired(&mut self, now: u64) {
        for room in self.rooms.values_mut() {
            room.sweep_expired(now);
        }
    }

    #[cfg(test)]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cid() -> ConnectionId {
        ConnectionId::new_v4()
    }

    #[test]
    fn first_joiner_becomes_admin() {
        let mut store = RoomStore::new();
        let a = cid();
        let (room_id, outcome) = store.try_join("ROOM-1", a, "1.1.1.1", "a", "av", false, false, 0);
        assert_eq!(room_id, "room-1");
        let success = outcome.ok().expect("join should succeed");
        assert!(success.is_admin);
        assert!(success.existing_members.is_empty());
    }

    #[test]
    fn second_joiner_is_not_admin_and_sees_first() {
        let mut store = RoomStore::new();
        let a = cid();
        let b = cid();
        store.try_join("room-1", a, "1.1.1.1", "a", "av", false, false, 0);
        let (_, outcome) = store.try_join("room-1", b, "2.2.2.2", "b", "av", false, false, 0);
        let success = outcome.ok().unwrap();
        assert!(!success.is_admin);
        assert_eq!(success.existing_members.len(), 1);
        assert!(success.existing_members[0].is_admin);
    }

    #[test]
    fn room_deleted_when_last_member_leaves() {
        let mut store = RoomStore::new();
        let a = cid();
        store.try_join("room-1", a, "1.1.1.1", "a", "av", false, false, 0);
        assert_eq!(store.room_count(), 1);
        let left = store.leave("room-1", a).unwrap();
        assert!(left.room_now_empty);
        assert_eq!(store.room_count(), 0);
    }

    #[test]
    fn ban_blocks_join_until_expiry() {
        let mut store = RoomStore::new();
        let admin = cid();
        let target = cid();
        store.try_join("room-1", admin, "ip-a", "a", "av", false, false, 0);
        store.try_join("room-1", target, "ip-b", "b", "av", false, false, 0);
        let outcome = store.admin_mutate(
            "room-1",
            admin,
            AdminAction::Ban {
                target,
                minutes: 1,
            },
            0,
        );
        assert!(matches!(outcome, AdminOutcome::Banned { .. }));
        store.leave("room-1", target);

        let (_, rejoin) = store.try_join("room-1", cid(), "ip-b", "b", "av", false, false, 30);
        assert_eq!(
            rejoin.err(),
            Some(JoinRejection::Banned {
                seconds_remaining: 30
            })
        );

        let (_, rejoin_after) = store.try_join("room-1", cid(), "ip-b", "b", "av", false, false, 61);
        assert!(rejoin_after.is_ok());
    }

    #[test]
    fn mute_is_forced_on_rejoin() {
        let mut store = RoomStore::new();
        let admin = cid();
        let target = cid();
        store.try_join("room-1", admin, "ip-a", "a", "av", false, false, 0);
        store.try_join("room-1", target, "ip-b", "b", "av", false, false, 0);
        store.admin_mutate(
            "room-1",
            admin,
            AdminAction::Mute {
                target,
                minutes: 5,
            },
            0,
        );
        store.leave("room-1", target);
        let (_, rejoin) = store.try_join("room-1", cid(), "ip-b", "b", "av", false, false, 10);
        let success = rejoin.ok().unwrap();
        assert_eq!(success.mute_remaining, Some(290));
    }

    #[test]
    fn lock_blocks_newcomers_but_not_members() {
        let mut store = RoomStore::new();
        let admin = cid();
        store.try_join("room-1", admin, "ip-a", "a", "av", false, false, 0);
        store.admin_mutate("room-1", admin, AdminAction::ToggleLock, 0);
        let (_, blocked) = store.try_join("room-1", cid(), "ip-c", "c", "av", false, false, 0);
        assert_eq!(blocked.err(), Some(JoinRejection::Locked));
        // existing member is unaffected by lock for ops other than join
        assert!(store.set_media_state("room-1", admin, true, true));
    }

    #[test]
    fn non_admin_admin_action_is_not_authorized() {
        let mut store = RoomStore::new();
        let admin = cid();
        let other = cid();
        store.try_join("room-1", admin, "ip-a", "a", "av", false, false, 0);
        store.try_join("room-1", other, "ip-b", "b", "av", false, false, 0);
        let outcome = store.admin_mutate("room-1", other, AdminAction::ToggleLock, 0);
        assert!(matches!(outcome, AdminOutcome::NotAuthorized));
    }

    #[test]
    fn display_name_and_avatar_are_truncated() {
        let mut store = RoomStore::new();
        let long_name = "x".repeat(500);
        let long_avatar = "y".repeat(500);
        let (room_id, outcome) = store.try_join(
            "room-1",
            cid(),
            "ip-a",
            &long_name,
            &long_avatar,
            false,
            false,
            0,
        );
        let success = outcome.ok().unwrap();
        let member = store.member_info(&room_id, store.room_member_ids(&room_id)[0]).unwrap();
        assert_eq!(member.display_name.chars().count(), MAX_DISPLAY_NAME_LEN);
        assert_eq!(member.avatar.chars().count(), MAX_AVATAR_LEN);
        assert!(success.existing_members.is_empty());
    }

    #[test]
    fn sweep_expired_purges_old_entries_without_changing_consultation() {
        let mut store = RoomStore::new();
        let admin = cid();
        let target = cid();
        store.try_join("room-1", admin, "ip-a", "a", "av", false, false, 0);
        store.try_join("room-1", target, "ip-b", "b", "av", false, false, 0);
        store.admin_mutate(
            "room-1",
            admin,
            AdminAction::Ban {
                target,
                minutes: 1,
            },
            0,
        );
        store.sweep_expired(1000);
        // Ban already expired at t=1000 (expiry=60), sweep should have removed it;
        // a fresh join for that identity should succeed.
        let (_, rejoin) = store.try_join("room-1", cid(), "ip-b", "b", "av", false, false, 1000);
        assert!(rejoin.is_ok());
    }

    #[test]
    fn ban_with_huge_duration_does_not_overflow() {
        let mut store = RoomStore::new();
        let admin = cid();
        let target = cid();
        store.try_join("room-1", admin, "ip-a", "a", "av", false, false, 0);
        store.try_join("room-1", target, "ip-b", "b", "av", false, false, 0);
        let outcome = store.admin_mutate(
            "room-1",
            admin,
            AdminAction::Ban {
                target,
                minutes: u64::MAX,
            },
            0,
        );
        assert!(matches!(outcome, AdminOutcome::Banned { .. }));
        // Still banned far in the future instead of having wrapped around
        // (via `minutes * 60` overflow) to an already-expired timestamp.
        let (_, rejoin) = store.try_join("room-1", cid(), "ip-b", "b", "av", false, false, 1_000_000);
        assert!(rejoin.is_err());
    }
}
