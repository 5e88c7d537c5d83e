//! The Room Coordinator actor: the single serialization point for every
//! room mutation. It owns both the Session Registry and the Room Store
//! as plain fields, and implements the event dispatcher and fan-out
//! logic as methods. Because Actix actors process one message to
//! completion before the next, and no handler here ever `.await`s before
//! finishing its mutation and fan-out, ordering and consistency across
//! rooms fall out of the actor model directly rather than from manual
//! locking.
use actix::{Actor, Context, Handler, Message, Recipient};
use ahash::HashMap;
use fastrand::Rng;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::config::Config;
use crate::ids::{normalize_room_id, ConnectionId, RoomId};
use crate::room::code::generate_unique_code;
use crate::room::store::{AdminAction as StoreAdminAction, AdminOutcome, JoinRejection, RoomStore};
use crate::session::message::{ExistingUser, OutgoingMessage, SessionCommand};

const SIGNAL_KICK_REASON: &str = "kicked";
const SIGNAL_BAN_REASON: &str = "ban";

struct SessionRecord {
    identity: String,
    room_id: Option<RoomId>,
    recipient: Recipient<SessionCommand>,
}

pub struct Coordinator {
    store: RoomStore,
    sessions: HashMap<ConnectionId, SessionRecord>,
    clock: Arc<dyn Clock>,
    config: Config,
    code_rng: Rng,
}

impl Coordinator {
    pub fn new(clock: Arc<dyn Clock>, config: Config) -> Self {
        Self {
            store: RoomStore::new(),
            sessions: HashMap::default(),
            clock,
            config,
            code_rng: Rng::new(),
        }
    }

    fn now(&self) -> u64 {
        self.clock.now_secs()
    }

    fn to_one(&self, target: ConnectionId, msg: OutgoingMessage) {
        if let Some(record) = self.sessions.get(&target) {
            self.deliver(&record.recipient, msg);
        }
    }

    fn to_room(&self, room_id: &str, msg: OutgoingMessage) {
        for id in self.store.room_member_ids(room_id) {
            self.to_one(id, msg.clone());
        }
    }

    fn to_room_except(&self, room_id: &str, except: ConnectionId, msg: OutgoingMessage) {
        for id in self.store.room_member_ids(room_id) {
            if id != except {
                self.to_one(id, msg.clone());
            }
        }
    }

    /// Single delivery primitive. `try_send`
    /// respects the recipient's bounded mailbox; on overflow the
    /// connection is forced closed via `do_send`, which Actix always
    /// delivers regardless of mailbox capacity.
    fn deliver(&self, recipient: &Recipient<SessionCommand>, msg: OutgoingMessage) {
        if recipient
            .try_send(SessionCommand::Deliver(msg))
            .is_err()
        {
            log::warn!("session mailbox overflow, closing connection as unresponsive");
            recipient.do_send(SessionCommand::Close {
                reason: Some("overflow"),
            });
        }
    }

    fn close(&self, target: ConnectionId, reason: Option<&'static str>) {
        if let Some(record) = self.sessions.get(&target) {
            record.recipient.do_send(SessionCommand::Close { reason });
        }
    }

    fn current_room(&self, connection_id: ConnectionId) -> Option<RoomId> {
        self.sessions.get(&connection_id)?.room_id.clone()
    }

    fn sid(connection_id: ConnectionId) -> String {
        connection_id.to_string()
    }
}

impl Actor for Coordinator {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let interval = Duration::from_secs(self.config.ban_sweep_interval_secs.max(1));
        ctx.run_interval(interval, |act, _ctx| {
            let now = act.now();
            act.store.sweep_expired(now);
        });
    }
}

// ---- Session lifecycle -----------------------------------------------

#[derive(Message)]
#[rtype(result = "()")]
pub struct Connect {
    pub connection_id: ConnectionId,
    pub identity: String,
    pub recipient: Recipient<SessionCommand>,
}

impl Handler<Connect> for Coordinator {
    type Result = ();
    fn handle(&mut self, msg: Connect, _ctx: &mut Self::Context) -> Self::Result {
        self.sessions.insert(
            msg.connection_id,
            SessionRecord {
                identity: msg.identity,
                room_id: None,
                recipient: msg.recipient,
            },
        );
    }
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Disconnect {
    pub connection_id: ConnectionId,
}

impl Handler<Disconnect> for Coordinator {
    type Result = ();
    fn handle(&mut self, msg: Disconnect, _ctx: &mut Self::Context) -> Self::Result {
        let Some(record) = self.sessions.remove(&msg.connection_id) else {
            return;
        };
        if let Some(room_id) = record.room_id {
            if let Some(left) = self.store.leave(&room_id, msg.connection_id) {
                if !left.room_now_empty {
                    self.to_room(&room_id, OutgoingMessage::UserLeft {
                        sid: Self::sid(msg.connection_id),
                    });
                }
            }
        }
    }
}

// ---- join_room ---------------------------------------------------------

#[derive(Message)]
#[rtype(result = "()")]
pub struct JoinRoom {
    pub connection_id: ConnectionId,
    pub room: String,
    pub name: String,
    pub avatar: String,
    pub video_enabled: bool,
    pub audio_enabled: bool,
}

impl Handler<JoinRoom> for Coordinator {
    type Result = ();
    fn handle(&mut self, msg: JoinRoom, _ctx: &mut Self::Context) -> Self::Result {
        let Some(identity) = self.sessions.get(&msg.connection_id).map(|s| s.identity.clone())
        else {
            return;
        };

        let now = self.now();
        let (room_id, outcome) = self.store.try_join(
            &msg.room,
            msg.connection_id,
            &identity,
            &msg.name,
            &msg.avatar,
            msg.video_enabled,
            msg.audio_enabled,
            now,
        );

        match outcome {
            Err(JoinRejection::Banned { seconds_remaining }) => {
                self.to_one(
                    msg.connection_id,
                    OutgoingMessage::Error {
                        message: format!(
                            "you are banned from this room for {} more second(s)",
                            seconds_remaining
                        ),
                    },
                );
            }
            Err(JoinRejection::Locked) => {
                self.to_one(
                    msg.connection_id,
                    OutgoingMessage::Error {
                        message: "this room is locked".to_string(),
                    },
                );
            }
            Ok(success) => {
                // A connection already in a room must leave it first: a
                // connection-id can only ever be a member of one room at a
                // time. Treating a second join as an implicit room switch
                // is the least surprising way to preserve that. This only
                // runs once the new join has actually succeeded, so a
                // rejected join (banned/locked) leaves the old membership
                // untouched.
                if let Some(old_room) = self.current_room(msg.connection_id) {
                    if old_room != room_id {
                        if let Some(left) = self.store.leave(&old_room, msg.connection_id) {
                            if !left.room_now_empty {
                                self.to_room(&old_room, OutgoingMessage::UserLeft {
                                    sid: Self::sid(msg.connection_id),
                                });
                            }
                        }
                    }
                }

                if let Some(record) = self.sessions.get_mut(&msg.connection_id) {
                    record.room_id = Some(room_id.clone());
                }
                let Some(member) = self.store.member_info(&room_id, msg.connection_id) else {
                    return;
                };
                let joined_event = OutgoingMessage::UserJoined {
                    sid: Self::sid(msg.connection_id),
                    name: member.display_name.clone(),
                    avatar: member.avatar.clone(),
                    is_admin: member.is_admin,
                    video_enabled: member.video_enabled,
                    audio_enabled: member.audio_enabled,
                };
                self.to_room_except(&room_id, msg.connection_id, joined_event);

                let existing_users = success
                    .existing_members
                    .into_iter()
                    .map(|m| ExistingUser {
                        sid: m.connection_id.to_string(),
                        name: m.display_name,
                        avatar: m.avatar,
                        is_admin: m.is_admin,
                        video_enabled: m.video_enabled,
                        audio_enabled: m.audio_enabled,
                    })
                    .collect();
                self.to_one(
                    msg.connection_id,
                    OutgoingMessage::ExistingUsers(existing_users),
                );

                if success.is_admin {
                    self.to_one(msg.connection_id, OutgoingMessage::SetAdmin { is_admin: true });
                }
                if let Some(remaining) = success.mute_remaining {
                    self.to_one(
                        msg.connection_id,
                        OutgoingMessage::AdminCommand {
                            command: "mute_force",
                            duration: Some(remaining),
                        },
                    );
                }
            }
        }
    }
}

// ---- signal --------------------------------------------------------------

#[derive(Message)]
#[rtype(result = "()")]
pub struct Signal {
    pub connection_id: ConnectionId,
    pub target: String,
    pub kind: String,
    pub data: serde_json::Value,
}

impl Handler<Signal> for Coordinator {
    type Result = ();
    fn handle(&mut self, msg: Signal, _ctx: &mut Self::Context) -> Self::Result {
        let Ok(target_id) = msg.target.parse::<ConnectionId>() else {
            log::debug!("signal: target sid is not a valid connection id, dropping");
            return;
        };
        // Permissive signal routing: forward to any connection currently
        // known to be a member of some room, regardless of whether it
        // shares the sender's room. Drop only if the target is unknown
        // to every room.
        let known_to_a_room = self
            .sessions
            .get(&target_id)
            .map(|record| record.room_id.is_some())
            .unwrap_or(false);
        if !known_to_a_room {
            log::debug!("signal: target not currently known to any room, dropping");
            return;
        }
        self.to_one(
            target_id,
            OutgoingMessage::Signal {
                sender: Self::sid(msg.connection_id),
                kind: msg.kind,
                data: msg.data,
            },
        );
    }
}

// ---- state_change ----------------------------------------------------

#[derive(Message)]
#[rtype(result = "()")]
pub struct StateChange {
    pub connection_id: ConnectionId,
    pub room: String,
    pub video: bool,
    pub audio: bool,
}

impl Handler<StateChange> for Coordinator {
    type Result = ();
    fn handle(&mut self, msg: StateChange, _ctx: &mut Self::Context) -> Self::Result {
        let room_id = normalize_room_id(&msg.room);
        if !self
            .store
            .set_media_state(&room_id, msg.connection_id, msg.video, msg.audio)
        {
            return;
        }
        self.to_room_except(
            &room_id,
            msg.connection_id,
            OutgoingMessage::UserStateChanged {
                sid: Self::sid(msg.connection_id),
                video: msg.video,
                audio: msg.audio,
            },
        );
    }
}

// ---- reaction ----------------------------------------------------------

#[derive(Message)]
#[rtype(result = "()")]
pub struct Reaction {
    pub connection_id: ConnectionId,
    pub room: String,
    pub emoji: String,
}

impl Handler<Reaction> for Coordinator {
    type Result = ();
    fn handle(&mut self, msg: Reaction, _ctx: &mut Self::Context) -> Self::Result {
        let room_id = normalize_room_id(&msg.room);
        self.to_room(
            &room_id,
            OutgoingMessage::ShowReaction {
                sid: Self::sid(msg.connection_id),
                emoji: msg.emoji,
            },
        );
    }
}

// ---- chat_message ------------------------------------------------------

#[derive(Message)]
#[rtype(result = "()")]
pub struct ChatMessage {
    pub connection_id: ConnectionId,
    pub room: String,
    pub text: String,
}

impl Handler<ChatMessage> for Coordinator {
    type Result = ();
    fn handle(&mut self, msg: ChatMessage, _ctx: &mut Self::Context) -> Self::Result {
        let room_id = normalize_room_id(&msg.room);
        let Some(member) = self.store.member_info(&room_id, msg.connection_id) else {
            log::debug!("chat_message: sender not in room, dropping");
            return;
        };
        let name = member.display_name.clone();
        let text: String = msg
            .text
            .chars()
            .take(crate::room::store::MAX_CHAT_MESSAGE_LEN)
            .collect();
        let time = format_hh_mm_utc(self.now());
        self.to_room(
            &room_id,
            OutgoingMessage::ChatMessage {
                sid: Self::sid(msg.connection_id),
                name,
                text,
                time,
            },
        );
    }
}

fn format_hh_mm_utc(epoch_secs: u64) -> String {
    let secs_of_day = epoch_secs % 86_400;
    format!("{:02}:{:02}", secs_of_day / 3600, (secs_of_day % 3600) / 60)
}

// ---- raise_hand ----------------------------------------------------------

#[derive(Message)]
#[rtype(result = "()")]
pub struct RaiseHand {
    pub connection_id: ConnectionId,
    pub room: String,
}

impl Handler<RaiseHand> for Coordinator {
    type Result = ();
    fn handle(&mut self, msg: RaiseHand, _ctx: &mut Self::Context) -> Self::Result {
        let room_id = normalize_room_id(&msg.room);
        self.store.set_hand_raised(&room_id, msg.connection_id, true);
        self.to_room(
            &room_id,
            OutgoingMessage::UserHandRaised {
                sid: Self::sid(msg.connection_id),
            },
        );
    }
}

// ---- admin_action --------------------------------------------------------

#[derive(Message)]
#[rtype(result = "()")]
pub struct AdminActionRequest {
    pub connection_id: ConnectionId,
    pub room: String,
    pub command: String,
    pub target_sid: Option<String>,
    pub duration: Option<i64>,
}

impl Handler<AdminActionRequest> for Coordinator {
    type Result = ();
    fn handle(&mut self, msg: AdminActionRequest, _ctx: &mut Self::Context) -> Self::Result {
        let room_id = normalize_room_id(&msg.room);
        let target = msg.target_sid.as_deref().and_then(|s| s.parse::<ConnectionId>().ok());
        let minutes = msg
            .duration
            .filter(|d| *d >= 0)
            .map(|d| d as u64)
            .unwrap_or(crate::room::store::DEFAULT_MODERATION_MINUTES);

        let action = match msg.command.as_str() {
            "kick" => target.map(|target| StoreAdminAction::Kick { target }),
            "ban" => target.map(|target| StoreAdminAction::Ban { target, minutes }),
            "mute" => target.map(|target| StoreAdminAction::Mute { target, minutes }),
            "unmute" => target.map(|target| StoreAdminAction::Unmute { target }),
            "toggle_lock" => Some(StoreAdminAction::ToggleLock),
            other => {
                log::debug!("admin_action: unknown command {other:?}, dropping");
                None
            }
        };
        let Some(action) = action else {
            return;
        };

        let now = self.now();
        let outcome = self.store.admin_mutate(&room_id, msg.connection_id, action, now);

        match outcome {
            AdminOutcome::Kicked { target } => {
                self.to_one(target, OutgoingMessage::Kicked { reason: None });
                self.close(target, Some(SIGNAL_KICK_REASON));
            }
            AdminOutcome::Banned { target } => {
                self.to_one(
                    target,
                    OutgoingMessage::Kicked {
                        reason: Some(SIGNAL_BAN_REASON),
                    },
                );
                self.close(target, Some(SIGNAL_BAN_REASON));
            }
            AdminOutcome::Muted { target, duration_secs } => {
                self.to_one(
                    target,
                    OutgoingMessage::AdminCommand {
                        command: "mute_force",
                        duration: Some(duration_secs),
                    },
                );
            }
            AdminOutcome::Unmuted { target } => {
                self.to_one(
                    target,
                    OutgoingMessage::AdminCommand {
                        command: "unmute_force",
                        duration: None,
                    },
                );
            }
            AdminOutcome::LockToggled { locked } => {
                self.to_room(&room_id, OutgoingMessage::RoomLocked { locked });
            }
            AdminOutcome::NotAuthorized | AdminOutcome::TargetNotFound => {
                log::debug!("admin_action: rejected (unauthorized or missing target)");
            }
        }
    }
}

// ---- Code Endpoint support -------------------------------------------

#[derive(Message)]
#[rtype(result = "Option<String>")]
pub struct GenerateCode;

impl Handler<GenerateCode> for Coordinator {
    type Result = Option<String>;
    fn handle(&mut self, _msg: GenerateCode, _ctx: &mut Self::Context) -> Self::Result {
        let attempts = self.config.code_generation_attempts;
        generate_unique_code(&self.store, &mut self.code_rng, attempts)
    }
}
