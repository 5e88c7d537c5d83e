//! Wire format: every inbound/outbound event is a JSON object tagged by
//! an `event` field with a `data` payload, e.g.
//! `{"event":"join_room","data":{"room":"abc123",...}}`.
use actix::Message;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum IncomingMessage {
    JoinRoom {
        room: String,
        name: String,
        avatar: String,
        #[serde(default)]
        video_enabled: bool,
        #[serde(default)]
        audio_enabled: bool,
    },
    Signal {
        target: String,
        #[serde(rename = "type")]
        kind: String,
        data: Value,
        #[serde(default)]
        room: Option<String>,
    },
    StateChange {
        room: String,
        video: bool,
        audio: bool,
    },
    Reaction {
        room: String,
        emoji: String,
    },
    ChatMessage {
        room: String,
        text: String,
    },
    RaiseHand {
        room: String,
    },
    AdminAction {
        room: String,
        command: String,
        #[serde(default)]
        target_sid: Option<String>,
        #[serde(default)]
        duration: Option<i64>,
    },
}

#[derive(Debug, Serialize, Clone)]
pub struct ExistingUser {
    pub sid: String,
    pub name: String,
    pub avatar: String,
    pub is_admin: bool,
    pub video_enabled: bool,
    pub audio_enabled: bool,
}

#[derive(Debug, Serialize, Clone)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum OutgoingMessage {
    UserJoined {
        sid: String,
        name: String,
        avatar: String,
        is_admin: bool,
        video_enabled: bool,
        audio_enabled: bool,
    },
    ExistingUsers(Vec<ExistingUser>),
    SetAdmin {
        is_admin: bool,
    },
    UserLeft {
        sid: String,
    },
    Signal {
        sender: String,
        #[serde(rename = "type")]
        kind: String,
        data: Value,
    },
    UserStateChanged {
        sid: String,
        video: bool,
        audio: bool,
    },
    ShowReaction {
        sid: String,
        emoji: String,
    },
    ChatMessage {
        sid: String,
        name: String,
        text: String,
        time: String,
    },
    UserHandRaised {
        sid: String,
    },
    AdminCommand {
        command: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        duration: Option<u64>,
    },
    Kicked {
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<&'static str>,
    },
    RoomLocked {
        locked: bool,
    },
    Error {
        message: String,
    },
}

/// Sent from the Coordinator to an individual Session actor. `Deliver` is
/// subject to the Session's bounded mailbox; `Close` is always sent via
/// `do_send`, which Actix guarantees bypasses mailbox capacity, so an
/// unresponsive connection can always be torn down without a second
/// hand-rolled outbound queue.
#[derive(Message)]
#[rtype(result = "()")]
pub enum SessionCommand {
    Deliver(OutgoingMessage),
    Close { reason: Option<&'static str> },
}
