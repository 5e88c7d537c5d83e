//! Client Session actor: one per WebSocket connection. Session owns the
//! transport framing (heartbeat, (de)serialization) and forwards every
//! inbound event to the Coordinator as a typed message; it never
//! touches Room Store state itself.
use actix::{Actor, ActorContext, Addr, AsyncContext, Handler, StreamHandler};
use actix_web_actors::ws::{self, ProtocolError, WebsocketContext};
use std::time::{Duration, Instant};

use crate::ids::ConnectionId;
use crate::room::actor::{
    AdminActionRequest, ChatMessage, Connect, Coordinator, Disconnect, JoinRoom, RaiseHand,
    Reaction, Signal, StateChange,
};
use crate::session::message::{IncomingMessage, SessionCommand};

/// How often the Session checks for a stale heartbeat.
const HB_CHECK_INTERVAL: Duration = Duration::from_secs(5);
/// Idle time after which a connection with no client pong is dropped.
/// The transport's idle timeout is what governs liveness; the
/// Coordinator itself imposes no per-event timeout.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(15);

pub struct Session {
    connection_id: ConnectionId,
    identity: String,
    coordinator: Addr<Coordinator>,
    mailbox_capacity: usize,
    hb: Instant,
}

impl Session {
    pub fn new(
        connection_id: ConnectionId,
        identity: String,
        coordinator: Addr<Coordinator>,
        mailbox_capacity: usize,
    ) -> Self {
        Self {
            connection_id,
            identity,
            coordinator,
            mailbox_capacity,
            hb: Instant::now(),
        }
    }

    fn heartbeat(&self, ctx: &mut <Self as Actor>::Context) {
        ctx.run_interval(HB_CHECK_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                log::debug!("session {} timed out, closing", act.connection_id);
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    fn handle_message(&mut self, msg: IncomingMessage) {
        let connection_id = self.connection_id;
        match msg {
            IncomingMessage::JoinRoom {
                room,
                name,
                avatar,
                video_enabled,
                audio_enabled,
            } => self.coordinator.do_send(JoinRoom {
                connection_id,
                room,
                name,
                avatar,
                video_enabled,
                audio_enabled,
            }),
            IncomingMessage::Signal {
                target,
                kind,
                data,
                room: _,
            } => self.coordinator.do_send(Signal {
                connection_id,
                target,
                kind,
                data,
            }),
            IncomingMessage::StateChange { room, video, audio } => {
                self.coordinator.do_send(StateChange {
                    connection_id,
                    room,
                    video,
                    audio,
                })
            }
            IncomingMessage::Reaction { room, emoji } => self.coordinator.do_send(Reaction {
                connection_id,
                room,
                emoji,
            }),
            IncomingMessage::ChatMessage { room, text } => {
                self.coordinator.do_send(ChatMessage {
                    connection_id,
                    room,
                    text,
                })
            }
            IncomingMessage::RaiseHand { room } => self.coordinator.do_send(RaiseHand {
                connection_id,
                room,
            }),
            IncomingMessage::AdminAction {
                room,
                command,
                target_sid,
                duration,
            } => self.coordinator.do_send(AdminActionRequest {
                connection_id,
                room,
                command,
                target_sid,
                duration,
            }),
        }
    }
}

impl Actor for Session {
    type Context = WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        ctx.set_mailbox_capacity(self.mailbox_capacity);
        self.heartbeat(ctx);
        self.coordinator.do_send(Connect {
            connection_id: self.connection_id,
            identity: self.identity.clone(),
            recipient: ctx.address().recipient(),
        });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        self.coordinator.do_send(Disconnect {
            connection_id: self.connection_id,
        });
    }
}

impl StreamHandler<Result<ws::Message, ProtocolError>> for Session {
    fn handle(&mut self, item: Result<ws::Message, ProtocolError>, ctx: &mut Self::Context) {
        match item {
            Ok(ws::Message::Text(text)) => {
                match serde_json::from_str::<IncomingMessage>(&text) {
                    Ok(msg) => self.handle_message(msg),
                    Err(err) => log::debug!("malformed payload, dropping event: {err}"),
                }
            }
            Ok(ws::Message::Ping(bytes)) => {
                self.hb = Instant::now();
                ctx.pong(&bytes);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Ok(_) => {}
            Err(err) => {
                log::warn!("websocket protocol error: {err}");
                ctx.stop();
            }
        }
    }
}

impl Handler<SessionCommand> for Session {
    type Result = ();
    fn handle(&mut self, msg: SessionCommand, ctx: &mut Self::Context) -> Self::Result {
        match msg {
            SessionCommand::Deliver(out) => match serde_json::to_string(&out) {
                Ok(text) => ctx.text(text),
                Err(err) => log::error!("failed to serialize outgoing event: {err}"),
            },
            SessionCommand::Close { reason } => {
                log::debug!("closing session {}: {:?}", self.connection_id, reason);
                ctx.close(None);
                ctx.stop();
            }
        }
    }
}
