//! HTTP surface: the WebSocket upgrade, the two HTML-shell routes, and
//! the `create_code` endpoint. Everything here is a thin adapter over
//! the Room Coordinator actor — no Room Store logic lives in this
//! module.
use std::sync::Arc;

use actix::Actor;
use actix_web::{
    web::{self, Data},
    App, HttpRequest, HttpResponse, HttpServer, Responder, ResponseError,
};
use actix_web_actors::ws;
use serde::Serialize;
use uuid::Uuid;

use crate::clock::SystemClock;
use crate::config::Config;
use crate::identity::extract_identity;
use crate::room::actor::{Coordinator, GenerateCode};
use crate::session::Session;

async fn socket(
    req: HttpRequest,
    stream: web::Payload,
    coordinator: Data<actix::Addr<Coordinator>>,
    mailbox_capacity: Data<usize>,
) -> actix_web::Result<HttpResponse> {
    let identity = extract_identity(req.headers(), req.peer_addr());
    let connection_id = Uuid::new_v4();
    let session = Session::new(
        connection_id,
        identity,
        coordinator.get_ref().clone(),
        *mailbox_capacity.get_ref(),
    );
    ws::start(session, &req, stream)
}

#[derive(Serialize)]
struct CreateCodeResponse {
    code: String,
}

#[derive(Debug, thiserror::Error)]
enum CodeGenError {
    #[error("could not find a free room code, try again")]
    Exhausted,
    #[error("internal error generating room code")]
    MailboxClosed,
}

impl ResponseError for CodeGenError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        actix_web::http::StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn create_code(
    coordinator: Data<actix::Addr<Coordinator>>,
) -> Result<impl Responder, CodeGenError> {
    let code = coordinator
        .send(GenerateCode)
        .await
        .map_err(|_| CodeGenError::MailboxClosed)?
        .ok_or(CodeGenError::Exhausted)?;
    Ok(HttpResponse::Ok().json(CreateCodeResponse { code }))
}

/// The client HTML shell is out of scope for the Room Coordinator;
/// these two routes exist only so the server runs end-to-end without a
/// separate static-file server. `room_id` is rendered as a
/// `data-room-id` attribute for the page's own script to read, not
/// interpreted by the Coordinator in any way.
fn html_shell(room_id: &str) -> HttpResponse {
    let escaped = room_id
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    let body = format!(
        "<!DOCTYPE html>\n<html lang=\"en\" data-room-id=\"{escaped}\">\n<head><meta charset=\"utf-8\">\n<title>meetcast</title></head>\n<body>\n<div id=\"app\"></div>\n<script src=\"/static/app.js\"></script>\n</body>\n</html>\n"
    );
    HttpResponse::Ok().content_type("text/html; charset=utf-8").body(body)
}

async fn index() -> HttpResponse {
    html_shell("")
}

async fn room(path: web::Path<String>) -> HttpResponse {
    html_shell(&path.into_inner())
}

pub async fn start() -> std::io::Result<()> {
    let config = Config::from_env();
    let bind_addr = config.bind_addr.clone();
    let mailbox_capacity = config.session_mailbox_capacity;
    let clock = Arc::new(SystemClock);
    let coordinator = Coordinator::new(clock, config).start();

    HttpServer::new(move || {
        App::new()
            .app_data(Data::new(coordinator.clone()))
            .app_data(Data::new(mailbox_capacity))
            .route("/ws", web::get().to(socket))
            .route("/create_code", web::post().to(create_code))
            .route("/", web::get().to(index))
            .route("/{room_id}", web::get().to(room))
    })
    .bind(bind_addr)?
    .run()
    .await
}
