mod clock;
mod config;
mod identity;
mod ids;
mod room;
mod server;
mod session;

#[actix::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();
    crate::server::http::start().await
}
