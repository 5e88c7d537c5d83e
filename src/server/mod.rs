//! HTTP surface wiring: see `http` for the route handlers.
pub mod http;
