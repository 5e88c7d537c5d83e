//! Identity Extractor: derives a client's network identity from
//! transport connection metadata. Used only as a ban/mute key —
//! advisory, not authenticated.
use actix_web::http::header::HeaderMap;
use std::net::SocketAddr;

const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Returns the forwarded-for header value verbatim if present (no
/// parsing of the comma-separated hop list), else the peer address,
/// else `"unknown"`.
pub fn extract_identity(headers: &HeaderMap, peer_addr: Option<SocketAddr>) -> String {
    if let Some(value) = headers.get(FORWARDED_FOR_HEADER) {
        if let Ok(value) = value.to_str() {
            return value.to_string();
        }
    }
    match peer_addr {
        Some(addr) => addr.to_string(),
        None => "unknown".to_string(),
    }
}
