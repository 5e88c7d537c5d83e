//! Code Generator: fresh 6-character room codes, unique against the
//! Room Store, drawn from `[a-z0-9]`.
use crate::room::store::RoomStore;
use fastrand::Rng;

const CODE_LENGTH: usize = 6;
const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Retries until a code absent from `store` is found, bounded by
/// `max_attempts` to avoid starvation under extreme load. Returns `None`
/// on exhaustion — negligible in practice at realistic room counts.
pub fn generate_unique_code(store: &RoomStore, rng: &mut Rng, max_attempts: usize) -> Option<String> {
    for _ in 0..max_attempts {
        let code = generate_code(rng);
        if !store.room_exists(&code) {
            return Some(code);
        }
    }
    None
}

fn generate_code(rng: &mut Rng) -> String {
    (0..CODE_LENGTH)
        .map(|_| ALPHABET[rng.usize(0..ALPHABET.len())] as char)
        .collect()
}
