//! Process configuration, loaded from environment variables with sane
//! defaults, mirroring the way tuning constants are centralized
//! elsewhere in this codebase but made overridable at deploy time.
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    /// Per-session outbound mailbox capacity; exceeding it closes the
    /// connection.
    pub session_mailbox_capacity: usize,
    /// How often the Coordinator sweeps rooms for long-expired ban/mute
    /// entries. Pure housekeeping — lazy purge at consultation time
    /// already makes expired entries logically absent; this just bounds
    /// memory growth in quiet rooms.
    pub ban_sweep_interval_secs: u64,
    /// Bounded retry count for the Code Generator.
    pub code_generation_attempts: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            session_mailbox_capacity: 64,
            ban_sweep_interval_secs: 300,
            code_generation_attempts: 1024,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            session_mailbox_capacity: env_parsed(
                "SESSION_MAILBOX_CAPACITY",
                defaults.session_mailbox_capacity,
            ),
            ban_sweep_interval_secs: env_parsed(
                "BAN_SWEEP_INTERVAL_SECS",
                defaults.ban_sweep_interval_secs,
            ),
            code_generation_attempts: env_parsed(
                "CODE_GENERATION_ATTEMPTS",
                defaults.code_generation_attempts,
            ),
        }
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
