//! Monotonic-enough wall-clock source for ban/mute expiries.
use std::time::{SystemTime, UNIX_EPOCH};

/// Abstracts "now, in whole seconds since the epoch" so ban/mute expiry
/// logic can be unit tested without sleeping.
pub trait Clock: Send + Sync {
    fn now_secs(&self) -> u64;
}

#[derive(Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock is before the epoch")
            .as_secs()
    }
}

#[cfg(test)]
pub mod test_support {
    use super::Clock;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Fake clock an individual test can advance deterministically.
    pub struct FakeClock(AtomicU64);

    impl FakeClock {
        pub fn new(start: u64) -> Self {
            Self(AtomicU64::new(start))
        }

        pub fn advance(&self, secs: u64) {
            self.0.fetch_add(secs, Ordering::SeqCst);
        }
    }

    impl Clock for FakeClock {
        fn now_secs(&self) -> u64 {
            self.0.load(Ordering::SeqCst)
        }
    }
}
