//! The clock a filesystem driver stamps new files with.
//!
//! Tests want a fixed, reproducible clock; the shell wants the host's
//! real clock. Both implement [`TimeProvider`] so drivers never call
//! `Utc::now()` directly.

use chrono::{DateTime, Utc};

pub trait TimeProvider {
    fn now(&self) -> DateTime<Utc>;
}

/// The host's real-time clock.
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock fixed at construction, for deterministic tests.
pub struct FixedTimeProvider(pub DateTime<Utc>);

impl TimeProvider for FixedTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

pub fn default_time_provider() -> &'static SystemTimeProvider {
    &SystemTimeProvider
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn fixed_provider_always_returns_the_same_instant() {
        let instant = Utc.with_ymd_and_hms(1985, 6, 17, 0, 0, 0).unwrap();
        let provider = FixedTimeProvider(instant);
        assert_eq!(provider.now(), instant);
        assert_eq!(provider.now(), instant);
    }
}
