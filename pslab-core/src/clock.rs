//! Time source for artifact timestamps. Engine results depend only on bar
//! times, never on the clock.

use chrono::{DateTime, TimeZone, Utc};

/// Unix time of [`FixedClock::deterministic`] (2020-09-13T12:26:40Z).
pub const DETERMINISTIC_EPOCH: i64 = 1_600_000_000;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the same instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    pub fn deterministic() -> Self {
        Self(
            Utc.timestamp_opt(DETERMINISTIC_EPOCH, 0)
                .single()
                .unwrap_or_default(),
        )
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
