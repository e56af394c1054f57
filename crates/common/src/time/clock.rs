use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

/// Source of wall-clock time.
pub trait Clock: Send + Sync {
    /// Current time in UTC.
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Implement Clock for Arc<T> where T: Clock for convenient sharing
impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn now_utc(&self) -> DateTime<Utc> {
        (**self).now_utc()
    }
}

/// Real system clock. Use this in production code.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for deterministic tests.
///
/// Clones share the same underlying time.
#[derive(Debug, Clone)]
pub struct MockClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl MockClock {
    /// Create a mock clock starting at the current real time.
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    /// Create a mock clock frozen at `instant`.
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self { now: Arc::new(Mutex::new(instant)) }
    }

    /// Move the clock forward (or backward, with a negative duration).
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock() = instant;
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_moves_forward() {
        let clock = SystemClock;
        let first = clock.now_utc();
        assert!(clock.now_utc() >= first);
    }

    #[test]
    fn mock_clock_clones_share_time() {
        let clock = MockClock::at(DateTime::<Utc>::UNIX_EPOCH);
        let shared = clock.clone();

        clock.advance(Duration::hours(36));
        assert_eq!(shared.now_utc(), DateTime::<Utc>::UNIX_EPOCH + Duration::hours(36));

        shared.set(DateTime::<Utc>::UNIX_EPOCH);
        assert_eq!(clock.now_utc(), DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn arc_dyn_clock_delegates() {
        let clock: Arc<dyn Clock> = Arc::new(MockClock::at(DateTime::<Utc>::UNIX_EPOCH));
        assert_eq!(clock.now_utc(), DateTime::<Utc>::UNIX_EPOCH);
    }
}
