//! Wall-clock sources used to stamp object keys.
//!
//! Keys such as `<unix nanos>.json` must stay unique inside one invocation,
//! so the production clock never returns the same instant twice.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Current time as nanoseconds since the Unix epoch.
    fn now_nanos(&self) -> i64;

    /// Current time as a `DateTime<Utc>`.
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(self.now_nanos())
    }

    /// Current time as milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64 {
        self.now_nanos().div_euclid(1_000_000)
    }
}

/// A clock source that guarantees strictly increasing timestamps.
pub struct BoundedClock {
    /// High-water mark: the largest timestamp we've ever returned (nanos)
    high_water_ns: AtomicI64,
}

impl BoundedClock {
    pub fn new() -> Self {
        Self {
            high_water_ns: AtomicI64::new(0),
        }
    }
}

impl Default for BoundedClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for BoundedClock {
    /// Returns a monotonically increasing nanosecond timestamp.
    ///
    /// If the wall clock has gone backward or two calls land on the same
    /// nanosecond, returns the previous high-water mark + 1ns instead.
    fn now_nanos(&self) -> i64 {
        let wall = Utc::now().timestamp_nanos_opt().unwrap_or(0);
        loop {
            let prev = self.high_water_ns.load(Ordering::Acquire);
            let ts = wall.max(prev + 1);
            match self.high_water_ns.compare_exchange_weak(
                prev,
                ts,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return ts,
                Err(_) => continue,
            }
        }
    }
}

/// Deterministic clock for tests: starts at a fixed instant and advances
/// one nanosecond per reading.
pub struct ManualClock {
    next_ns: AtomicI64,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            next_ns: AtomicI64::new(start.timestamp_nanos_opt().unwrap_or(0)),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: std::time::Duration) {
        self.next_ns
            .fetch_add(by.as_nanos() as i64, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn now_nanos(&self) -> i64 {
        self.next_ns.fetch_add(1, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_monotonic_increasing() {
        let clock = BoundedClock::default();
        let mut prev = 0i64;
        for _ in 0..100 {
            let ts = clock.now_nanos();
            assert!(ts > prev, "timestamps must be strictly increasing");
            prev = ts;
        }
    }

    #[test]
    fn test_now_returns_valid_datetime() {
        let clock = BoundedClock::default();
        assert!(clock.now().timestamp() > 1_577_836_800, "timestamp should be after 2020");
    }

    #[test]
    fn test_concurrent_monotonicity() {
        use std::sync::Arc;
        let clock = Arc::new(BoundedClock::default());
        let mut handles = vec![];

        for _ in 0..4 {
            let c = clock.clone();
            handles.push(std::thread::spawn(move || {
                let mut prev = 0i64;
                for _ in 0..1000 {
                    let ts = c.now_nanos();
                    assert!(ts > prev);
                    prev = ts;
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn test_manual_clock_is_deterministic() {
        let start = Utc.with_ymd_and_hms(2022, 1, 1, 12, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);
        assert_eq!(clock.now_nanos(), start.timestamp_nanos_opt().unwrap() + 1);

        clock.advance(std::time::Duration::from_millis(5));
        assert_eq!(clock.now_millis(), start.timestamp_millis() + 5);
    }
}
