//! Wall-clock access and the temporal window keys that daily and weekly
//! counters are stored under.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};

pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Clones share the same instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    millis: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(instant.timestamp_millis())),
        }
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        self.millis
            .store(instant.timestamp_millis(), Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.millis
            .fetch_add(by.num_milliseconds(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.millis.load(Ordering::SeqCst))
            .single()
            .unwrap_or_default()
    }
}

/// Window key for per-day counters, e.g. `2026-10-14`.
pub fn day_id(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d").to_string()
}

/// ISO-8601 week key for per-week counters, e.g. `2026-42`.
pub fn week_id(at: DateTime<Utc>) -> String {
    let week = at.iso_week();
    format!("{}-{:02}", week.year(), week.week())
}

/// Window keys for one operation, computed once up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Windows {
    pub now: DateTime<Utc>,
    pub day: String,
    pub week: String,
}

impl Windows {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now,
            day: day_id(now),
            week: week_id(now),
        }
    }

    pub fn previous_day(&self) -> String {
        day_id(self.now - Duration::days(1))
    }
}
