//! Wall-clock access for planning and cache expiry.
//!
//! Planning needs "09:00 on a given day in the device zone", so the clock
//! owns both `now` and local-time resolution.

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, TimeDelta, TimeZone};
use std::sync::Mutex;

pub trait Clock: Send + Sync {
    /// Current instant, expressed in the device zone.
    fn now(&self) -> DateTime<FixedOffset>;

    /// Resolves a device-local wall-clock time to an instant.
    ///
    /// Returns `None` when the time does not exist locally (DST gap). When
    /// it is ambiguous the earlier instant wins.
    fn local_at(&self, at: NaiveDateTime) -> Option<DateTime<FixedOffset>>;
}

/// Clock backed by the operating system time and zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }

    fn local_at(&self, at: NaiveDateTime) -> Option<DateTime<FixedOffset>> {
        Local
            .from_local_datetime(&at)
            .earliest()
            .map(|value| value.fixed_offset())
    }
}

/// Settable clock pinned to one UTC offset.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<FixedOffset>>,
}

impl ManualClock {
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<FixedOffset>) {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = now;
    }

    pub fn advance(&self, by: TimeDelta) {
        let mut guard = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<FixedOffset> {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn local_at(&self, at: NaiveDateTime) -> Option<DateTime<FixedOffset>> {
        self.now().offset().from_local_datetime(&at).single()
    }
}
