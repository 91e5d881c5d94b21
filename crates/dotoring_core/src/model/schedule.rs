//! Local schedule rows linking coupons to scheduler handles.
//!
//! # Invariants
//! - At most one `ScheduleEntry` exists per `(coupon_id, kind)`.
//! - Handles are opaque; only the notification scheduler interprets them.

use super::coupon::CouponId;
use super::settings::LeadDays;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Which of the two per-coupon reminders a row refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderKind {
    /// User-configured `lead_days` reminder.
    Lead,
    /// Mandatory reminder one day before expiry.
    DayBefore,
}

impl ReminderKind {
    pub const ALL: [ReminderKind; 2] = [ReminderKind::Lead, ReminderKind::DayBefore];

    /// Suffix used in persisted store keys.
    pub fn storage_suffix(self) -> &'static str {
        match self {
            Self::Lead => "lead",
            Self::DayBefore => "d1",
        }
    }

    pub fn from_storage_suffix(value: &str) -> Option<Self> {
        match value {
            "lead" => Some(Self::Lead),
            "d1" => Some(Self::DayBefore),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lead => "lead",
            Self::DayBefore => "day_before",
        }
    }

    /// Days before expiry at which this reminder fires.
    pub fn days_before(self, lead_days: LeadDays) -> u32 {
        match self {
            Self::Lead => lead_days.days(),
            Self::DayBefore => 1,
        }
    }
}

impl Display for ReminderKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque identifier returned by the notification scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchedulerHandle(String);

impl SchedulerHandle {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<String> for SchedulerHandle {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SchedulerHandle {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl Display for SchedulerHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One persisted `(coupon, kind) -> handle` mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub coupon_id: CouponId,
    pub kind: ReminderKind,
    pub handle: SchedulerHandle,
}
