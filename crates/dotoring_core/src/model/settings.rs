//! Notification preference model.
//!
//! # Invariants
//! - `LeadDays` is one of 1, 3, 7, 10 or 30.
//! - Records with missing or unexpected values resolve to the defaults
//!   (`enabled=true`, `lead_days=1`) field by field.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Offset, in days before expiry, of the user-configured reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum LeadDays {
    #[default]
    One,
    Three,
    Seven,
    Ten,
    Thirty,
}

impl LeadDays {
    pub const ALLOWED: [LeadDays; 5] = [
        LeadDays::One,
        LeadDays::Three,
        LeadDays::Seven,
        LeadDays::Ten,
        LeadDays::Thirty,
    ];

    pub fn days(self) -> u32 {
        match self {
            Self::One => 1,
            Self::Three => 3,
            Self::Seven => 7,
            Self::Ten => 10,
            Self::Thirty => 30,
        }
    }

    /// Clamps a raw backend value, falling back to the default for anything
    /// outside the allowed set.
    pub fn from_raw_or_default(raw: Option<i64>) -> Self {
        raw.and_then(|value| u32::try_from(value).ok())
            .and_then(|value| Self::try_from(value).ok())
            .unwrap_or_default()
    }
}

/// Rejected lead-day value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeadDaysError(pub u32);

impl Display for LeadDaysError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "lead days must be one of 1|3|7|10|30, got {}", self.0)
    }
}

impl Error for LeadDaysError {}

impl TryFrom<u32> for LeadDays {
    type Error = LeadDaysError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::ALLOWED
            .into_iter()
            .find(|lead| lead.days() == value)
            .ok_or(LeadDaysError(value))
    }
}

impl From<LeadDays> for u32 {
    fn from(value: LeadDays) -> Self {
        value.days()
    }
}

impl Display for LeadDays {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.days())
    }
}

/// Per-user reminder preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSettings {
    pub enabled: bool,
    pub lead_days: LeadDays,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            lead_days: LeadDays::One,
        }
    }
}

/// `user_settings` row as stored by the hosted backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsRecord {
    #[serde(default)]
    pub notif_enabled: Option<bool>,
    #[serde(default)]
    pub notify_lead_days: Option<i64>,
}

impl From<SettingsRecord> for NotificationSettings {
    fn from(record: SettingsRecord) -> Self {
        let defaults = Self::default();
        Self {
            enabled: record.notif_enabled.unwrap_or(defaults.enabled),
            lead_days: LeadDays::from_raw_or_default(record.notify_lead_days),
        }
    }
}

impl From<NotificationSettings> for SettingsRecord {
    fn from(settings: NotificationSettings) -> Self {
        Self {
            notif_enabled: Some(settings.enabled),
            notify_lead_days: Some(i64::from(settings.lead_days.days())),
        }
    }
}
