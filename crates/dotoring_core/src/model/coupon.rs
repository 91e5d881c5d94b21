//! Coupon domain model.
//!
//! # Responsibility
//! - Carry the fields reminder scheduling needs (`id`, `title`, expiry, status).
//! - Convert backend rows (`CouponRecord`) into validated `Coupon` values.
//!
//! # Invariants
//! - `expire_date` is date-only; time-of-day is applied by the planner.
//! - Unknown backend statuses are treated as `Active`; expiry decides the rest.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Backend-issued coupon identifier.
pub type CouponId = String;

/// Wire format for `expire_date` columns.
pub const EXPIRE_DATE_FORMAT: &str = "%Y-%m-%d";

/// Consumption state relevant to reminders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CouponStatus {
    /// Still usable; may carry reminders.
    Active,
    /// Already used; never reminded about.
    Consumed,
}

impl CouponStatus {
    /// Maps a raw backend status column to the reminder-relevant state.
    ///
    /// `used`/`consumed` mean consumed; anything else (including `expired` or a
    /// missing column) is active and left to the expiry check.
    pub fn from_backend(raw: Option<&str>) -> Self {
        match raw.map(|value| value.trim().to_ascii_lowercase()) {
            Some(value) if value == "used" || value == "consumed" => Self::Consumed,
            _ => Self::Active,
        }
    }

    pub fn as_backend_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Consumed => "used",
        }
    }
}

/// Validated coupon used by eligibility, planning and scheduling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    pub id: CouponId,
    pub title: String,
    pub expire_date: NaiveDate,
    pub status: CouponStatus,
    /// Storage key or URL of the coupon thumbnail, if any.
    pub image_ref: Option<String>,
}

impl Coupon {
    /// Creates an active coupon without an image.
    pub fn new(id: impl Into<CouponId>, title: impl Into<String>, expire_date: NaiveDate) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            expire_date,
            status: CouponStatus::Active,
            image_ref: None,
        }
    }

    pub fn with_image(mut self, image_ref: impl Into<String>) -> Self {
        self.image_ref = Some(image_ref.into());
        self
    }

    /// Marks the coupon as used.
    pub fn consume(&mut self) {
        self.status = CouponStatus::Consumed;
    }

    pub fn is_consumed(&self) -> bool {
        self.status == CouponStatus::Consumed
    }

    /// Returns `expire_date` in backend wire format (`YYYY-MM-DD`).
    pub fn expire_date_string(&self) -> String {
        self.expire_date.format(EXPIRE_DATE_FORMAT).to_string()
    }
}

/// Coupon row as returned by the hosted backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponRecord {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub expire_date: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Rejection reasons for backend coupon rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CouponValidationError {
    EmptyId,
    InvalidExpireDate { id: String, value: String },
}

impl Display for CouponValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyId => write!(f, "coupon id cannot be empty"),
            Self::InvalidExpireDate { id, value } => {
                write!(f, "coupon {id} has invalid expire_date `{value}`")
            }
        }
    }
}

impl Error for CouponValidationError {}

impl TryFrom<CouponRecord> for Coupon {
    type Error = CouponValidationError;

    fn try_from(record: CouponRecord) -> Result<Self, Self::Error> {
        let id = record.id.trim().to_string();
        if id.is_empty() {
            return Err(CouponValidationError::EmptyId);
        }

        let expire_date = NaiveDate::parse_from_str(record.expire_date.trim(), EXPIRE_DATE_FORMAT)
            .map_err(|_| CouponValidationError::InvalidExpireDate {
                id: id.clone(),
                value: record.expire_date.clone(),
            })?;

        Ok(Self {
            id,
            title: record.title,
            expire_date,
            status: CouponStatus::from_backend(record.status.as_deref()),
            image_ref: record.image_url.filter(|value| !value.trim().is_empty()),
        })
    }
}
