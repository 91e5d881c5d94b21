//! Deterministic reminder text.

use crate::model::coupon::Coupon;
use crate::model::schedule::ReminderKind;
use crate::spi::{NotificationContent, NotificationData};

pub const REMINDER_TITLE: &str = "Coupon expiry reminder";

/// Builds the notification for one planned reminder.
///
/// Output depends only on the coupon title/id/expiry, `kind` and
/// `days_before`, so re-planning produces identical content.
pub fn render(
    coupon: &Coupon,
    kind: ReminderKind,
    days_before: u32,
    channel_id: &str,
) -> NotificationContent {
    let body = match kind {
        ReminderKind::DayBefore => {
            format!("\u{201c}{}\u{201d} expires tomorrow. Use it today!", coupon.title)
        }
        ReminderKind::Lead => format!(
            "\u{201c}{}\u{201d} expires in {days_before} days. Don't forget to use it!",
            coupon.title
        ),
    };

    NotificationContent {
        title: REMINDER_TITLE.to_string(),
        body,
        channel_id: channel_id.to_string(),
        data: NotificationData {
            coupon_id: coupon.id.clone(),
            expire_date: coupon.expire_date_string(),
            kind,
            days_before,
        },
    }
}
