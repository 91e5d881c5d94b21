//! Reminder eligibility.

use crate::model::coupon::Coupon;
use chrono::{DateTime, TimeZone};

/// Returns whether `coupon` may carry a scheduled reminder at `now`.
///
/// A coupon is ineligible once consumed, or once the end of its expiry day
/// (in `now`'s zone) lies strictly before `now`.
pub fn is_eligible<Tz: TimeZone>(coupon: &Coupon, now: &DateTime<Tz>) -> bool {
    !coupon.is_consumed() && now.date_naive() <= coupon.expire_date
}

#[cfg(test)]
mod tests {
    use super::is_eligible;
    use crate::model::coupon::Coupon;
    use chrono::{DateTime, NaiveDate};

    fn coupon(expire: &str) -> Coupon {
        Coupon::new(
            "c-1",
            "Americano",
            NaiveDate::parse_from_str(expire, "%Y-%m-%d").unwrap(),
        )
    }

    #[test]
    fn expiring_today_is_eligible_until_midnight() {
        let late = DateTime::parse_from_rfc3339("2026-10-17T23:59:59.999+09:00").unwrap();
        assert!(is_eligible(&coupon("2026-10-17"), &late));

        let next_day = DateTime::parse_from_rfc3339("2026-10-18T00:00:00+09:00").unwrap();
        assert!(!is_eligible(&coupon("2026-10-17"), &next_day));
    }

    #[test]
    fn consumed_coupon_is_never_eligible() {
        let now = DateTime::parse_from_rfc3339("2026-10-17T10:00:00+09:00").unwrap();
        let mut used = coupon("2027-01-01");
        used.consume();
        assert!(!is_eligible(&used, &now));
    }

    #[test]
    fn eligibility_uses_local_calendar_day() {
        // 2026-10-17T16:00Z is already 2026-10-18 in UTC+9.
        let seoul = DateTime::parse_from_rfc3339("2026-10-18T01:00:00+09:00").unwrap();
        assert!(!is_eligible(&coupon("2026-10-17"), &seoul));
        let utc = seoul.with_timezone(&chrono::Utc);
        assert!(is_eligible(&coupon("2026-10-17"), &utc));
    }
}
