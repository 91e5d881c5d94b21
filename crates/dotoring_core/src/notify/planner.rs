//! Trigger planning.
//!
//! # Invariants
//! - Every trigger fires at `reminder_hour:00` local time on its day.
//! - A `DayBefore` trigger is always planned; `Lead` only when
//!   `lead_days != 1` (otherwise both would fire at the same instant).
//! - Triggers at or before `now` are dropped, never fired immediately.

use crate::clock::Clock;
use crate::model::coupon::Coupon;
use crate::model::schedule::ReminderKind;
use crate::model::settings::LeadDays;
use chrono::{DateTime, Days, Utc};
use log::warn;

/// One reminder to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedTrigger {
    pub kind: ReminderKind,
    pub days_before: u32,
    pub trigger_at: DateTime<Utc>,
}

/// Planner output plus how many triggers were suppressed as past.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TriggerPlan {
    pub triggers: Vec<PlannedTrigger>,
    pub dropped_in_past: usize,
}

impl TriggerPlan {
    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TriggerPlanner {
    reminder_hour: u32,
}

impl TriggerPlanner {
    pub fn new(reminder_hour: u32) -> Self {
        Self { reminder_hour }
    }

    pub fn reminder_hour(&self) -> u32 {
        self.reminder_hour
    }

    /// Plans the reminders for `coupon` relative to `clock.now()`.
    pub fn plan(&self, coupon: &Coupon, lead_days: LeadDays, clock: &dyn Clock) -> TriggerPlan {
        let now = clock.now();
        let mut plan = TriggerPlan::default();

        let kinds: &[ReminderKind] = if lead_days == LeadDays::One {
            &[ReminderKind::DayBefore]
        } else {
            &[ReminderKind::DayBefore, ReminderKind::Lead]
        };

        for &kind in kinds {
            let days_before = kind.days_before(lead_days);
            let Some(trigger_at) = self.trigger_instant(coupon, days_before, clock) else {
                warn!(
                    "event=plan_trigger module=notify status=skip reason=unresolvable_local_time coupon_id={} kind={kind}",
                    coupon.id
                );
                continue;
            };

            if trigger_at <= now {
                plan.dropped_in_past += 1;
                continue;
            }
            plan.triggers.push(PlannedTrigger {
                kind,
                days_before,
                trigger_at,
            });
        }

        plan
    }

    fn trigger_instant(
        &self,
        coupon: &Coupon,
        days_before: u32,
        clock: &dyn Clock,
    ) -> Option<DateTime<Utc>> {
        let day = coupon
            .expire_date
            .checked_sub_days(Days::new(u64::from(days_before)))?;
        let local = day.and_hms_opt(self.reminder_hour, 0, 0)?;
        clock
            .local_at(local)
            .map(|instant| instant.with_timezone(&Utc))
    }
}

#[cfg(test)]
mod tests {
    use super::TriggerPlanner;
    use crate::clock::ManualClock;
    use crate::model::coupon::Coupon;
    use crate::model::schedule::ReminderKind;
    use crate::model::settings::LeadDays;
    use chrono::{DateTime, NaiveDate};

    fn clock_at(rfc3339: &str) -> ManualClock {
        ManualClock::new(DateTime::parse_from_rfc3339(rfc3339).unwrap())
    }

    fn coupon(expire: &str) -> Coupon {
        Coupon::new(
            "c-1",
            "Cake",
            NaiveDate::parse_from_str(expire, "%Y-%m-%d").unwrap(),
        )
    }

    #[test]
    fn lead_of_one_plans_only_day_before() {
        let clock = clock_at("2026-10-17T12:00:00+09:00");
        let plan = TriggerPlanner::new(9).plan(&coupon("2026-11-30"), LeadDays::One, &clock);
        assert_eq!(plan.triggers.len(), 1);
        assert_eq!(plan.triggers[0].kind, ReminderKind::DayBefore);
        assert_eq!(plan.triggers[0].trigger_at.to_rfc3339(), "2026-11-29T00:00:00+00:00");
    }

    #[test]
    fn other_leads_plan_two_distinct_triggers() {
        let clock = clock_at("2026-10-17T12:00:00+09:00");
        for lead in [LeadDays::Three, LeadDays::Seven, LeadDays::Ten, LeadDays::Thirty] {
            let plan = TriggerPlanner::new(9).plan(&coupon("2026-12-31"), lead, &clock);
            assert_eq!(plan.triggers.len(), 2, "lead {lead}");
            assert_ne!(plan.triggers[0].trigger_at, plan.triggers[1].trigger_at);
            let lead_trigger = plan
                .triggers
                .iter()
                .find(|trigger| trigger.kind == ReminderKind::Lead)
                .unwrap();
            assert_eq!(lead_trigger.days_before, lead.days());
        }
    }

    #[test]
    fn trigger_time_is_normalized_to_reminder_hour() {
        let clock = clock_at("2026-10-17T23:41:07+09:00");
        let plan = TriggerPlanner::new(9).plan(&coupon("2026-10-27"), LeadDays::Seven, &clock);
        let lead = plan
            .triggers
            .iter()
            .find(|trigger| trigger.kind == ReminderKind::Lead)
            .unwrap();
        assert_eq!(
            lead.trigger_at
                .with_timezone(&chrono::FixedOffset::east_opt(9 * 3600).unwrap())
                .to_rfc3339(),
            "2026-10-20T09:00:00+09:00"
        );
    }

    #[test]
    fn expiring_today_drops_every_trigger() {
        let clock = clock_at("2026-10-17T08:00:00+09:00");
        let plan = TriggerPlanner::new(9).plan(&coupon("2026-10-17"), LeadDays::Seven, &clock);
        assert!(plan.is_empty());
        assert_eq!(plan.dropped_in_past, 2);
    }

    #[test]
    fn trigger_exactly_at_now_is_dropped() {
        let clock = clock_at("2026-10-17T09:00:00+09:00");
        let plan = TriggerPlanner::new(9).plan(&coupon("2026-10-18"), LeadDays::One, &clock);
        assert!(plan.is_empty());
        assert_eq!(plan.dropped_in_past, 1);
    }

    #[test]
    fn past_lead_is_dropped_but_day_before_kept() {
        let clock = clock_at("2026-10-17T12:00:00+09:00");
        let plan = TriggerPlanner::new(9).plan(&coupon("2026-10-20"), LeadDays::Seven, &clock);
        assert_eq!(plan.triggers.len(), 1);
        assert_eq!(plan.triggers[0].kind, ReminderKind::DayBefore);
        assert_eq!(plan.dropped_in_past, 1);
    }
}
