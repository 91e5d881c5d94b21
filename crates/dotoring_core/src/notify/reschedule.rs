//! Full reconciliation of on-device reminders.
//!
//! # Responsibility
//! - Rebuild every reminder for a user from the current eligible coupons.
//! - Enforce the admission cap: the soonest-expiring coupons win.
//!
//! # Invariants
//! - At most one reschedule runs per user; concurrent callers join it.
//! - The store is swept (`clear_all`) before anything is recreated.
//! - Coupons are scheduled one at a time; one failure does not stop the rest.
//! - A failed candidate fetch leaves existing reminders untouched.

use super::eligibility::is_eligible;
use super::scheduler::{ReminderScheduler, ScheduleOutcome, SkipReason};
use super::settings::SettingsResolver;
use crate::clock::Clock;
use crate::model::coupon::Coupon;
use crate::repo::schedule_store::LocalScheduleStore;
use crate::spi::{CandidateQuery, CouponSource};
use futures::future::{BoxFuture, FutureExt, Shared};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Counters of a completed reschedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RescheduleReport {
    /// Eligible coupons found (before the cap).
    pub candidates: usize,
    /// Coupons handed to the single-coupon scheduler.
    pub attempted: usize,
    pub scheduled: usize,
    pub skipped: usize,
    pub failed: usize,
    pub max_scheduled: usize,
}

impl RescheduleReport {
    /// Whether eligible coupons were left without reminders by the cap.
    pub fn capped(&self) -> bool {
        self.candidates > self.max_scheduled
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RescheduleStage {
    FetchCandidates,
    ClearAll,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RescheduleOutcome {
    /// Reminders are off; every existing reminder was cleared.
    Disabled { reason: SkipReason },
    Completed(RescheduleReport),
    Failed { stage: RescheduleStage, message: String },
}

type InFlight = Shared<BoxFuture<'static, RescheduleOutcome>>;

struct CoordinatorInner {
    scheduler: Arc<ReminderScheduler>,
    settings: Arc<SettingsResolver>,
    store: Arc<LocalScheduleStore>,
    coupons: Arc<dyn CouponSource>,
    clock: Arc<dyn Clock>,
    max_scheduled: usize,
    fetch_limit: usize,
}

pub struct RescheduleCoordinator {
    inner: Arc<CoordinatorInner>,
    in_flight: Arc<Mutex<HashMap<String, InFlight>>>,
}

impl RescheduleCoordinator {
    pub fn new(
        scheduler: Arc<ReminderScheduler>,
        settings: Arc<SettingsResolver>,
        store: Arc<LocalScheduleStore>,
        coupons: Arc<dyn CouponSource>,
        clock: Arc<dyn Clock>,
        max_scheduled: usize,
        fetch_limit: usize,
    ) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                scheduler,
                settings,
                store,
                coupons,
                clock,
                max_scheduled,
                fetch_limit,
            }),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Recomputes every reminder of `user_id` from scratch.
    ///
    /// A call made while another reschedule for the same user is running
    /// waits for that run and returns its outcome.
    pub async fn reschedule_all(&self, user_id: &str) -> RescheduleOutcome {
        let run = {
            let mut in_flight = lock(&self.in_flight);
            match in_flight.get(user_id) {
                Some(existing) => {
                    debug!("event=reschedule_all module=notify status=joined");
                    existing.clone()
                }
                None => {
                    let inner = Arc::clone(&self.inner);
                    let registry = Arc::clone(&self.in_flight);
                    let owner = user_id.to_string();
                    let run = async move {
                        let outcome = inner.run(&owner).await;
                        lock(&registry).remove(&owner);
                        outcome
                    }
                    .boxed()
                    .shared();
                    in_flight.insert(user_id.to_string(), run.clone());
                    run
                }
            }
        };
        run.await
    }

    /// Whether a reschedule for `user_id` is currently running.
    pub fn is_running(&self, user_id: &str) -> bool {
        lock(&self.in_flight).contains_key(user_id)
    }
}

impl CoordinatorInner {
    async fn run(&self, user_id: &str) -> RescheduleOutcome {
        let settings = self.settings.get_settings(user_id).await;
        let disabled_reason = if !settings.enabled {
            Some(SkipReason::Disabled)
        } else if !self.scheduler.permission_granted().await {
            Some(SkipReason::PermissionOff)
        } else {
            None
        };
        if let Some(reason) = disabled_reason {
            if let Err(err) = self.store.clear_all().await {
                warn!("event=reschedule_all module=notify status=error stage=clear_all error={err}");
            }
            info!("event=reschedule_all module=notify status=skip reason={reason}");
            return RescheduleOutcome::Disabled { reason };
        }

        let now = self.clock.now();
        let query = CandidateQuery {
            user_id: user_id.to_string(),
            expires_on_or_after: now.date_naive(),
            limit: self.fetch_limit,
        };
        let records = match self.coupons.fetch_reminder_candidates(&query).await {
            Ok(records) => records,
            Err(err) => {
                warn!("event=reschedule_all module=notify status=error stage=fetch error={err}");
                return RescheduleOutcome::Failed {
                    stage: RescheduleStage::FetchCandidates,
                    message: err.to_string(),
                };
            }
        };

        let mut candidates: Vec<Coupon> = records
            .into_iter()
            .filter_map(|record| match Coupon::try_from(record) {
                Ok(coupon) => Some(coupon),
                Err(err) => {
                    warn!("event=reschedule_all module=notify status=skip reason=invalid_record error={err}");
                    None
                }
            })
            .filter(|coupon| is_eligible(coupon, &now))
            .collect();
        candidates.sort_by(|a, b| {
            a.expire_date
                .cmp(&b.expire_date)
                .then_with(|| a.id.cmp(&b.id))
        });

        if let Err(err) = self.store.clear_all().await {
            warn!("event=reschedule_all module=notify status=error stage=clear_all error={err}");
            return RescheduleOutcome::Failed {
                stage: RescheduleStage::ClearAll,
                message: err.to_string(),
            };
        }

        let mut report = RescheduleReport {
            candidates: candidates.len(),
            max_scheduled: self.max_scheduled,
            ..RescheduleReport::default()
        };
        for coupon in candidates.iter().take(self.max_scheduled) {
            report.attempted += 1;
            match self.scheduler.schedule_for(user_id, coupon).await {
                Ok(ScheduleOutcome::Scheduled { .. }) => report.scheduled += 1,
                Ok(ScheduleOutcome::Skipped(_)) => report.skipped += 1,
                Err(err) => {
                    report.failed += 1;
                    warn!(
                        "event=reschedule_coupon module=notify status=error coupon_id={} error={err}",
                        coupon.id
                    );
                }
            }
        }

        info!(
            "event=reschedule_all module=notify status=ok candidates={} scheduled={} skipped={} failed={} max_scheduled={} capped={}",
            report.candidates,
            report.scheduled,
            report.skipped,
            report.failed,
            report.max_scheduled,
            report.capped()
        );
        RescheduleOutcome::Completed(report)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
