//! Single-coupon reminder scheduling.
//!
//! # Responsibility
//! - Turn one coupon into zero, one or two scheduled notifications.
//! - Record every returned handle in the local schedule store.
//!
//! # Invariants
//! - Running `schedule_for` twice yields the same stored rows as running it
//!   once; prior reminders are always cleared first.
//! - Skips (disabled, permission off, ineligible, all triggers past) clear
//!   existing reminders for the coupon and are not errors.

use super::content::render;
use super::eligibility::is_eligible;
use super::planner::TriggerPlanner;
use super::settings::SettingsResolver;
use crate::clock::Clock;
use crate::model::coupon::Coupon;
use crate::model::settings::LeadDays;
use crate::repo::schedule_store::{LocalScheduleStore, StoreError};
use crate::spi::{CollabError, NotificationScheduler, PermissionStatus};
use log::{info, warn};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub type EngineResult<T> = Result<T, EngineError>;

/// Failure while orchestrating reminders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    Store(StoreError),
    /// The notification scheduler refused to create a reminder.
    Scheduler(CollabError),
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "{err}"),
            Self::Scheduler(err) => write!(f, "reminder scheduling failed: {err}"),
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::Scheduler(err) => Some(err),
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Why a coupon ended up without reminders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Disabled,
    PermissionOff,
    NotEligible,
    TriggerInPast,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::PermissionOff => "permission_off",
            Self::NotEligible => "not_eligible",
            Self::TriggerInPast => "trigger_in_past",
        }
    }
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Diagnostic result of `schedule_for`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    Scheduled { lead_days: LeadDays, reminders: usize },
    Skipped(SkipReason),
}

impl ScheduleOutcome {
    pub fn is_scheduled(&self) -> bool {
        matches!(self, Self::Scheduled { .. })
    }
}

pub struct ReminderScheduler {
    settings: Arc<SettingsResolver>,
    store: Arc<LocalScheduleStore>,
    notifier: Arc<dyn NotificationScheduler>,
    clock: Arc<dyn Clock>,
    planner: TriggerPlanner,
    channel_id: String,
}

impl ReminderScheduler {
    pub fn new(
        settings: Arc<SettingsResolver>,
        store: Arc<LocalScheduleStore>,
        notifier: Arc<dyn NotificationScheduler>,
        clock: Arc<dyn Clock>,
        planner: TriggerPlanner,
        channel_id: impl Into<String>,
    ) -> Self {
        Self {
            settings,
            store,
            notifier,
            clock,
            planner,
            channel_id: channel_id.into(),
        }
    }

    /// Whether the OS allows notifications; a failed query counts as denied.
    pub async fn permission_granted(&self) -> bool {
        match self.notifier.permission_status().await {
            Ok(status) => status == PermissionStatus::Granted,
            Err(err) => {
                warn!("event=permission_check module=notify status=error error={err}");
                false
            }
        }
    }

    /// (Re)schedules the reminders of one coupon owned by `user_id`.
    pub async fn schedule_for(&self, user_id: &str, coupon: &Coupon) -> EngineResult<ScheduleOutcome> {
        let settings = self.settings.get_settings(user_id).await;
        if !settings.enabled {
            return self.skip(coupon, SkipReason::Disabled).await;
        }
        if !self.permission_granted().await {
            return self.skip(coupon, SkipReason::PermissionOff).await;
        }
        if !is_eligible(coupon, &self.clock.now()) {
            return self.skip(coupon, SkipReason::NotEligible).await;
        }

        self.store.clear_coupon(&coupon.id).await?;

        let plan = self.planner.plan(coupon, settings.lead_days, self.clock.as_ref());
        if plan.is_empty() {
            info!(
                "event=schedule_coupon module=notify status=skip reason={} coupon_id={} dropped={}",
                SkipReason::TriggerInPast,
                coupon.id,
                plan.dropped_in_past
            );
            return Ok(ScheduleOutcome::Skipped(SkipReason::TriggerInPast));
        }

        for trigger in &plan.triggers {
            let content = render(coupon, trigger.kind, trigger.days_before, &self.channel_id);
            let handle = self
                .notifier
                .schedule(&content, trigger.trigger_at)
                .await
                .map_err(|err| {
                    warn!(
                        "event=schedule_coupon module=notify status=error coupon_id={} kind={} error={err}",
                        coupon.id, trigger.kind
                    );
                    EngineError::Scheduler(err)
                })?;
            self.store.set(&coupon.id, trigger.kind, &handle).await?;
        }

        info!(
            "event=schedule_coupon module=notify status=ok coupon_id={} reminders={} lead_days={}",
            coupon.id,
            plan.triggers.len(),
            settings.lead_days
        );
        Ok(ScheduleOutcome::Scheduled {
            lead_days: settings.lead_days,
            reminders: plan.triggers.len(),
        })
    }

    /// Cancels every reminder of one coupon. Returns mappings removed.
    pub async fn cancel_for(&self, coupon_id: &str) -> EngineResult<usize> {
        Ok(self.store.clear_coupon(coupon_id).await?)
    }

    async fn skip(&self, coupon: &Coupon, reason: SkipReason) -> EngineResult<ScheduleOutcome> {
        let cleared = self.store.clear_coupon(&coupon.id).await?;
        info!(
            "event=schedule_coupon module=notify status=skip reason={reason} coupon_id={} cleared={cleared}",
            coupon.id
        );
        Ok(ScheduleOutcome::Skipped(reason))
    }
}
