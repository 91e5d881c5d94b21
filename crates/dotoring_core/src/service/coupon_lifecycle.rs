//! Coupon lifecycle hooks.
//!
//! # Responsibility
//! - Keep reminders and image URLs consistent when a coupon changes.
//!
//! # Invariants
//! - Deleting or consuming a coupon cancels its reminders before returning.
//! - Deleting a coupon or replacing its image invalidates the cached URL.
//! - Logout leaves zero scheduled reminders and empty caches.

use crate::media::signed_url_cache::SignedUrlCache;
use crate::model::coupon::Coupon;
use crate::model::settings::NotificationSettings;
use crate::notify::scheduler::{EngineResult, ReminderScheduler, ScheduleOutcome};
use crate::notify::settings::SettingsResolver;
use crate::repo::schedule_store::{ClearAllReport, LocalScheduleStore};
use crate::spi::CollabResult;
use log::info;
use std::sync::Arc;

pub struct CouponLifecycleService {
    scheduler: Arc<ReminderScheduler>,
    store: Arc<LocalScheduleStore>,
    settings: Arc<SettingsResolver>,
    urls: SignedUrlCache,
}

impl CouponLifecycleService {
    pub fn new(
        scheduler: Arc<ReminderScheduler>,
        store: Arc<LocalScheduleStore>,
        settings: Arc<SettingsResolver>,
        urls: SignedUrlCache,
    ) -> Self {
        Self {
            scheduler,
            store,
            settings,
            urls,
        }
    }

    /// Coupon created or edited: reschedule its reminders.
    pub async fn on_saved(&self, user_id: &str, coupon: &Coupon) -> EngineResult<ScheduleOutcome> {
        self.scheduler.schedule_for(user_id, coupon).await
    }

    /// Coupon marked as used: drop its reminders.
    pub async fn on_consumed(&self, coupon_id: &str) -> EngineResult<usize> {
        self.scheduler.cancel_for(coupon_id).await
    }

    /// Coupon deleted: drop its reminders and forget its image URL.
    pub async fn on_deleted(&self, coupon_id: &str, image_ref: Option<&str>) -> EngineResult<usize> {
        if let Some(image_ref) = image_ref {
            self.urls.invalidate(image_ref);
        }
        let cleared = self.scheduler.cancel_for(coupon_id).await?;
        info!("event=coupon_deleted module=service status=ok coupon_id={coupon_id} cleared={cleared}");
        Ok(cleared)
    }

    /// Coupon image replaced or removed: forget the previous URL.
    pub fn on_image_replaced(&self, previous_ref: &str) -> bool {
        self.urls.invalidate(previous_ref)
    }

    /// Settings toggled in the UI: persist them; the caller follows up with
    /// a full reschedule.
    pub async fn on_settings_changed(
        &self,
        user_id: &str,
        settings: NotificationSettings,
    ) -> CollabResult<()> {
        self.settings.update(user_id, settings).await
    }

    /// Session ended: cancel every reminder and drop every cache.
    pub async fn on_logout(&self) -> EngineResult<ClearAllReport> {
        self.urls.clear();
        self.settings.invalidate();
        let report = self.store.clear_all().await?;
        info!(
            "event=logout_reset module=service status=ok removed={} namespace_cancelled={}",
            report.removed, report.namespace_cancelled
        );
        Ok(report)
    }
}
