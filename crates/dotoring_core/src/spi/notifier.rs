//! Local notification scheduler collaborator.

use super::CollabResult;
use crate::model::coupon::CouponId;
use crate::model::schedule::{ReminderKind, SchedulerHandle};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OS-level notification permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    Granted,
    Denied,
}

/// Payload attached to a scheduled reminder so a tap can deep-link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationData {
    pub coupon_id: CouponId,
    /// `YYYY-MM-DD`.
    pub expire_date: String,
    pub kind: ReminderKind,
    pub days_before: u32,
}

/// Rendered reminder content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
    pub channel_id: String,
    pub data: NotificationData,
}

/// Notification currently pending on the device, as reported by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingNotification {
    pub handle: SchedulerHandle,
    pub trigger_at: DateTime<Utc>,
    pub content: NotificationContent,
}

#[async_trait]
pub trait NotificationScheduler: Send + Sync {
    /// Schedules a one-shot notification and returns its handle.
    async fn schedule(
        &self,
        content: &NotificationContent,
        trigger_at: DateTime<Utc>,
    ) -> CollabResult<SchedulerHandle>;

    /// Cancels one notification. Unknown handles are not an error.
    async fn cancel(&self, handle: &SchedulerHandle) -> CollabResult<()>;

    /// Cancels every notification this app has scheduled.
    async fn cancel_all_in_namespace(&self) -> CollabResult<()>;

    async fn permission_status(&self) -> CollabResult<PermissionStatus>;

    /// Lists pending notifications (diagnostics only).
    async fn pending(&self) -> CollabResult<Vec<PendingNotification>>;
}
