//! Hosted-backend query collaborators.

use super::CollabResult;
use crate::model::coupon::CouponRecord;
use crate::model::settings::SettingsRecord;
use async_trait::async_trait;
use chrono::NaiveDate;

/// Filter for reminder candidates: owned by `user_id`, not consumed, expiring
/// on or after `expires_on_or_after`, ordered by expiry ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateQuery {
    pub user_id: String,
    pub expires_on_or_after: NaiveDate,
    pub limit: usize,
}

#[async_trait]
pub trait CouponSource: Send + Sync {
    async fn fetch_reminder_candidates(
        &self,
        query: &CandidateQuery,
    ) -> CollabResult<Vec<CouponRecord>>;
}

#[async_trait]
pub trait SettingsSource: Send + Sync {
    /// Returns `None` when the user has no settings row yet.
    async fn fetch_settings(&self, user_id: &str) -> CollabResult<Option<SettingsRecord>>;

    /// Creates or replaces the user's settings row.
    async fn upsert_settings(&self, user_id: &str, record: &SettingsRecord) -> CollabResult<()>;
}
