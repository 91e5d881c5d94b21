//! Local schedule store: durable `(coupon, kind) -> scheduler handle` table.
//!
//! # Responsibility
//! - Persist the handle the notification scheduler returned for every
//!   scheduled reminder, so cancellations stay precise across restarts.
//! - Cancel scheduler-side notifications whenever a mapping is dropped.
//!
//! # Invariants
//! - At most one handle per `(coupon_id, kind)`; `set` replaces and cancels
//!   the previous handle first.
//! - Cancelling an unknown or already-fired handle counts as success.
//! - `clear_all` also cancels the whole scheduler namespace, so notifications
//!   whose mapping was lost are still removed.

use crate::model::coupon::CouponId;
use crate::model::schedule::{ReminderKind, ScheduleEntry, SchedulerHandle};
use crate::spi::{CollabError, KeyValueStore, NotificationScheduler};
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use tokio::sync::Mutex;

pub type StoreResult<T> = Result<T, StoreError>;

/// Schedule store failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Durable key-value storage failed.
    Kv(CollabError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Kv(err) => write!(f, "schedule store unavailable: {err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Kv(err) => Some(err),
        }
    }
}

impl From<CollabError> for StoreError {
    fn from(value: CollabError) -> Self {
        Self::Kv(value)
    }
}

/// Result of a full sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClearAllReport {
    /// Persisted mappings removed.
    pub removed: usize,
    /// Whether the namespace-wide scheduler cancel succeeded.
    pub namespace_cancelled: bool,
}

/// Process-wide handle table; all mutation goes through this type.
pub struct LocalScheduleStore {
    kv: Arc<dyn KeyValueStore>,
    notifier: Arc<dyn NotificationScheduler>,
    prefix: String,
    write_lock: Mutex<()>,
}

impl LocalScheduleStore {
    pub fn new(
        kv: Arc<dyn KeyValueStore>,
        notifier: Arc<dyn NotificationScheduler>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            kv,
            notifier,
            prefix: prefix.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Persisted key for one mapping: `<prefix><coupon_id>:<lead|d1>`.
    pub fn storage_key(&self, coupon_id: &str, kind: ReminderKind) -> String {
        format!("{}{}:{}", self.prefix, coupon_id, kind.storage_suffix())
    }

    pub async fn get(
        &self,
        coupon_id: &str,
        kind: ReminderKind,
    ) -> StoreResult<Option<SchedulerHandle>> {
        let value = self.kv.get(&self.storage_key(coupon_id, kind)).await?;
        Ok(value.map(SchedulerHandle::from))
    }

    /// Persists `handle` for `(coupon_id, kind)`, cancelling any prior handle.
    pub async fn set(
        &self,
        coupon_id: &str,
        kind: ReminderKind,
        handle: &SchedulerHandle,
    ) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        let key = self.storage_key(coupon_id, kind);

        if let Some(previous) = self.kv.get(&key).await? {
            if previous != handle.as_str() {
                warn!(
                    "event=schedule_store_replace module=repo status=ok coupon_id={coupon_id} kind={kind}"
                );
                self.cancel_quietly(&SchedulerHandle::from(previous)).await;
            }
        }

        self.kv.set(&key, handle.as_str()).await?;
        debug!("event=schedule_store_set module=repo status=ok coupon_id={coupon_id} kind={kind}");
        Ok(())
    }

    /// Cancels and forgets one mapping. Returns whether a mapping existed.
    pub async fn clear(&self, coupon_id: &str, kind: ReminderKind) -> StoreResult<bool> {
        let _guard = self.write_lock.lock().await;
        self.clear_locked(coupon_id, kind).await
    }

    /// Clears both reminder kinds of one coupon. Returns mappings removed.
    pub async fn clear_coupon(&self, coupon_id: &str) -> StoreResult<usize> {
        let _guard = self.write_lock.lock().await;
        let mut removed = 0;
        for kind in ReminderKind::ALL {
            if self.clear_locked(coupon_id, kind).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Cancels every mapped handle, drops every mapping, then cancels the
    /// whole scheduler namespace.
    pub async fn clear_all(&self) -> StoreResult<ClearAllReport> {
        let _guard = self.write_lock.lock().await;
        let keys = self.kv.list_keys_with_prefix(&self.prefix).await?;

        if !keys.is_empty() {
            let pairs = self.kv.multi_get(&keys).await?;
            for (_, handle) in pairs {
                if let Some(handle) = handle {
                    self.cancel_quietly(&SchedulerHandle::from(handle)).await;
                }
            }
            self.kv.multi_remove(&keys).await?;
        }

        let namespace_cancelled = match self.notifier.cancel_all_in_namespace().await {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    "event=schedule_store_clear_all module=repo status=error stage=namespace_cancel error={err}"
                );
                false
            }
        };

        info!(
            "event=schedule_store_clear_all module=repo status=ok removed={} namespace_cancelled={namespace_cancelled}",
            keys.len()
        );
        Ok(ClearAllReport {
            removed: keys.len(),
            namespace_cancelled,
        })
    }

    /// Lists every persisted mapping, sorted by key.
    pub async fn entries(&self) -> StoreResult<Vec<ScheduleEntry>> {
        let keys = self.kv.list_keys_with_prefix(&self.prefix).await?;
        let pairs = self.kv.multi_get(&keys).await?;

        Ok(pairs
            .into_iter()
            .filter_map(|(key, handle)| {
                let (coupon_id, kind) = self.parse_key(&key)?;
                Some(ScheduleEntry {
                    coupon_id,
                    kind,
                    handle: SchedulerHandle::from(handle?),
                })
            })
            .collect())
    }

    async fn clear_locked(&self, coupon_id: &str, kind: ReminderKind) -> StoreResult<bool> {
        let key = self.storage_key(coupon_id, kind);
        let Some(handle) = self.kv.get(&key).await? else {
            return Ok(false);
        };

        self.cancel_quietly(&SchedulerHandle::from(handle)).await;
        self.kv.remove(&key).await?;
        debug!("event=schedule_store_clear module=repo status=ok coupon_id={coupon_id} kind={kind}");
        Ok(true)
    }

    async fn cancel_quietly(&self, handle: &SchedulerHandle) {
        if let Err(err) = self.notifier.cancel(handle).await {
            warn!("event=notification_cancel module=repo status=error error={err}");
        }
    }

    fn parse_key(&self, key: &str) -> Option<(CouponId, ReminderKind)> {
        let rest = key.strip_prefix(self.prefix.as_str())?;
        let (coupon_id, suffix) = rest.rsplit_once(':')?;
        let kind = ReminderKind::from_storage_suffix(suffix)?;
        Some((coupon_id.to_string(), kind))
    }
}
