//! In-memory collaborator implementations.
//!
//! Used by the CLI demo and by tests; each keeps call counters and a small
//! failure-injection switch so error paths can be exercised.

use super::{
    CandidateQuery, CollabError, CollabResult, CouponSource, KeyValueStore, NotificationContent,
    NotificationScheduler, PendingNotification, PermissionStatus, SettingsSource, UrlSigner,
};
use crate::model::coupon::{CouponId, CouponRecord, CouponStatus, EXPIRE_DATE_FORMAT};
use crate::model::schedule::SchedulerHandle;
use crate::model::settings::SettingsRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use uuid::Uuid;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct SchedulerState {
    pending: BTreeMap<String, PendingNotification>,
    permission: PermissionStatus,
    fail_schedule_for: HashSet<CouponId>,
    fail_permission: bool,
    fail_namespace_cancel: bool,
}

/// Notification scheduler keeping pending notifications in a map.
pub struct MemoryNotificationScheduler {
    state: Mutex<SchedulerState>,
    schedule_calls: AtomicUsize,
    cancel_calls: AtomicUsize,
    cancel_all_calls: AtomicUsize,
}

impl Default for MemoryNotificationScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryNotificationScheduler {
    /// Creates a scheduler with permission granted.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SchedulerState {
                pending: BTreeMap::new(),
                permission: PermissionStatus::Granted,
                fail_schedule_for: HashSet::new(),
                fail_permission: false,
                fail_namespace_cancel: false,
            }),
            schedule_calls: AtomicUsize::new(0),
            cancel_calls: AtomicUsize::new(0),
            cancel_all_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_permission(&self, permission: PermissionStatus) {
        lock(&self.state).permission = permission;
    }

    /// Makes the permission query itself fail.
    pub fn fail_permission_check(&self, fail: bool) {
        lock(&self.state).fail_permission = fail;
    }

    /// Makes `cancel_all_in_namespace` fail without touching pending entries.
    pub fn fail_namespace_cancel(&self, fail: bool) {
        lock(&self.state).fail_namespace_cancel = fail;
    }

    /// Makes `schedule` fail for every reminder of `coupon_id`.
    pub fn fail_schedule_for(&self, coupon_id: impl Into<CouponId>) {
        lock(&self.state).fail_schedule_for.insert(coupon_id.into());
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.state).pending.len()
    }

    pub fn pending_snapshot(&self) -> Vec<PendingNotification> {
        lock(&self.state).pending.values().cloned().collect()
    }

    pub fn is_pending(&self, handle: &SchedulerHandle) -> bool {
        lock(&self.state).pending.contains_key(handle.as_str())
    }

    pub fn schedule_calls(&self) -> usize {
        self.schedule_calls.load(Ordering::SeqCst)
    }

    pub fn cancel_calls(&self) -> usize {
        self.cancel_calls.load(Ordering::SeqCst)
    }

    pub fn cancel_all_calls(&self) -> usize {
        self.cancel_all_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationScheduler for MemoryNotificationScheduler {
    async fn schedule(
        &self,
        content: &NotificationContent,
        trigger_at: DateTime<Utc>,
    ) -> CollabResult<SchedulerHandle> {
        self.schedule_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = lock(&self.state);
        if state.fail_schedule_for.contains(&content.data.coupon_id) {
            return Err(CollabError::transient(
                "notifier",
                "schedule_failed",
                format!("injected failure for coupon {}", content.data.coupon_id),
            ));
        }

        let handle = SchedulerHandle::new(Uuid::new_v4().to_string());
        state.pending.insert(
            handle.as_str().to_string(),
            PendingNotification {
                handle: handle.clone(),
                trigger_at,
                content: content.clone(),
            },
        );
        Ok(handle)
    }

    async fn cancel(&self, handle: &SchedulerHandle) -> CollabResult<()> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.state).pending.remove(handle.as_str());
        Ok(())
    }

    async fn cancel_all_in_namespace(&self) -> CollabResult<()> {
        self.cancel_all_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = lock(&self.state);
        if state.fail_namespace_cancel {
            return Err(CollabError::transient(
                "notifier",
                "namespace_cancel_failed",
                "injected namespace cancel failure",
            ));
        }
        state.pending.clear();
        Ok(())
    }

    async fn permission_status(&self) -> CollabResult<PermissionStatus> {
        let state = lock(&self.state);
        if state.fail_permission {
            return Err(CollabError::transient(
                "notifier",
                "permission_query_failed",
                "injected permission failure",
            ));
        }
        Ok(state.permission)
    }

    async fn pending(&self) -> CollabResult<Vec<PendingNotification>> {
        Ok(self.pending_snapshot())
    }
}

/// Non-durable key-value store.
#[derive(Default)]
pub struct MemoryKvStore {
    entries: Mutex<BTreeMap<String, String>>,
    failing: AtomicBool,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }

    fn check(&self) -> CollabResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CollabError::transient("kv", "kv_unavailable", "injected kv failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for MemoryKvStore {
    async fn get(&self, key: &str) -> CollabResult<Option<String>> {
        self.check()?;
        Ok(lock(&self.entries).get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> CollabResult<()> {
        self.check()?;
        lock(&self.entries).insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> CollabResult<()> {
        self.check()?;
        lock(&self.entries).remove(key);
        Ok(())
    }

    async fn multi_get(&self, keys: &[String]) -> CollabResult<Vec<(String, Option<String>)>> {
        self.check()?;
        let entries = lock(&self.entries);
        Ok(keys
            .iter()
            .map(|key| (key.clone(), entries.get(key).cloned()))
            .collect())
    }

    async fn multi_remove(&self, keys: &[String]) -> CollabResult<()> {
        self.check()?;
        let mut entries = lock(&self.entries);
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }

    async fn list_keys_with_prefix(&self, prefix: &str) -> CollabResult<Vec<String>> {
        self.check()?;
        Ok(lock(&self.entries)
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}

/// Settings rows keyed by user id.
#[derive(Default)]
pub struct MemorySettingsSource {
    rows: Mutex<HashMap<String, SettingsRecord>>,
    failing: AtomicBool,
    fetch_calls: AtomicUsize,
}

impl MemorySettingsSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, user_id: impl Into<String>, record: SettingsRecord) {
        lock(&self.rows).insert(user_id.into(), record);
    }

    pub fn get_row(&self, user_id: &str) -> Option<SettingsRecord> {
        lock(&self.rows).get(user_id).cloned()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SettingsSource for MemorySettingsSource {
    async fn fetch_settings(&self, user_id: &str) -> CollabResult<Option<SettingsRecord>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(CollabError::transient(
                "settings",
                "settings_unavailable",
                "injected settings failure",
            ));
        }
        Ok(lock(&self.rows).get(user_id).cloned())
    }

    async fn upsert_settings(&self, user_id: &str, record: &SettingsRecord) -> CollabResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CollabError::transient(
                "settings",
                "settings_unavailable",
                "injected settings failure",
            ));
        }
        self.put(user_id, record.clone());
        Ok(())
    }
}

/// Coupon rows keyed by owner, filtered like the hosted query.
#[derive(Default)]
pub struct MemoryCouponSource {
    rows: Mutex<HashMap<String, Vec<CouponRecord>>>,
    failing: AtomicBool,
    fetch_calls: AtomicUsize,
    last_query: Mutex<Option<CandidateQuery>>,
}

impl MemoryCouponSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user_id: impl Into<String>, record: CouponRecord) {
        lock(&self.rows).entry(user_id.into()).or_default().push(record);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn last_query(&self) -> Option<CandidateQuery> {
        lock(&self.last_query).clone()
    }
}

#[async_trait]
impl CouponSource for MemoryCouponSource {
    async fn fetch_reminder_candidates(
        &self,
        query: &CandidateQuery,
    ) -> CollabResult<Vec<CouponRecord>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.last_query) = Some(query.clone());
        if self.failing.load(Ordering::SeqCst) {
            return Err(CollabError::transient(
                "coupons",
                "query_failed",
                "injected coupon query failure",
            ));
        }

        // Date columns compare lexically on the backend; `YYYY-MM-DD` keeps that ordered.
        let floor = query.expires_on_or_after.format(EXPIRE_DATE_FORMAT).to_string();
        let mut rows: Vec<CouponRecord> = lock(&self.rows)
            .get(&query.user_id)
            .map(|rows| {
                rows.iter()
                    .filter(|row| {
                        CouponStatus::from_backend(row.status.as_deref()) != CouponStatus::Consumed
                    })
                    .filter(|row| row.expire_date >= floor)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        rows.sort_by(|a, b| a.expire_date.cmp(&b.expire_date).then_with(|| a.id.cmp(&b.id)));
        rows.truncate(query.limit);
        Ok(rows)
    }
}

/// Signer returning deterministic fake URLs and recording every batch.
pub struct MemoryUrlSigner {
    base_url: String,
    batches: Mutex<Vec<Vec<String>>>,
    unsignable: Mutex<HashSet<String>>,
    failures_remaining: AtomicUsize,
}

impl Default for MemoryUrlSigner {
    fn default() -> Self {
        Self::new("https://storage.test")
    }
}

impl MemoryUrlSigner {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            batches: Mutex::new(Vec::new()),
            unsignable: Mutex::new(HashSet::new()),
            failures_remaining: AtomicUsize::new(0),
        }
    }

    /// Keys the backend reports as unsignable (deleted objects).
    pub fn mark_unsignable(&self, key: impl Into<String>) {
        lock(&self.unsignable).insert(key.into());
    }

    /// Fails the next `count` signing calls.
    pub fn fail_next(&self, count: usize) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        lock(&self.batches).len()
    }

    /// Keys of every signing call, in call order.
    pub fn batches(&self) -> Vec<Vec<String>> {
        lock(&self.batches).clone()
    }
}

#[async_trait]
impl UrlSigner for MemoryUrlSigner {
    async fn create_signed_urls(
        &self,
        keys: &[String],
        ttl: Duration,
    ) -> CollabResult<HashMap<String, Option<String>>> {
        let call_index = {
            let mut batches = lock(&self.batches);
            batches.push(keys.to_vec());
            batches.len()
        };

        let should_fail = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(CollabError::transient(
                "signer",
                "sign_failed",
                "injected signing failure",
            ));
        }

        let unsignable = lock(&self.unsignable);
        Ok(keys
            .iter()
            .map(|key| {
                let url = (!unsignable.contains(key)).then(|| {
                    format!(
                        "{}/object/sign/{key}?token=t{call_index}&expires_in={}",
                        self.base_url,
                        ttl.as_secs()
                    )
                });
                (key.clone(), url)
            })
            .collect())
    }
}
