//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose stable, use-case-level functions to Dart via FRB.
//! - Keep the scheduler handle table in Rust while Dart owns the platform
//!   notification plugin: every call that drops a mapping returns the
//!   handles Dart must cancel.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Dates cross the boundary as `YYYY-MM-DD`, instants as RFC 3339 strings.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dotoring_core::clock::{Clock, ManualClock};
use dotoring_core::model::schedule::{ReminderKind, SchedulerHandle};
use dotoring_core::repo::schedule_store::{LocalScheduleStore, StoreResult};
use dotoring_core::spi::{
    CollabError, CollabResult, NotificationContent, NotificationScheduler, PendingNotification,
    PermissionStatus,
};
use dotoring_core::{
    core_version as core_version_inner, coupon_image_key, init_logging as init_logging_inner,
    is_eligible, normalize_storage_key, ping as ping_inner, Coupon, CouponRecord, EngineConfig,
    LeadDays, SqliteKvStore, TriggerPlanner,
};
use futures::executor::block_on;
use log::warn;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

const SCHEDULE_DB_FILE_NAME: &str = "dotoring_schedule.sqlite3";
static SCHEDULE_DB_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// One reminder Dart should hand to the platform notification plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedReminder {
    /// `lead|day_before`.
    pub kind: String,
    pub days_before: u32,
    /// RFC 3339 UTC instant.
    pub trigger_at: String,
}

/// Planning response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderPlanResponse {
    pub ok: bool,
    pub reminders: Vec<PlannedReminder>,
    /// Triggers suppressed because they were not in the future.
    pub dropped_in_past: u32,
    pub message: String,
}

impl ReminderPlanResponse {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            reminders: Vec::new(),
            dropped_in_past: 0,
            message: message.into(),
        }
    }
}

/// Plans the reminders of one coupon.
///
/// Input semantics:
/// - `now`: RFC 3339 instant carrying the device UTC offset; the offset is
///   used as the device zone for the reminder hour.
/// - `lead_days`: unexpected values fall back to 1.
/// - `reminder_hour`: `None` uses the configured default.
///
/// # FFI contract
/// - Sync call, pure computation.
/// - Ineligible coupons yield `ok=true` with no reminders.
#[flutter_rust_bridge::frb(sync)]
pub fn plan_coupon_reminders(
    coupon_id: String,
    expire_date: String,
    status: Option<String>,
    lead_days: i64,
    now: String,
    reminder_hour: Option<u32>,
) -> ReminderPlanResponse {
    let coupon = match parse_coupon(coupon_id, expire_date, status) {
        Ok(coupon) => coupon,
        Err(message) => return ReminderPlanResponse::failure(message),
    };
    let clock = match parse_now(&now) {
        Ok(clock) => clock,
        Err(message) => return ReminderPlanResponse::failure(message),
    };
    let hour = reminder_hour.unwrap_or(EngineConfig::default().reminder_hour);
    if hour > 23 {
        return ReminderPlanResponse::failure(format!("reminder_hour must be 0..=23, got {hour}"));
    }

    if !is_eligible(&coupon, &clock.now()) {
        return ReminderPlanResponse {
            ok: true,
            reminders: Vec::new(),
            dropped_in_past: 0,
            message: "Coupon is not eligible.".to_string(),
        };
    }

    let lead_days = LeadDays::from_raw_or_default(Some(lead_days));
    let plan = TriggerPlanner::new(hour).plan(&coupon, lead_days, &clock);
    let reminders: Vec<PlannedReminder> = plan
        .triggers
        .iter()
        .map(|trigger| PlannedReminder {
            kind: trigger.kind.as_str().to_string(),
            days_before: trigger.days_before,
            trigger_at: trigger.trigger_at.to_rfc3339(),
        })
        .collect();
    let message = if reminders.is_empty() {
        "All reminders are in the past.".to_string()
    } else {
        format!("Planned {} reminder(s).", reminders.len())
    };
    ReminderPlanResponse {
        ok: true,
        reminders,
        dropped_in_past: u32::try_from(plan.dropped_in_past).unwrap_or(u32::MAX),
        message,
    }
}

/// Whether a coupon may carry reminders at `now`.
///
/// # FFI contract
/// - Never panics; malformed input counts as not eligible.
#[flutter_rust_bridge::frb(sync)]
pub fn coupon_is_eligible(expire_date: String, status: Option<String>, now: String) -> bool {
    let Ok(coupon) = parse_coupon("eligibility-check".to_string(), expire_date, status) else {
        return false;
    };
    match parse_now(&now) {
        Ok(clock) => is_eligible(&coupon, &clock.now()),
        Err(_) => false,
    }
}

/// Extracts the storage key from a raw key or storage URL.
///
/// `bucket` defaults to the configured coupon image bucket.
#[flutter_rust_bridge::frb(sync)]
pub fn normalize_image_key(raw: String, bucket: Option<String>) -> Option<String> {
    let bucket = bucket.unwrap_or_else(|| EngineConfig::default().image_bucket);
    normalize_storage_key(&raw, &bucket)
}

/// Where a freshly picked image should be uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUploadTarget {
    pub key: String,
    pub content_type: String,
}

#[flutter_rust_bridge::frb(sync)]
pub fn coupon_image_upload_target(
    user_id: String,
    coupon_id: String,
    local_uri: String,
) -> ImageUploadTarget {
    let target = coupon_image_key(user_id.trim(), coupon_id.trim(), &local_uri);
    ImageUploadTarget {
        key: target.key,
        content_type: target.content_type.to_string(),
    }
}

/// Handle bookkeeping response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleResponse {
    pub ok: bool,
    /// Platform notification ids Dart must cancel now.
    pub cancel_handles: Vec<String>,
    /// Dart must also cancel every notification of the app.
    pub cancel_all_in_namespace: bool,
    pub message: String,
}

impl HandleResponse {
    fn from_result(result: Result<(String, CancelRequest), String>) -> Self {
        match result {
            Ok((message, request)) => Self {
                ok: true,
                cancel_handles: request.handles,
                cancel_all_in_namespace: request.all_in_namespace,
                message,
            },
            Err(message) => Self {
                ok: false,
                cancel_handles: Vec::new(),
                cancel_all_in_namespace: false,
                message,
            },
        }
    }
}

/// Records the platform handle of a freshly scheduled reminder.
///
/// `kind` is `lead` or `day_before`. A previous, different handle for the
/// same coupon and kind is returned for cancellation.
#[flutter_rust_bridge::frb(sync)]
pub fn schedule_handle_record(coupon_id: String, kind: String, handle: String) -> HandleResponse {
    HandleResponse::from_result(record_handle(&coupon_id, &kind, &handle))
}

/// Returns the recorded handle of one reminder, if any.
#[flutter_rust_bridge::frb(sync)]
pub fn schedule_handle_get(coupon_id: String, kind: String) -> Option<String> {
    let kind = parse_kind(&kind).ok()?;
    let result = with_schedule_store(|store| async move {
        Ok(store
            .get(coupon_id.trim(), kind)
            .await?
            .map(SchedulerHandle::into_inner))
    });
    match result {
        Ok((handle, _)) => handle,
        Err(err) => {
            warn!("event=ffi_handle_get module=ffi status=error error={err}");
            None
        }
    }
}

/// Forgets both reminders of one coupon (consumed, deleted, rescheduled).
#[flutter_rust_bridge::frb(sync)]
pub fn schedule_handles_clear_coupon(coupon_id: String) -> HandleResponse {
    HandleResponse::from_result(clear_coupon_handles(&coupon_id))
}

/// Forgets every recorded reminder (logout, full reschedule).
///
/// The response sets `cancel_all_in_namespace`, so Dart also cancels
/// notifications whose mapping was lost.
#[flutter_rust_bridge::frb(sync)]
pub fn schedule_handles_clear_all() -> HandleResponse {
    HandleResponse::from_result(with_schedule_store(|store| async move {
        let report = store.clear_all().await?;
        Ok(format!("Cleared {} reminder(s).", report.removed))
    }))
}

/// Cancellations requested by the store during one call.
#[derive(Debug, Default)]
struct CancelRequest {
    handles: Vec<String>,
    all_in_namespace: bool,
}

/// Cancellation sink: the store decides what to cancel, Dart performs it.
#[derive(Default)]
struct CancelCollector {
    handles: Mutex<Vec<String>>,
    all_in_namespace: AtomicBool,
}

impl CancelCollector {
    fn drain(&self) -> CancelRequest {
        CancelRequest {
            handles: std::mem::take(
                &mut *self.handles.lock().unwrap_or_else(|poisoned| poisoned.into_inner()),
            ),
            all_in_namespace: self.all_in_namespace.swap(false, Ordering::SeqCst),
        }
    }
}

#[async_trait]
impl NotificationScheduler for CancelCollector {
    async fn schedule(
        &self,
        _content: &NotificationContent,
        _trigger_at: DateTime<Utc>,
    ) -> CollabResult<SchedulerHandle> {
        Err(CollabError::new(
            "notifier",
            "unsupported",
            "scheduling happens on the Dart side",
            false,
        ))
    }

    async fn cancel(&self, handle: &SchedulerHandle) -> CollabResult<()> {
        self.handles
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(handle.as_str().to_string());
        Ok(())
    }

    async fn cancel_all_in_namespace(&self) -> CollabResult<()> {
        self.all_in_namespace.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn permission_status(&self) -> CollabResult<PermissionStatus> {
        Ok(PermissionStatus::Granted)
    }

    async fn pending(&self) -> CollabResult<Vec<PendingNotification>> {
        Ok(Vec::new())
    }
}

fn record_handle(coupon_id: &str, kind: &str, handle: &str) -> Result<(String, CancelRequest), String> {
    let kind = parse_kind(kind)?;
    let coupon_id = non_empty(coupon_id, "coupon_id")?;
    let handle = SchedulerHandle::new(non_empty(handle, "handle")?);
    with_schedule_store(|store| async move {
        store.set(&coupon_id, kind, &handle).await?;
        Ok("Handle recorded.".to_string())
    })
}

fn clear_coupon_handles(coupon_id: &str) -> Result<(String, CancelRequest), String> {
    let coupon_id = non_empty(coupon_id, "coupon_id")?;
    with_schedule_store(|store| async move {
        let removed = store.clear_coupon(&coupon_id).await?;
        Ok(format!("Cleared {removed} reminder(s)."))
    })
}

fn with_schedule_store<T, F, Fut>(f: F) -> Result<(T, CancelRequest), String>
where
    F: FnOnce(Arc<LocalScheduleStore>) -> Fut,
    Fut: std::future::Future<Output = StoreResult<T>>,
{
    let db_path = resolve_schedule_db_path();
    let kv = SqliteKvStore::open(&db_path)
        .map_err(|err| format!("schedule DB open failed: {err}"))?;
    let collector = Arc::new(CancelCollector::default());
    let store = Arc::new(LocalScheduleStore::new(
        Arc::new(kv),
        collector.clone(),
        EngineConfig::default().storage_key_prefix,
    ));
    let value = block_on(f(store)).map_err(|err| err.to_string())?;
    Ok((value, collector.drain()))
}

fn resolve_schedule_db_path() -> PathBuf {
    SCHEDULE_DB_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var("DOTORING_DB_PATH") {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(SCHEDULE_DB_FILE_NAME)
        })
        .clone()
}

fn parse_coupon(id: String, expire_date: String, status: Option<String>) -> Result<Coupon, String> {
    Coupon::try_from(CouponRecord {
        id,
        title: String::new(),
        expire_date,
        status,
        image_url: None,
    })
    .map_err(|err| err.to_string())
}

fn parse_now(raw: &str) -> Result<ManualClock, String> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(ManualClock::new)
        .map_err(|err| format!("invalid now `{raw}`: {err}"))
}

fn parse_kind(raw: &str) -> Result<ReminderKind, String> {
    match raw.trim() {
        "lead" => Ok(ReminderKind::Lead),
        "day_before" | "d1" => Ok(ReminderKind::DayBefore),
        other => Err(format!("unknown reminder kind `{other}`; expected lead|day_before")),
    }
}

fn non_empty(raw: &str, field: &str) -> Result<String, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(format!("{field} cannot be empty"));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::{
        coupon_image_upload_target, coupon_is_eligible, core_version, init_logging,
        normalize_image_key, ping, plan_coupon_reminders, schedule_handle_get,
        schedule_handle_record, schedule_handles_clear_all, schedule_handles_clear_coupon,
    };
    use std::time::{SystemTime, UNIX_EPOCH};

    const NOW: &str = "2026-10-17T12:00:00+09:00";

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_empty_log_dir() {
        let error = init_logging("info".to_string(), String::new());
        assert!(!error.is_empty());
    }

    #[test]
    fn init_logging_rejects_unsupported_level() {
        let error = init_logging("verbose".to_string(), "tmp/logs".to_string());
        assert!(!error.is_empty());
    }

    #[test]
    fn plan_returns_two_reminders_for_week_lead() {
        let response = plan_coupon_reminders(
            "c-1".to_string(),
            "2026-10-27".to_string(),
            None,
            7,
            NOW.to_string(),
            None,
        );

        assert!(response.ok, "{}", response.message);
        let kinds: Vec<&str> = response.reminders.iter().map(|r| r.kind.as_str()).collect();
        assert_eq!(kinds, vec!["day_before", "lead"]);
        assert_eq!(response.reminders[0].trigger_at, "2026-10-26T00:00:00+00:00");
        assert_eq!(response.reminders[1].trigger_at, "2026-10-20T00:00:00+00:00");
    }

    #[test]
    fn plan_rejects_malformed_dates() {
        let response = plan_coupon_reminders(
            "c-1".to_string(),
            "27.10.2026".to_string(),
            None,
            7,
            NOW.to_string(),
            None,
        );
        assert!(!response.ok);
        assert!(response.message.contains("expire_date"));
    }

    #[test]
    fn eligibility_follows_status_and_expiry() {
        assert!(coupon_is_eligible("2026-10-17".to_string(), None, NOW.to_string()));
        assert!(!coupon_is_eligible("2026-10-16".to_string(), None, NOW.to_string()));
        assert!(!coupon_is_eligible(
            "2026-10-20".to_string(),
            Some("used".to_string()),
            NOW.to_string()
        ));
        assert!(!coupon_is_eligible("2026-10-20".to_string(), None, "yesterday".to_string()));
    }

    #[test]
    fn image_helpers_follow_bucket_layout() {
        assert_eq!(
            normalize_image_key(
                "https://p.supabase.co/storage/v1/object/public/coupon-images/coupons/u/c.png"
                    .to_string(),
                None
            )
            .as_deref(),
            Some("coupons/u/c.png")
        );
        let target = coupon_image_upload_target(
            "u".to_string(),
            "c".to_string(),
            "file:///tmp/pick.PNG".to_string(),
        );
        assert_eq!(target.key, "coupons/u/c.png");
        assert_eq!(target.content_type, "image/png");
    }

    #[test]
    fn handle_bookkeeping_returns_handles_to_cancel() {
        let coupon_id = unique_token("coupon");

        let first = schedule_handle_record(coupon_id.clone(), "lead".to_string(), "101".to_string());
        assert!(first.ok, "{}", first.message);
        assert!(first.cancel_handles.is_empty());

        let replaced =
            schedule_handle_record(coupon_id.clone(), "lead".to_string(), "102".to_string());
        assert_eq!(replaced.cancel_handles, vec!["101".to_string()]);
        assert_eq!(
            schedule_handle_get(coupon_id.clone(), "lead".to_string()).as_deref(),
            Some("102")
        );

        schedule_handle_record(coupon_id.clone(), "day_before".to_string(), "103".to_string());
        let mut cleared = schedule_handles_clear_coupon(coupon_id.clone());
        cleared.cancel_handles.sort();
        assert_eq!(cleared.cancel_handles, vec!["102".to_string(), "103".to_string()]);
        assert!(!cleared.cancel_all_in_namespace);
        assert_eq!(schedule_handle_get(coupon_id.clone(), "lead".to_string()), None);

        // Clearing everything runs here, after the per-coupon steps, because
        // all tests share one schedule database.
        schedule_handle_record(coupon_id.clone(), "lead".to_string(), "104".to_string());
        let wiped = schedule_handles_clear_all();
        assert!(wiped.ok, "{}", wiped.message);
        assert!(wiped.cancel_all_in_namespace);
        assert!(wiped.cancel_handles.contains(&"104".to_string()));
        assert_eq!(schedule_handle_get(coupon_id, "lead".to_string()), None);
    }

    #[test]
    fn handle_record_rejects_unknown_kind() {
        let response = schedule_handle_record("c".to_string(), "weekly".to_string(), "1".to_string());
        assert!(!response.ok);
        assert!(response.message.contains("weekly"));
    }

    fn unique_token(prefix: &str) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time went backwards")
            .as_nanos();
        format!("{prefix}-{nanos}")
    }
}
