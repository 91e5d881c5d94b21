use chrono::{NaiveDate, TimeZone, Utc};
use dotoring_core::model::coupon::Coupon;
use dotoring_core::model::schedule::{ReminderKind, SchedulerHandle};
use dotoring_core::notify::content::render;
use dotoring_core::repo::kv_store::SqliteKvStore;
use dotoring_core::repo::schedule_store::LocalScheduleStore;
use dotoring_core::spi::memory::{MemoryKvStore, MemoryNotificationScheduler};
use dotoring_core::spi::{KeyValueStore, NotificationScheduler};
use std::sync::Arc;

const PREFIX: &str = "dotoring:notif:coupon:";

fn coupon(id: &str) -> Coupon {
    Coupon::new(id, "Latte", NaiveDate::from_ymd_opt(2026, 11, 1).unwrap())
}

async fn schedule_one(
    notifier: &MemoryNotificationScheduler,
    id: &str,
    kind: ReminderKind,
) -> SchedulerHandle {
    let content = render(&coupon(id), kind, 1, "default");
    let trigger_at = Utc.with_ymd_and_hms(2026, 10, 31, 0, 0, 0).unwrap();
    notifier.schedule(&content, trigger_at).await.unwrap()
}

#[tokio::test]
async fn mappings_survive_reopening_the_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("schedule.db");
    let notifier = Arc::new(MemoryNotificationScheduler::new());
    let handle = schedule_one(&notifier, "c-1", ReminderKind::DayBefore).await;

    {
        let kv = Arc::new(SqliteKvStore::open(&path).unwrap());
        let store = LocalScheduleStore::new(kv, notifier.clone(), PREFIX);
        store.set("c-1", ReminderKind::DayBefore, &handle).await.unwrap();
    }

    let kv = Arc::new(SqliteKvStore::open(&path).unwrap());
    let store = LocalScheduleStore::new(kv, notifier.clone(), PREFIX);
    assert_eq!(
        store.get("c-1", ReminderKind::DayBefore).await.unwrap(),
        Some(handle.clone())
    );

    assert!(store.clear("c-1", ReminderKind::DayBefore).await.unwrap());
    assert!(!notifier.is_pending(&handle));
    assert_eq!(store.get("c-1", ReminderKind::DayBefore).await.unwrap(), None);
}

#[tokio::test]
async fn set_replaces_and_cancels_previous_handle() {
    let notifier = Arc::new(MemoryNotificationScheduler::new());
    let store = LocalScheduleStore::new(Arc::new(MemoryKvStore::new()), notifier.clone(), PREFIX);

    let first = schedule_one(&notifier, "c-1", ReminderKind::Lead).await;
    let second = schedule_one(&notifier, "c-1", ReminderKind::Lead).await;
    store.set("c-1", ReminderKind::Lead, &first).await.unwrap();
    store.set("c-1", ReminderKind::Lead, &second).await.unwrap();

    assert!(!notifier.is_pending(&first));
    assert!(notifier.is_pending(&second));
    assert_eq!(store.entries().await.unwrap().len(), 1);
    assert_eq!(
        store.get("c-1", ReminderKind::Lead).await.unwrap(),
        Some(second)
    );
}

#[tokio::test]
async fn setting_the_same_handle_twice_does_not_cancel_it() {
    let notifier = Arc::new(MemoryNotificationScheduler::new());
    let store = LocalScheduleStore::new(Arc::new(MemoryKvStore::new()), notifier.clone(), PREFIX);

    let handle = schedule_one(&notifier, "c-1", ReminderKind::DayBefore).await;
    store.set("c-1", ReminderKind::DayBefore, &handle).await.unwrap();
    store.set("c-1", ReminderKind::DayBefore, &handle).await.unwrap();

    assert!(notifier.is_pending(&handle));
    assert_eq!(notifier.cancel_calls(), 0);
}

#[tokio::test]
async fn clearing_unknown_mapping_is_a_no_op() {
    let notifier = Arc::new(MemoryNotificationScheduler::new());
    let store = LocalScheduleStore::new(Arc::new(MemoryKvStore::new()), notifier.clone(), PREFIX);

    assert!(!store.clear("missing", ReminderKind::Lead).await.unwrap());
    assert_eq!(store.clear_coupon("missing").await.unwrap(), 0);
    assert_eq!(notifier.cancel_calls(), 0);
}

#[tokio::test]
async fn clear_coupon_removes_both_kinds_only_for_that_coupon() {
    let notifier = Arc::new(MemoryNotificationScheduler::new());
    let store = LocalScheduleStore::new(Arc::new(MemoryKvStore::new()), notifier.clone(), PREFIX);

    for (id, kind) in [
        ("c-1", ReminderKind::Lead),
        ("c-1", ReminderKind::DayBefore),
        ("c-2", ReminderKind::DayBefore),
    ] {
        let handle = schedule_one(&notifier, id, kind).await;
        store.set(id, kind, &handle).await.unwrap();
    }

    assert_eq!(store.clear_coupon("c-1").await.unwrap(), 2);

    let entries = store.entries().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].coupon_id, "c-2");
    assert_eq!(entries[0].kind, ReminderKind::DayBefore);
    assert_eq!(notifier.pending_count(), 1);
}

#[tokio::test]
async fn clear_all_also_cancels_notifications_without_mapping() {
    let notifier = Arc::new(MemoryNotificationScheduler::new());
    let kv = Arc::new(MemoryKvStore::new());
    let store = LocalScheduleStore::new(kv.clone(), notifier.clone(), PREFIX);

    let mapped = schedule_one(&notifier, "c-1", ReminderKind::DayBefore).await;
    store.set("c-1", ReminderKind::DayBefore, &mapped).await.unwrap();
    // Orphan: scheduled but its mapping was lost.
    schedule_one(&notifier, "c-9", ReminderKind::DayBefore).await;
    // Foreign key outside the prefix must survive the sweep.
    kv.set("other:key", "value").await.unwrap();

    let report = store.clear_all().await.unwrap();

    assert_eq!(report.removed, 1);
    assert!(report.namespace_cancelled);
    assert_eq!(notifier.pending_count(), 0);
    assert!(store.entries().await.unwrap().is_empty());
    assert_eq!(kv.get("other:key").await.unwrap().as_deref(), Some("value"));
}

#[tokio::test]
async fn clear_all_removes_mappings_even_when_namespace_cancel_fails() {
    let notifier = Arc::new(MemoryNotificationScheduler::new());
    let store = LocalScheduleStore::new(Arc::new(MemoryKvStore::new()), notifier.clone(), PREFIX);

    let mapped = schedule_one(&notifier, "c-1", ReminderKind::Lead).await;
    store.set("c-1", ReminderKind::Lead, &mapped).await.unwrap();
    let orphan = schedule_one(&notifier, "c-9", ReminderKind::DayBefore).await;
    notifier.fail_namespace_cancel(true);

    let report = store.clear_all().await.unwrap();

    assert_eq!(report.removed, 1);
    assert!(!report.namespace_cancelled);
    assert_eq!(notifier.cancel_all_calls(), 1);
    assert!(!notifier.is_pending(&mapped));
    assert!(notifier.is_pending(&orphan));
    assert!(store.entries().await.unwrap().is_empty());
}

#[tokio::test]
async fn kv_failure_surfaces_as_store_error() {
    let notifier = Arc::new(MemoryNotificationScheduler::new());
    let kv = Arc::new(MemoryKvStore::new());
    let store = LocalScheduleStore::new(kv.clone(), notifier.clone(), PREFIX);
    kv.set_failing(true);

    let err = store
        .set("c-1", ReminderKind::Lead, &SchedulerHandle::from("h-1"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("schedule store unavailable"));
}

#[tokio::test]
async fn storage_key_layout_is_prefix_id_and_kind() {
    let store = LocalScheduleStore::new(
        Arc::new(MemoryKvStore::new()),
        Arc::new(MemoryNotificationScheduler::new()),
        PREFIX,
    );

    assert_eq!(
        store.storage_key("c-1", ReminderKind::Lead),
        "dotoring:notif:coupon:c-1:lead"
    );
    assert_eq!(
        store.storage_key("c-1", ReminderKind::DayBefore),
        "dotoring:notif:coupon:c-1:d1"
    );
}
