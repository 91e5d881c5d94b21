//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `dotoring_core` linkage.
//! - Run one full reminder reconciliation against in-memory collaborators
//!   and print the outcome, for quick local sanity checks.

use chrono::{Days, Local};
use dotoring_core::spi::memory::{
    MemoryCouponSource, MemoryKvStore, MemoryNotificationScheduler, MemorySettingsSource,
    MemoryUrlSigner,
};
use dotoring_core::{
    Collaborators, CouponRecord, DotoringEngine, EngineConfig, RescheduleOutcome, SettingsRecord,
    SystemClock,
};
use std::process::ExitCode;
use std::sync::Arc;

const DEMO_USER: &str = "demo-user";

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    println!("dotoring_core ping={}", dotoring_core::ping());
    println!("dotoring_core version={}", dotoring_core::core_version());

    match run_demo().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("demo failed: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run_demo() -> Result<(), Box<dyn std::error::Error>> {
    let notifier = Arc::new(MemoryNotificationScheduler::new());
    let settings = Arc::new(MemorySettingsSource::new());
    settings.put(
        DEMO_USER,
        SettingsRecord {
            notif_enabled: Some(true),
            notify_lead_days: Some(3),
        },
    );
    let coupons = Arc::new(MemoryCouponSource::new());
    let today = Local::now().date_naive();
    for (index, offset) in [0_u64, 2, 5, 12, 45].into_iter().enumerate() {
        let expire = today
            .checked_add_days(Days::new(offset))
            .ok_or("date overflow")?;
        coupons.insert(
            DEMO_USER,
            CouponRecord {
                id: format!("demo-{index}"),
                title: format!("Demo coupon {index}"),
                expire_date: expire.format("%Y-%m-%d").to_string(),
                status: None,
                image_url: Some(format!("coupons/{DEMO_USER}/demo-{index}.jpg")),
            },
        );
    }

    let engine = DotoringEngine::new(
        EngineConfig::default(),
        Collaborators {
            notifier: notifier.clone(),
            kv: Arc::new(MemoryKvStore::new()),
            settings,
            coupons,
            signer: Arc::new(MemoryUrlSigner::default()),
        },
        Arc::new(SystemClock),
    )?;

    match engine.coordinator().reschedule_all(DEMO_USER).await {
        RescheduleOutcome::Completed(report) => println!(
            "reschedule status=ok candidates={} scheduled={} skipped={} failed={} capped={}",
            report.candidates,
            report.scheduled,
            report.skipped,
            report.failed,
            report.capped()
        ),
        RescheduleOutcome::Disabled { reason } => println!("reschedule status=skip reason={reason}"),
        RescheduleOutcome::Failed { stage, message } => {
            println!("reschedule status=error stage={stage:?} message={message}")
        }
    }

    let diagnostics = engine.diagnostics().await?;
    for entry in &diagnostics.entries {
        println!("reminder coupon_id={} kind={}", entry.coupon_id, entry.kind);
    }
    println!("pending_notifications={}", notifier.pending_count());

    let keys: Vec<Option<String>> = (0..3)
        .map(|index| Some(format!("coupons/{DEMO_USER}/demo-{index}.jpg")))
        .collect();
    let urls = engine.urls().resolve_many(keys.as_slice()).await;
    println!(
        "signed_urls resolved={} cached={}",
        urls.iter().flatten().count(),
        engine.urls().len()
    );

    let report = engine.lifecycle().on_logout().await?;
    println!(
        "logout removed={} pending_notifications={}",
        report.removed,
        notifier.pending_count()
    );
    Ok(())
}
