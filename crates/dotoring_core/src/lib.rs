//! On-device core for coupon expiry reminders and coupon image URLs.
//!
//! The crate owns the only stateful parts of the app: which coupons carry a
//! local reminder (and the scheduler handles needed to cancel them), and the
//! signed-URL cache used to display coupon thumbnails. Everything else is
//! reached through the collaborator traits in [`spi`].

pub mod clock;
pub mod config;
pub mod db;
pub mod logging;
pub mod media;
pub mod model;
pub mod notify;
pub mod repo;
pub mod service;
pub mod spi;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, EngineConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use media::signed_url_cache::{CachedUrl, SignedUrlCache};
pub use media::storage_key::{coupon_image_key, is_absolute_url, normalize_storage_key};
pub use model::coupon::{Coupon, CouponId, CouponRecord, CouponStatus, CouponValidationError};
pub use model::schedule::{ReminderKind, ScheduleEntry, SchedulerHandle};
pub use model::settings::{LeadDays, LeadDaysError, NotificationSettings, SettingsRecord};
pub use notify::eligibility::is_eligible;
pub use notify::planner::{PlannedTrigger, TriggerPlan, TriggerPlanner};
pub use notify::reschedule::{
    RescheduleCoordinator, RescheduleOutcome, RescheduleReport, RescheduleStage,
};
pub use notify::scheduler::{
    EngineError, EngineResult, ReminderScheduler, ScheduleOutcome, SkipReason,
};
pub use notify::settings::SettingsResolver;
pub use repo::kv_store::SqliteKvStore;
pub use repo::schedule_store::{ClearAllReport, LocalScheduleStore, StoreError, StoreResult};
pub use service::coupon_lifecycle::CouponLifecycleService;
pub use service::engine::{Collaborators, DotoringEngine, EngineDiagnostics};
pub use spi::{CollabError, CollabResult};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
