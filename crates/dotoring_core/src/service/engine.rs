//! Engine wiring.

use super::coupon_lifecycle::CouponLifecycleService;
use crate::clock::Clock;
use crate::config::{ConfigError, EngineConfig};
use crate::media::signed_url_cache::SignedUrlCache;
use crate::notify::planner::TriggerPlanner;
use crate::notify::reschedule::RescheduleCoordinator;
use crate::notify::scheduler::ReminderScheduler;
use crate::notify::settings::SettingsResolver;
use crate::model::schedule::ScheduleEntry;
use crate::repo::schedule_store::{LocalScheduleStore, StoreResult};
use crate::spi::{
    CouponSource, KeyValueStore, NotificationScheduler, PendingNotification, SettingsSource,
    UrlSigner,
};
use log::{debug, info, warn};
use std::sync::Arc;

/// External collaborators the engine runs against.
#[derive(Clone)]
pub struct Collaborators {
    pub notifier: Arc<dyn NotificationScheduler>,
    pub kv: Arc<dyn KeyValueStore>,
    pub settings: Arc<dyn SettingsSource>,
    pub coupons: Arc<dyn CouponSource>,
    pub signer: Arc<dyn UrlSigner>,
}

/// Snapshot of on-device reminder state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineDiagnostics {
    pub entries: Vec<ScheduleEntry>,
    /// `None` when the scheduler could not be queried.
    pub pending: Option<Vec<PendingNotification>>,
    pub cached_urls: usize,
}

/// All engine components, created once at app start and torn down on logout.
pub struct DotoringEngine {
    config: EngineConfig,
    settings: Arc<SettingsResolver>,
    store: Arc<LocalScheduleStore>,
    scheduler: Arc<ReminderScheduler>,
    notifier: Arc<dyn NotificationScheduler>,
    coordinator: RescheduleCoordinator,
    urls: SignedUrlCache,
    lifecycle: CouponLifecycleService,
}

impl DotoringEngine {
    /// Validates `config` and builds every component.
    pub fn new(
        config: EngineConfig,
        collaborators: Collaborators,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let settings = Arc::new(SettingsResolver::new(
            collaborators.settings,
            Arc::clone(&clock),
            config.settings_ttl(),
        ));
        let store = Arc::new(LocalScheduleStore::new(
            collaborators.kv,
            Arc::clone(&collaborators.notifier),
            config.storage_key_prefix.clone(),
        ));
        let scheduler = Arc::new(ReminderScheduler::new(
            Arc::clone(&settings),
            Arc::clone(&store),
            Arc::clone(&collaborators.notifier),
            Arc::clone(&clock),
            TriggerPlanner::new(config.reminder_hour),
            config.notification_channel.clone(),
        ));
        let coordinator = RescheduleCoordinator::new(
            Arc::clone(&scheduler),
            Arc::clone(&settings),
            Arc::clone(&store),
            collaborators.coupons,
            Arc::clone(&clock),
            config.max_scheduled,
            config.candidate_fetch_limit,
        );
        let urls = SignedUrlCache::new(collaborators.signer, clock, &config);
        let lifecycle = CouponLifecycleService::new(
            Arc::clone(&scheduler),
            Arc::clone(&store),
            Arc::clone(&settings),
            urls.clone(),
        );

        info!(
            "event=engine_init module=service status=ok max_scheduled={} fetch_limit={} reminder_hour={}",
            config.max_scheduled, config.candidate_fetch_limit, config.reminder_hour
        );
        Ok(Self {
            config,
            settings,
            store,
            scheduler,
            notifier: collaborators.notifier,
            coordinator,
            urls,
            lifecycle,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn settings(&self) -> &SettingsResolver {
        &self.settings
    }

    pub fn schedule_store(&self) -> &LocalScheduleStore {
        &self.store
    }

    pub fn scheduler(&self) -> &ReminderScheduler {
        &self.scheduler
    }

    pub fn coordinator(&self) -> &RescheduleCoordinator {
        &self.coordinator
    }

    pub fn urls(&self) -> &SignedUrlCache {
        &self.urls
    }

    pub fn lifecycle(&self) -> &CouponLifecycleService {
        &self.lifecycle
    }

    /// Persisted mappings next to what the scheduler reports as pending.
    pub async fn diagnostics(&self) -> StoreResult<EngineDiagnostics> {
        let entries = self.store.entries().await?;
        let pending = match self.notifier.pending().await {
            Ok(pending) => Some(pending),
            Err(err) => {
                warn!("event=diagnostics module=service status=error stage=pending error={err}");
                None
            }
        };
        debug!(
            "event=diagnostics module=service status=ok entries={} pending={}",
            entries.len(),
            pending.as_ref().map_or(0, Vec::len)
        );
        Ok(EngineDiagnostics {
            entries,
            pending,
            cached_urls: self.urls.len(),
        })
    }
}
