//! Settings resolver with a short-lived read cache.
//!
//! # Invariants
//! - `get_settings` never fails: remote errors fall back to the last cached
//!   value for the same user, else to the defaults.
//! - A failed read never refreshes the cache timestamp, so the next call
//!   retries the remote store.

use crate::clock::Clock;
use crate::model::settings::{NotificationSettings, SettingsRecord};
use crate::spi::{CollabResult, SettingsSource};
use chrono::{DateTime, FixedOffset, TimeDelta};
use log::{debug, warn};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone)]
struct CachedSettings {
    user_id: String,
    settings: NotificationSettings,
    fetched_at: DateTime<FixedOffset>,
}

pub struct SettingsResolver {
    source: Arc<dyn SettingsSource>,
    clock: Arc<dyn Clock>,
    ttl: TimeDelta,
    cache: Mutex<Option<CachedSettings>>,
}

impl SettingsResolver {
    pub fn new(source: Arc<dyn SettingsSource>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            source,
            clock,
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
            cache: Mutex::new(None),
        }
    }

    /// Returns the user's reminder settings, from cache when younger than the TTL.
    pub async fn get_settings(&self, user_id: &str) -> NotificationSettings {
        let now = self.clock.now();
        if let Some(cached) = self.cached_for(user_id) {
            let age = now - cached.fetched_at;
            if age >= TimeDelta::zero() && age < self.ttl {
                return cached.settings;
            }
        }

        match self.source.fetch_settings(user_id).await {
            Ok(record) => {
                let settings = record.map(NotificationSettings::from).unwrap_or_default();
                self.store(user_id, settings, now);
                debug!(
                    "event=settings_fetch module=notify status=ok enabled={} lead_days={}",
                    settings.enabled, settings.lead_days
                );
                settings
            }
            Err(err) => {
                let fallback = self.cached_for(user_id).map(|cached| cached.settings);
                warn!(
                    "event=settings_fetch module=notify status=error fallback={} error={err}",
                    if fallback.is_some() { "cache" } else { "defaults" }
                );
                fallback.unwrap_or_default()
            }
        }
    }

    /// Writes settings remotely, then refreshes the cache with them.
    pub async fn update(&self, user_id: &str, settings: NotificationSettings) -> CollabResult<()> {
        self.source
            .upsert_settings(user_id, &SettingsRecord::from(settings))
            .await?;
        self.store(user_id, settings, self.clock.now());
        Ok(())
    }

    /// Drops the cached value (logout, external settings change).
    pub fn invalidate(&self) {
        *self.lock() = None;
    }

    fn cached_for(&self, user_id: &str) -> Option<CachedSettings> {
        self.lock()
            .as_ref()
            .filter(|cached| cached.user_id == user_id)
            .cloned()
    }

    fn store(&self, user_id: &str, settings: NotificationSettings, fetched_at: DateTime<FixedOffset>) {
        *self.lock() = Some(CachedSettings {
            user_id: user_id.to_string(),
            settings,
            fetched_at,
        });
    }

    fn lock(&self) -> MutexGuard<'_, Option<CachedSettings>> {
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::SettingsResolver;
    use crate::clock::{Clock, ManualClock};
    use crate::model::settings::{LeadDays, NotificationSettings, SettingsRecord};
    use crate::spi::memory::MemorySettingsSource;
    use chrono::{DateTime, TimeDelta};
    use std::sync::Arc;
    use std::time::Duration;

    fn setup() -> (Arc<MemorySettingsSource>, Arc<ManualClock>, SettingsResolver) {
        let source = Arc::new(MemorySettingsSource::new());
        let clock = Arc::new(ManualClock::new(
            DateTime::parse_from_rfc3339("2026-10-17T10:00:00+09:00").unwrap(),
        ));
        let resolver = SettingsResolver::new(
            source.clone(),
            clock.clone() as Arc<dyn Clock>,
            Duration::from_secs(60),
        );
        (source, clock, resolver)
    }

    #[tokio::test]
    async fn missing_record_resolves_to_defaults() {
        let (_, _, resolver) = setup();
        assert_eq!(resolver.get_settings("u-1").await, NotificationSettings::default());
    }

    #[tokio::test]
    async fn reads_within_ttl_hit_cache() {
        let (source, clock, resolver) = setup();
        source.put(
            "u-1",
            SettingsRecord {
                notif_enabled: Some(true),
                notify_lead_days: Some(7),
            },
        );

        assert_eq!(resolver.get_settings("u-1").await.lead_days, LeadDays::Seven);
        clock.advance(TimeDelta::seconds(59));
        resolver.get_settings("u-1").await;
        assert_eq!(source.fetch_calls(), 1);

        clock.advance(TimeDelta::seconds(1));
        resolver.get_settings("u-1").await;
        assert_eq!(source.fetch_calls(), 2);
    }

    #[tokio::test]
    async fn cache_is_scoped_to_one_user() {
        let (source, _, resolver) = setup();
        source.put(
            "u-1",
            SettingsRecord {
                notif_enabled: Some(false),
                notify_lead_days: None,
            },
        );
        assert!(!resolver.get_settings("u-1").await.enabled);
        assert!(resolver.get_settings("u-2").await.enabled);
        assert_eq!(source.fetch_calls(), 2);
    }

    #[tokio::test]
    async fn update_writes_through_and_refreshes_cache() {
        let (source, _, resolver) = setup();
        let wanted = NotificationSettings {
            enabled: false,
            lead_days: LeadDays::Thirty,
        };
        resolver.update("u-1", wanted).await.unwrap();

        assert_eq!(source.get_row("u-1").unwrap().notify_lead_days, Some(30));
        assert_eq!(resolver.get_settings("u-1").await, wanted);
        assert_eq!(source.fetch_calls(), 0);

        resolver.invalidate();
        resolver.get_settings("u-1").await;
        assert_eq!(source.fetch_calls(), 1);
    }
}
