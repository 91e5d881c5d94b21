//! TTL cache from storage keys to signed URLs.
//!
//! # Invariants
//! - Entries are served only while `now < expires_at`; expired entries are
//!   evicted on read.
//! - `expires_at` is set to a fraction of the signed URL's real lifetime, so
//!   a served URL never expires mid-use.
//! - Keys missing from the cache in one `resolve_many` call are signed in a
//!   single round trip; keys already being signed join that call.
//! - Failed signing is never cached.
//! - `invalidate` drops the entry and detaches any in-flight signing for the
//!   key, so a result signed before invalidation is never cached.

use super::storage_key::{is_absolute_url, normalize_storage_key};
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::spi::UrlSigner;
use chrono::{DateTime, FixedOffset, TimeDelta};
use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use log::{debug, warn};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

type SignedBatch = HashMap<String, Option<String>>;
type BatchFuture = Shared<BoxFuture<'static, Arc<SignedBatch>>>;

/// One cached signed URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedUrl {
    pub url: String,
    pub expires_at: DateTime<FixedOffset>,
}

struct InFlight {
    batch_id: u64,
    batch: BatchFuture,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CachedUrl>,
    in_flight: HashMap<String, InFlight>,
    next_batch_id: u64,
}

struct CacheInner {
    signer: Arc<dyn UrlSigner>,
    clock: Arc<dyn Clock>,
    bucket: String,
    signed_ttl: Duration,
    cache_ttl: TimeDelta,
    state: Mutex<CacheState>,
}

/// How one requested reference is answered.
enum Slot {
    Ready(Option<String>),
    Key(String),
}

/// Process-wide signed-URL cache. Cloning shares the same cache.
#[derive(Clone)]
pub struct SignedUrlCache {
    inner: Arc<CacheInner>,
}

impl SignedUrlCache {
    pub fn new(signer: Arc<dyn UrlSigner>, clock: Arc<dyn Clock>, config: &EngineConfig) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                signer,
                clock,
                bucket: config.image_bucket.clone(),
                signed_ttl: config.signed_url_ttl(),
                cache_ttl: TimeDelta::from_std(config.url_cache_ttl()).unwrap_or(TimeDelta::zero()),
                state: Mutex::new(CacheState::default()),
            }),
        }
    }

    /// Resolves one raw image reference to a fetchable URL.
    ///
    /// Absolute URLs are returned unchanged; anything else is treated as a
    /// storage key of the configured bucket.
    pub async fn resolve(&self, raw: &str) -> Option<String> {
        self.resolve_many(&[Some(raw)]).await.pop().flatten()
    }

    /// Resolves a page of optional raw references, preserving order.
    ///
    /// Issues at most one signing call for all keys that are neither cached
    /// nor already being signed.
    pub async fn resolve_many<S: AsRef<str>>(&self, raws: &[Option<S>]) -> Vec<Option<String>> {
        let slots: Vec<Slot> = raws
            .iter()
            .map(|raw| self.classify(raw.as_ref().map(AsRef::as_ref)))
            .collect();

        let (mut known, waits) = self.lookup_or_start(&slots);

        for batch in join_all(waits).await {
            for (key, url) in batch.iter() {
                known.entry(key.clone()).or_insert_with(|| url.clone());
            }
        }

        slots
            .into_iter()
            .map(|slot| match slot {
                Slot::Ready(value) => value,
                Slot::Key(key) => known.get(&key).cloned().flatten(),
            })
            .collect()
    }

    /// Forgets the cached URL for one key (image deleted or replaced).
    ///
    /// Returns whether an entry or in-flight signing was dropped.
    pub fn invalidate(&self, raw: &str) -> bool {
        let Some(key) = normalize_storage_key(raw, &self.inner.bucket) else {
            return false;
        };
        let mut state = self.inner.lock();
        let had_entry = state.entries.remove(&key).is_some();
        let had_flight = state.in_flight.remove(&key).is_some();
        debug!(
            "event=url_cache_invalidate module=media status=ok had_entry={had_entry} had_flight={had_flight}"
        );
        had_entry || had_flight
    }

    /// Drops every entry (logout, account deletion).
    pub fn clear(&self) {
        let mut state = self.inner.lock();
        state.entries.clear();
        state.in_flight.clear();
        debug!("event=url_cache_clear module=media status=ok");
    }

    /// Returns the live entry for `key` without any I/O.
    pub fn peek(&self, key: &str) -> Option<CachedUrl> {
        let now = self.inner.clock.now();
        self.inner
            .lock()
            .entries
            .get(key)
            .filter(|entry| now < entry.expires_at)
            .cloned()
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn classify(&self, raw: Option<&str>) -> Slot {
        let Some(original) = raw.filter(|raw| !raw.trim().is_empty()) else {
            return Slot::Ready(None);
        };
        // Absolute URLs are handed back exactly as given.
        if is_absolute_url(original) {
            return Slot::Ready(Some(original.to_string()));
        }
        match normalize_storage_key(original.trim(), &self.inner.bucket) {
            Some(key) => Slot::Key(key),
            None => Slot::Ready(None),
        }
    }

    /// Serves cache hits, joins in-flight batches and starts one batch for
    /// the rest, all under one lock acquisition.
    fn lookup_or_start(&self, slots: &[Slot]) -> (SignedBatch, Vec<BatchFuture>) {
        let now = self.inner.clock.now();
        let mut known = SignedBatch::new();
        let mut waits: Vec<BatchFuture> = Vec::new();
        let mut joined: HashSet<u64> = HashSet::new();
        let mut missing: Vec<String> = Vec::new();

        let mut guard = self.inner.lock();
        let state = &mut *guard;
        for slot in slots {
            let Slot::Key(key) = slot else { continue };
            if known.contains_key(key) || missing.contains(key) {
                continue;
            }

            if let Some(entry) = state.entries.get(key) {
                if now < entry.expires_at {
                    known.insert(key.clone(), Some(entry.url.clone()));
                    continue;
                }
                state.entries.remove(key);
            }

            if let Some(flight) = state.in_flight.get(key) {
                if joined.insert(flight.batch_id) {
                    waits.push(flight.batch.clone());
                }
                continue;
            }
            missing.push(key.clone());
        }

        if !missing.is_empty() {
            state.next_batch_id += 1;
            let batch_id = state.next_batch_id;
            let batch = Arc::clone(&self.inner)
                .sign_batch(batch_id, missing.clone())
                .boxed()
                .shared();
            for key in &missing {
                state.in_flight.insert(
                    key.clone(),
                    InFlight {
                        batch_id,
                        batch: batch.clone(),
                    },
                );
            }
            waits.push(batch);
        }

        (known, waits)
    }
}

impl CacheInner {
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn sign_batch(self: Arc<Self>, batch_id: u64, keys: Vec<String>) -> Arc<SignedBatch> {
        let signed = match self.signer.create_signed_urls(&keys, self.signed_ttl).await {
            Ok(signed) => signed,
            Err(err) => {
                warn!(
                    "event=url_sign module=media status=error keys={} error={err}",
                    keys.len()
                );
                SignedBatch::new()
            }
        };

        // An expiry past the representable range means the URL is served uncached.
        let expires_at = self.clock.now().checked_add_signed(self.cache_ttl);
        if expires_at.is_none() {
            warn!(
                "event=url_sign module=media status=skip reason=expiry_out_of_range keys={}",
                keys.len()
            );
        }
        let mut guard = self.lock();
        let state = &mut *guard;
        let mut cached = 0_usize;
        for (key, url) in &signed {
            let (Some(url), Some(expires_at)) = (url, expires_at) else { continue };
            let owned_by_batch = match state.in_flight.get(key) {
                Some(flight) => flight.batch_id == batch_id,
                // Extra keys the signer returned unasked are cached too.
                None => !keys.contains(key),
            };
            if owned_by_batch {
                state.entries.insert(
                    key.clone(),
                    CachedUrl {
                        url: url.clone(),
                        expires_at,
                    },
                );
                cached += 1;
            }
        }
        for key in &keys {
            if state
                .in_flight
                .get(key)
                .is_some_and(|flight| flight.batch_id == batch_id)
            {
                state.in_flight.remove(key);
            }
        }
        drop(guard);

        debug!(
            "event=url_sign module=media status=ok requested={} cached={cached}",
            keys.len()
        );
        Arc::new(signed)
    }
}
