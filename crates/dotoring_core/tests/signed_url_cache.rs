use async_trait::async_trait;
use chrono::{DateTime, TimeDelta};
use dotoring_core::clock::{Clock, ManualClock};
use dotoring_core::config::EngineConfig;
use dotoring_core::media::signed_url_cache::SignedUrlCache;
use dotoring_core::spi::memory::MemoryUrlSigner;
use dotoring_core::spi::{CollabResult, UrlSigner};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const KEY_A: &str = "coupons/u-1/a.jpg";
const KEY_B: &str = "coupons/u-1/b.png";
const KEY_C: &str = "coupons/u-1/c.webp";

/// Signer that yields once before answering, so concurrent lookups overlap.
struct YieldingSigner(Arc<MemoryUrlSigner>);

#[async_trait]
impl UrlSigner for YieldingSigner {
    async fn create_signed_urls(
        &self,
        keys: &[String],
        ttl: Duration,
    ) -> CollabResult<HashMap<String, Option<String>>> {
        tokio::task::yield_now().await;
        self.0.create_signed_urls(keys, ttl).await
    }
}

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        DateTime::parse_from_rfc3339("2026-10-17T12:00:00+09:00").unwrap(),
    ))
}

fn cache_with(signer: Arc<dyn UrlSigner>, clock: Arc<ManualClock>) -> SignedUrlCache {
    SignedUrlCache::new(signer, clock, &EngineConfig::default())
}

#[tokio::test]
async fn ten_items_over_three_keys_sign_once() {
    let signer = Arc::new(MemoryUrlSigner::default());
    let cache = cache_with(signer.clone(), clock());
    let raws = [
        Some(KEY_A),
        Some(KEY_B),
        Some("/coupons/u-1/a.jpg"),
        Some(KEY_C),
        Some(KEY_A),
        Some(KEY_B),
        Some(KEY_C),
        Some("//coupons/u-1/c.webp"),
        Some(KEY_A),
        Some(KEY_B),
    ];

    let urls = cache.resolve_many(&raws).await;

    assert_eq!(signer.call_count(), 1);
    let mut batch = signer.batches().remove(0);
    batch.sort();
    assert_eq!(batch, vec![KEY_A, KEY_B, KEY_C]);

    assert_eq!(urls.len(), 10);
    for (raw, url) in raws.iter().zip(&urls) {
        let key = raw.unwrap().trim_start_matches('/');
        let url = url.as_deref().expect("every item should resolve");
        assert!(url.contains(&format!("/object/sign/{key}?")), "{url}");
        assert!(url.ends_with("expires_in=3600"));
    }
    assert_eq!(urls[0], urls[2]);
    assert_eq!(cache.len(), 3);
}

#[tokio::test]
async fn absolute_urls_and_blanks_skip_signing() {
    let signer = Arc::new(MemoryUrlSigner::default());
    let cache = cache_with(signer.clone(), clock());
    let public = "https://cdn.example.com/img/a.jpg";

    let urls = cache
        .resolve_many(&[Some(public), None, Some("   "), Some("/")])
        .await;

    assert_eq!(urls, vec![Some(public.to_string()), None, None, None]);
    assert_eq!(signer.call_count(), 0);
}

#[tokio::test]
async fn entry_is_served_until_its_expiry_and_resigned_after() {
    let signer = Arc::new(MemoryUrlSigner::default());
    let clock = clock();
    let cache = cache_with(signer.clone(), clock.clone());

    let signed_at = clock.now();
    let first = cache.resolve(KEY_A).await.unwrap();
    let entry = cache.peek(KEY_A).unwrap();
    // 90% of the one-hour signed lifetime.
    assert_eq!(entry.expires_at, signed_at + TimeDelta::seconds(3240));

    clock.set(entry.expires_at - TimeDelta::milliseconds(1));
    assert_eq!(cache.resolve(KEY_A).await.unwrap(), first);
    assert_eq!(signer.call_count(), 1);

    clock.set(entry.expires_at + TimeDelta::milliseconds(1));
    assert!(cache.peek(KEY_A).is_none());
    let second = cache.resolve(KEY_A).await.unwrap();
    assert_eq!(signer.call_count(), 2);
    assert_ne!(first, second);
}

#[tokio::test]
async fn invalidation_forces_a_fresh_signing_call() {
    let signer = Arc::new(MemoryUrlSigner::default());
    let cache = cache_with(signer.clone(), clock());

    cache.resolve(KEY_A).await.unwrap();
    let signed_form =
        "https://proj.supabase.co/storage/v1/object/sign/coupon-images/coupons/u-1/a.jpg?token=abc";
    assert!(cache.invalidate(signed_form));
    assert!(!cache.invalidate(KEY_A));

    cache.resolve(KEY_A).await.unwrap();
    assert_eq!(signer.call_count(), 2);
}

#[tokio::test]
async fn failed_signing_is_not_cached() {
    let signer = Arc::new(MemoryUrlSigner::default());
    let cache = cache_with(signer.clone(), clock());
    signer.fail_next(1);

    assert_eq!(cache.resolve(KEY_A).await, None);
    assert!(cache.is_empty());

    assert!(cache.resolve(KEY_A).await.is_some());
    assert_eq!(signer.call_count(), 2);
}

#[tokio::test]
async fn unsignable_keys_resolve_to_none_and_are_retried() {
    let signer = Arc::new(MemoryUrlSigner::default());
    let cache = cache_with(signer.clone(), clock());
    signer.mark_unsignable(KEY_B);

    let urls = cache.resolve_many(&[Some(KEY_A), Some(KEY_B)]).await;
    assert!(urls[0].is_some());
    assert_eq!(urls[1], None);

    cache.resolve(KEY_B).await;
    assert_eq!(
        signer.batches(),
        vec![
            vec![KEY_A.to_string(), KEY_B.to_string()],
            vec![KEY_B.to_string()]
        ]
    );
}

#[tokio::test]
async fn concurrent_lookups_share_one_signing_call() {
    let memory = Arc::new(MemoryUrlSigner::default());
    let cache = cache_with(Arc::new(YieldingSigner(memory.clone())), clock());

    let (first, second, page) = futures::join!(
        cache.resolve(KEY_A),
        cache.resolve(KEY_A),
        cache.resolve_many(&[Some(KEY_A), Some(KEY_B)])
    );

    assert_eq!(first, second);
    assert_eq!(page[0], first);
    assert!(page[1].is_some());
    // One batch for A, one for B; nobody re-signs A.
    assert_eq!(
        memory.batches(),
        vec![vec![KEY_A.to_string()], vec![KEY_B.to_string()]]
    );
}

#[tokio::test]
async fn invalidation_during_signing_keeps_result_out_of_cache() {
    let memory = Arc::new(MemoryUrlSigner::default());
    let cache = cache_with(Arc::new(YieldingSigner(memory.clone())), clock());

    let (url, dropped) = futures::join!(cache.resolve(KEY_A), async { cache.invalidate(KEY_A) });

    assert!(url.is_some());
    assert!(dropped);
    assert!(cache.peek(KEY_A).is_none());

    cache.resolve(KEY_A).await;
    assert_eq!(memory.call_count(), 2);
}

#[tokio::test]
async fn clear_drops_every_entry() {
    let signer = Arc::new(MemoryUrlSigner::default());
    let cache = cache_with(signer.clone(), clock());
    cache.resolve_many(&[Some(KEY_A), Some(KEY_B)]).await;
    assert_eq!(cache.len(), 2);

    cache.clear();

    assert!(cache.is_empty());
    cache.resolve(KEY_A).await;
    assert_eq!(signer.call_count(), 2);
}

#[tokio::test]
async fn absolute_urls_are_returned_untrimmed() {
    let signer = Arc::new(MemoryUrlSigner::default());
    let cache = cache_with(signer.clone(), clock());
    let padded = "  https://cdn.example.com/img/a.jpg\n";

    assert_eq!(cache.resolve(padded).await.as_deref(), Some(padded));
    assert_eq!(signer.call_count(), 0);
}

#[tokio::test]
async fn expiry_beyond_clock_range_is_served_without_caching() {
    let signer = Arc::new(MemoryUrlSigner::default());
    let config = EngineConfig::default().with_signed_url_ttl_secs(10_000_000_000_000);
    let cache = SignedUrlCache::new(signer.clone(), clock(), &config);

    let url = cache.resolve(KEY_A).await;

    assert!(url.is_some_and(|url| url.contains(&format!("/object/sign/{KEY_A}?"))));
    assert!(cache.is_empty());
    cache.resolve(KEY_A).await;
    assert_eq!(signer.call_count(), 2);
}
