use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use super::{PricingResult, ProductCatalog};
use crate::errors::PricingError;

pub const DEFAULT_PRICING_TTL_SECS: i64 = 300;

#[derive(Clone, Debug)]
struct PricingCacheEntry {
    value: PricingResult,
    fetched_at: DateTime<Utc>,
}

/// TTL memoization of pricing lookups keyed by lower-cased product type.
///
/// Staleness is checked on read; stale entries are replaced by the next
/// successful lookup and are never purged in the background. Concurrent
/// misses for the same key are coalesced: later callers wait for the
/// in-flight lookup and then read its result.
pub struct PricingCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, PricingCacheEntry>>,
    in_flight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl Default for PricingCache {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_PRICING_TTL_SECS))
    }
}

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn cache_key(product_type: &str) -> Result<String, PricingError> {
    let key = product_type.trim().to_lowercase();
    if key.is_empty() {
        return Err(PricingError::EmptyProductType);
    }
    Ok(key)
}

impl PricingCache {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: Mutex::new(HashMap::new()), in_flight: Mutex::new(HashMap::new()) }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get(
        &self,
        product_type: &str,
        catalog: &dyn ProductCatalog,
    ) -> Result<PricingResult, PricingError> {
        self.get_at(product_type, Utc::now(), catalog).await
    }

    pub async fn get_at(
        &self,
        product_type: &str,
        now: DateTime<Utc>,
        catalog: &dyn ProductCatalog,
    ) -> Result<PricingResult, PricingError> {
        let key = cache_key(product_type)?;

        if let Some(value) = self.fresh(&key, now) {
            debug!(event_name = "pricing.cache_hit", product_type = %key, "pricing served from cache");
            return Ok(value);
        }

        let gate = self.gate(&key);
        let outcome = {
            let _permit = gate.lock().await;

            match self.fresh(&key, now) {
                Some(value) => {
                    debug!(
                        event_name = "pricing.cache_joined",
                        product_type = %key,
                        "pricing served by a concurrent lookup"
                    );
                    Ok(value)
                }
                None => self.fetch_and_store(&key, now, catalog).await,
            }
        };
        self.release(&key, &gate);

        outcome
    }

    async fn fetch_and_store(
        &self,
        key: &str,
        now: DateTime<Utc>,
        catalog: &dyn ProductCatalog,
    ) -> Result<PricingResult, PricingError> {
        let listings = match catalog.lookup(key).await {
            Ok(listings) => listings,
            Err(error) => {
                warn!(
                    event_name = "pricing.lookup_failed",
                    product_type = %key,
                    error = %error,
                    "pricing lookup failed; cache left untouched"
                );
                return Err(error);
            }
        };

        let value = PricingResult::from_listings(key, listings);
        guard(&self.entries)
            .insert(key.to_string(), PricingCacheEntry { value: value.clone(), fetched_at: now });

        info!(
            event_name = "pricing.cache_refreshed",
            product_type = %key,
            product_count = value.product_count,
            "pricing lookup cached"
        );

        Ok(value)
    }

    fn fresh(&self, key: &str, now: DateTime<Utc>) -> Option<PricingResult> {
        guard(&self.entries)
            .get(key)
            .filter(|entry| now.signed_duration_since(entry.fetched_at) < self.ttl)
            .map(|entry| entry.value.clone())
    }

    fn gate(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        guard(&self.in_flight).entry(key.to_string()).or_default().clone()
    }

    fn release(&self, key: &str, gate: &Arc<tokio::sync::Mutex<()>>) {
        let mut in_flight = guard(&self.in_flight);
        // The map and the releasing caller hold the only references when no
        // one else is waiting on this key.
        if Arc::strong_count(gate) <= 2 {
            in_flight.remove(key);
        }
    }

    pub fn clear(&self) {
        guard(&self.entries).clear();
    }

    pub fn len(&self) -> usize {
        guard(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        guard(&self.entries).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{Duration, Utc};

    use crate::errors::PricingError;
    use crate::pricing::{PricingCache, ProductCatalog, ProductListing};

    #[derive(Default)]
    struct CountingCatalog {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingCatalog {
        fn failing() -> Self {
            Self { calls: AtomicUsize::new(0), fail: true }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ProductCatalog for CountingCatalog {
        async fn lookup(&self, product_type: &str) -> Result<Vec<ProductListing>, PricingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if self.fail {
                return Err(PricingError::Search {
                    term: product_type.to_string(),
                    message: "storefront timed out".to_string(),
                });
            }
            Ok(vec![ProductListing {
                title: format!("Custom {product_type}"),
                price: "$19.99".to_string(),
                image: None,
                link: None,
            }])
        }
    }

    #[tokio::test]
    async fn second_read_within_ttl_is_served_from_cache() {
        let cache = PricingCache::default();
        let catalog = CountingCatalog::default();
        let now = Utc::now();

        let first = cache.get_at("t-shirt", now, &catalog).await.expect("first lookup");
        let second = cache
            .get_at("T-Shirt", now + Duration::minutes(4), &catalog)
            .await
            .expect("cached lookup");

        assert_eq!(catalog.calls(), 1);
        assert_eq!(first, second);
        assert_eq!(second.product_type, "t-shirt");
    }

    #[tokio::test]
    async fn read_after_ttl_refetches() {
        let cache = PricingCache::default();
        let catalog = CountingCatalog::default();
        let now = Utc::now();

        cache.get_at("t-shirt", now, &catalog).await.expect("first lookup");
        cache.get_at("t-shirt", now + Duration::minutes(5), &catalog).await.expect("refetch");

        assert_eq!(catalog.calls(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn failed_lookup_keeps_previous_entry_and_reports_error() {
        let cache = PricingCache::default();
        let now = Utc::now();

        let healthy = CountingCatalog::default();
        let cached = cache.get_at("mug", now, &healthy).await.expect("initial lookup");

        let failing = CountingCatalog::failing();
        let error = cache
            .get_at("mug", now + Duration::minutes(10), &failing)
            .await
            .expect_err("stale entry should trigger a failing refetch");
        assert!(matches!(error, PricingError::Search { .. }));

        let still_cached = cache.get_at("mug", now + Duration::minutes(1), &failing).await;
        assert_eq!(still_cached, Ok(cached));
        assert_eq!(failing.calls(), 1);
    }

    #[tokio::test]
    async fn failure_on_cold_key_caches_nothing() {
        let cache = PricingCache::default();
        let failing = CountingCatalog::failing();

        assert!(cache.get("hoodie", &failing).await.is_err());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn blank_product_type_is_rejected() {
        let cache = PricingCache::default();
        let catalog = CountingCatalog::default();

        assert_eq!(cache.get("   ", &catalog).await, Err(PricingError::EmptyProductType));
        assert_eq!(catalog.calls(), 0);
    }

    #[tokio::test]
    async fn concurrent_misses_share_one_lookup() {
        let cache = Arc::new(PricingCache::default());
        let catalog = Arc::new(CountingCatalog::default());
        let now = Utc::now();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let catalog = catalog.clone();
            handles.push(tokio::spawn(async move {
                cache.get_at("sweatshirt", now, catalog.as_ref()).await
            }));
        }

        for handle in handles {
            let result = handle.await.expect("task joins");
            assert!(result.is_ok());
        }

        assert_eq!(catalog.calls(), 1);
    }

    #[tokio::test]
    async fn clear_drops_all_entries() {
        let cache = PricingCache::default();
        let catalog = CountingCatalog::default();

        cache.get("mug", &catalog).await.expect("lookup");
        cache.get("hoodie", &catalog).await.expect("lookup");
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
        cache.get("mug", &catalog).await.expect("lookup");
        assert_eq!(catalog.calls(), 3);
    }
}
