//! Recommendation cache - TTL memoization in front of the rule store.
//!
//! Keys are derived from the request itself (a product id, or the canonical signature of
//! a cart), so identical queries land on the same slot. Cached values are disposable:
//! any backend failure is logged and handled as a miss, and the rule store is always
//! consulted as the source of truth.

use crate::{
    core::{product, rule_store},
    entities::{association_rule, product::Model as ProductModel},
    errors::{Error, Result},
};
use dashmap::DashMap;
use sea_orm::ConnectionTrait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Prefix shared by every key this module writes.
pub const KEY_PREFIX: &str = "recommendations:";

/// Lifetime of cart recommendation entries.
pub const CART_TTL: Duration = Duration::from_secs(60 * 60);

/// One recommended product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Recommended product id
    pub product_id: i64,
    /// Catalog details, None if the product is no longer active
    pub product: Option<ProductModel>,
    /// Ranking score (`lift × confidence`, averaged across cart products)
    pub score: f64,
    /// Confidence of the underlying rule
    pub confidence: f64,
    /// Lift of the underlying rule
    pub lift: f64,
}

/// Key/value store with per-entry expiry.
///
/// Implementations must make each single-key operation atomic; nothing here needs
/// cross-key transactions.
pub trait CacheBackend: Send + Sync {
    /// Value stored under `key`, or None if missing or expired.
    fn get(&self, key: &str) -> Result<Option<String>>;
    /// Stores `value` under `key` for `ttl`, replacing any previous value.
    fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()>;
    /// Removes `key`; returns whether it existed.
    fn delete(&self, key: &str) -> Result<bool>;
    /// Removes every key starting with `prefix`; returns how many were removed.
    fn delete_prefix(&self, prefix: &str) -> Result<usize>;
    /// Drops expired entries, for backends that do not expire them on their own.
    fn evict_expired(&self) -> usize {
        0
    }
}

struct CacheEntry {
    value: String,
    expires_at: Instant,
}

/// In-process backend on a sharded concurrent map.
#[derive(Default)]
pub struct MemoryBackend {
    store: DashMap<String, CacheEntry>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included until evicted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Whether the backend holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

impl CacheBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let Some(entry) = self.store.get(key) else {
            return Ok(None);
        };
        if entry.expires_at <= Instant::now() {
            drop(entry);
            self.store.remove(key);
            return Ok(None);
        }
        Ok(Some(entry.value.clone()))
    }

    fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        self.store.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.store.remove(key).is_some())
    }

    fn delete_prefix(&self, prefix: &str) -> Result<usize> {
        let before = self.store.len();
        self.store.retain(|key, _| !key.starts_with(prefix));
        Ok(before.saturating_sub(self.store.len()))
    }

    fn evict_expired(&self) -> usize {
        let before = self.store.len();
        let now = Instant::now();
        self.store.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.store.len())
    }
}

/// Cache key of a product's recommendations.
#[must_use]
pub fn product_key(product_id: i64) -> String {
    format!("{KEY_PREFIX}product:{product_id}")
}

/// Cache key of a cart query: sorted distinct ids plus the requested limit.
#[must_use]
pub fn cart_key(product_ids: &BTreeSet<i64>, limit: u64) -> String {
    let signature = product_ids
        .iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join("_");
    format!("{KEY_PREFIX}cart:{signature}:limit:{limit}")
}

fn to_limit(limit: u64) -> usize {
    usize::try_from(limit).unwrap_or(usize::MAX)
}

/// Per-product and per-cart recommendations backed by a [`CacheBackend`].
///
/// Every invalidation bumps a generation counter. A result loaded from the rule store is
/// only written back if no invalidation happened since the load started, so a reader that
/// raced a remine cannot put the previous rule set back into the cache.
pub struct RecommendationCache<B = MemoryBackend> {
    backend: B,
    product_ttl: Duration,
    generation: RwLock<u64>,
}

impl<B: CacheBackend> RecommendationCache<B> {
    /// Creates a cache whose per-product entries live for `product_ttl`.
    pub const fn new(backend: B, product_ttl: Duration) -> Self {
        Self {
            backend,
            product_ttl,
            generation: RwLock::new(0),
        }
    }

    /// The underlying backend.
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    fn read(&self, key: &str) -> Option<Vec<Recommendation>> {
        match self.backend.get(key) {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(recommendations) => Some(recommendations),
                Err(e) => {
                    warn!(key, "Discarding undecodable cache entry: {}", e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key, "Cache read failed, falling back to rule store: {}", e);
                None
            }
        }
    }

    /// Current invalidation generation; capture it before reading the rule store.
    fn generation(&self) -> u64 {
        *self.generation.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores `recommendations` unless the cache was invalidated after `loaded_at`.
    fn write(
        &self,
        key: &str,
        recommendations: &[Recommendation],
        ttl: Duration,
        loaded_at: u64,
    ) {
        let current = self.generation.read().unwrap_or_else(PoisonError::into_inner);
        if *current != loaded_at {
            debug!(key, "Cache invalidated while loading, result not stored");
            return;
        }
        let result = serde_json::to_string(recommendations)
            .map_err(Error::from)
            .and_then(|raw| self.backend.set(key, raw, ttl));
        if let Err(e) = result {
            warn!(key, "Cache write failed: {}", e);
        }
    }

    /// Attaches catalog details to rules, preserving rule order.
    async fn enrich<C>(
        db: &C,
        rules: Vec<association_rule::Model>,
    ) -> Result<Vec<Recommendation>>
    where
        C: ConnectionTrait,
    {
        if rules.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = rules.iter().map(|r| r.recommended_product_id).collect();
        let mut products = product::get_products_by_ids(db, &ids).await?;

        Ok(rules
            .into_iter()
            .map(|rule| Recommendation {
                product_id: rule.recommended_product_id,
                product: products.remove(&rule.recommended_product_id),
                score: rule.lift * rule.confidence,
                confidence: rule.confidence,
                lift: rule.lift,
            })
            .collect())
    }

    /// Reads `fetch_limit` rules for `product_id` from the store and caches them.
    async fn load_product<C>(
        &self,
        db: &C,
        product_id: i64,
        fetch_limit: u64,
    ) -> Result<Vec<Recommendation>>
    where
        C: ConnectionTrait,
    {
        let loaded_at = self.generation();
        let rules = rule_store::query_by_origin(db, product_id, fetch_limit).await?;
        let recommendations = Self::enrich(db, rules).await?;
        if !recommendations.is_empty() {
            self.write(
                &product_key(product_id),
                &recommendations,
                self.product_ttl,
                loaded_at,
            );
        }
        Ok(recommendations)
    }

    /// Recommendations for one product, without the ids in `exclude`.
    ///
    /// On a miss the top `limit + exclude.len()` rules are fetched without exclusion and
    /// cached as is, so later calls with different exclusions can be served from the same
    /// entry. Exclusion and truncation are applied on the way out.
    ///
    /// # Errors
    /// Returns an error only if the rule store query fails; cache failures are not errors.
    pub async fn get_for_product<C>(
        &self,
        db: &C,
        product_id: i64,
        limit: u64,
        exclude: &[i64],
    ) -> Result<Vec<Recommendation>>
    where
        C: ConnectionTrait,
    {
        let recommendations = if let Some(cached) = self.read(&product_key(product_id)) {
            debug!(product_id, "Product recommendations served from cache");
            cached
        } else {
            debug!(product_id, "Product recommendations cache miss");
            let fetch_limit = limit.saturating_add(exclude.len() as u64);
            self.load_product(db, product_id, fetch_limit).await?
        };

        Ok(recommendations
            .into_iter()
            .filter(|r| !exclude.contains(&r.product_id))
            .take(to_limit(limit))
            .collect())
    }

    /// Recomputes a product's recommendations from the rule store, ignoring any cached
    /// entry, and stores the fresh result.
    ///
    /// # Errors
    /// Returns an error if the rule store query fails.
    pub async fn refresh_product<C>(
        &self,
        db: &C,
        product_id: i64,
        limit: u64,
    ) -> Result<Vec<Recommendation>>
    where
        C: ConnectionTrait,
    {
        self.load_product(db, product_id, limit).await
    }

    /// Recommendations for a whole cart.
    ///
    /// Each distinct cart product contributes its top `2 × limit` rules (cart products
    /// excluded). Scores of a product recommended by several cart items are summed and
    /// ranked by their average. Results are cached for [`CART_TTL`].
    ///
    /// # Errors
    /// Returns an error only if the rule store query fails.
    pub async fn get_for_cart<C>(
        &self,
        db: &C,
        product_ids: &[i64],
        limit: u64,
    ) -> Result<Vec<Recommendation>>
    where
        C: ConnectionTrait,
    {
        let cart: BTreeSet<i64> = product_ids.iter().copied().collect();
        if cart.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let key = cart_key(&cart, limit);
        if let Some(cached) = self.read(&key) {
            debug!(cart_size = cart.len(), "Cart recommendations served from cache");
            return Ok(cached);
        }

        let loaded_at = self.generation();
        let exclude: Vec<i64> = cart.iter().copied().collect();
        let per_product = limit.saturating_mul(2);

        // product id → (score sum, appearances, strongest contributing rule)
        let mut accumulated: HashMap<i64, (f64, u32, association_rule::Model)> = HashMap::new();
        for &origin in &cart {
            let rules =
                rule_store::query_by_origin_excluding(db, origin, &exclude, per_product).await?;
            for rule in rules {
                let score = rule.lift * rule.confidence;
                accumulated
                    .entry(rule.recommended_product_id)
                    .and_modify(|(sum, count, best)| {
                        *sum += score;
                        *count += 1;
                        if score > best.lift * best.confidence {
                            *best = rule.clone();
                        }
                    })
                    .or_insert((score, 1, rule));
            }
        }

        let mut ranked: Vec<(f64, association_rule::Model)> = accumulated
            .into_values()
            .map(|(sum, count, best)| (sum / f64::from(count), best))
            .collect();
        ranked.sort_by(|a, b| {
            b.0.total_cmp(&a.0)
                .then_with(|| a.1.recommended_product_id.cmp(&b.1.recommended_product_id))
        });
        ranked.truncate(to_limit(limit));

        let averages: Vec<f64> = ranked.iter().map(|(average, _)| *average).collect();
        let mut recommendations =
            Self::enrich(db, ranked.into_iter().map(|(_, rule)| rule).collect()).await?;
        for (recommendation, average) in recommendations.iter_mut().zip(averages) {
            recommendation.score = average;
        }

        self.write(&key, &recommendations, CART_TTL, loaded_at);
        Ok(recommendations)
    }

    /// Drops cached recommendations: one product's entry, or with `None` every entry
    /// under [`KEY_PREFIX`]. Keys written by other components are left alone.
    ///
    /// # Errors
    /// Returns `CacheUnavailable` (or the backend's own error) if the backend fails.
    pub fn invalidate(&self, product_id: Option<i64>) -> Result<usize> {
        let mut generation = self.generation.write().unwrap_or_else(PoisonError::into_inner);
        *generation = generation.wrapping_add(1);
        let removed = match product_id {
            Some(id) => usize::from(self.backend.delete(&product_key(id))?),
            None => self.backend.delete_prefix(KEY_PREFIX)?,
        };
        info!(?product_id, removed, "Recommendation cache invalidated");
        Ok(removed)
    }
}
