// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Cognito key set (JWKS) fetching and caching.
//!
//! ## Security
//!
//! - Key sets are fetched via HTTPS only (plain HTTP is accepted for loopback
//!   endpoints, which only local emulators use)
//! - A key set is replaced wholesale on refresh; readers hold an `Arc` to the
//!   set they looked at and never observe a half-written one
//! - An unknown `kid` triggers at most one fetch per pool per cooldown window,
//!   so forged tokens cannot turn the gateway into a refresh amplifier
//! - A stale set keeps serving known keys when a refresh fails
//!
//! ## Usage
//!
//! Build one [`KeySetCache`] at start-up, wrap it in an `Arc`, and hand it to
//! the [`TokenValidator`](super::validator::TokenValidator).

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::jwk::{
    AlgorithmParameters, EllipticCurve, Jwk, JwkSet, KeyAlgorithm, PublicKeyUse,
};
use jsonwebtoken::{Algorithm, DecodingKey};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info, warn};
use url::Url;

/// Default key set TTL (1 hour). Older sets are refreshed on next use.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Default minimum spacing between two fetches for the same pool.
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(15);

/// Default upper bound on a single key set fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// A Cognito user pool, identified by region and pool ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserPool {
    region: String,
    user_pool_id: String,
    endpoint: Option<String>,
}

impl UserPool {
    pub fn new(region: impl Into<String>, user_pool_id: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            user_pool_id: user_pool_id.into(),
            endpoint: None,
        }
    }

    /// Replace `https://cognito-idp.{region}.amazonaws.com` with another base URL
    /// (cognito-local and other emulators).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into().trim_end_matches('/').to_string());
        self
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn user_pool_id(&self) -> &str {
        &self.user_pool_id
    }

    fn base_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => format!("https://cognito-idp.{}.amazonaws.com", self.region),
        }
    }

    /// Expected `iss` claim of tokens issued by this pool.
    pub fn issuer(&self) -> String {
        format!("{}/{}", self.base_url(), self.user_pool_id)
    }

    /// Well-known key set URL of this pool.
    pub fn jwks_url(&self) -> String {
        format!("{}/.well-known/jwks.json", self.issuer())
    }
}

impl fmt::Display for UserPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.region, self.user_pool_id)
    }
}

/// Failure to obtain a usable key set from the provider.
///
/// Always transient from the caller's point of view: the request may be
/// retried once the provider is reachable again.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyResolutionError {
    #[error("key set endpoint is not allowed: {0}")]
    InvalidEndpoint(String),

    #[error("key set request failed: {0}")]
    Request(String),

    #[error("key set endpoint returned HTTP {0}")]
    Status(u16),

    #[error("key set document is invalid: {0}")]
    Parse(String),

    #[error("key set fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("key set refresh task failed: {0}")]
    Task(String),
}

/// Outcome of a failed [`KeySetCache::resolve`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// The token names no key at all.
    #[error("token header has no key ID")]
    MissingKeyId,

    /// The key set was fetched successfully but has no such key.
    #[error("no signing key `{kid}` in the pool key set")]
    UnknownKey { kid: String },

    /// The key set could not be fetched.
    #[error(transparent)]
    Unavailable(#[from] KeyResolutionError),
}

impl ResolveError {
    /// Whether retrying the whole request later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ResolveError::Unavailable(_))
    }
}

/// A public key able to verify token signatures.
#[derive(Clone)]
pub struct SigningKey {
    kid: String,
    algorithm: Algorithm,
    key: DecodingKey,
}

impl SigningKey {
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// The only algorithm this key verifies.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.key
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// All signing keys from a single fetch of a pool's key set document.
#[derive(Debug)]
pub struct KeySet {
    keys: HashMap<String, Arc<SigningKey>>,
    fetched_at: Instant,
    source_url: String,
}

impl KeySet {
    /// Build a key set from a JWKS document.
    ///
    /// Keys that cannot verify signatures (encryption keys, keys without a
    /// `kid`, unsupported parameters) are skipped.
    pub fn from_jwks(jwks: &JwkSet, source_url: impl Into<String>) -> Result<Self, KeyResolutionError> {
        let source_url = source_url.into();
        let mut keys = HashMap::new();

        for jwk in &jwks.keys {
            match jwk_to_signing_key(jwk) {
                Ok(key) => {
                    keys.insert(key.kid.clone(), Arc::new(key));
                }
                Err(reason) => {
                    warn!(
                        kid = jwk.common.key_id.as_deref().unwrap_or("<none>"),
                        url = %source_url,
                        reason,
                        "Skipping unusable key in key set"
                    );
                }
            }
        }

        if keys.is_empty() {
            return Err(KeyResolutionError::Parse(
                "key set contains no usable signing keys".to_string(),
            ));
        }

        Ok(Self {
            keys,
            fetched_at: Instant::now(),
            source_url,
        })
    }

    pub fn get(&self, kid: &str) -> Option<Arc<SigningKey>> {
        self.keys.get(kid).cloned()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn fetched_at(&self) -> Instant {
        self.fetched_at
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

/// Where key set documents come from.
#[async_trait]
pub trait KeySetSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<JwkSet, KeyResolutionError>;
}

/// Fetches key sets over HTTPS.
#[derive(Clone)]
pub struct HttpKeySetSource {
    client: reqwest::Client,
}

impl HttpKeySetSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl KeySetSource for HttpKeySetSource {
    async fn fetch(&self, url: &str) -> Result<JwkSet, KeyResolutionError> {
        let url = checked_endpoint(url)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| KeyResolutionError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(KeyResolutionError::Status(response.status().as_u16()));
        }

        response
            .json::<JwkSet>()
            .await
            .map_err(|e| KeyResolutionError::Parse(e.to_string()))
    }
}

/// Only HTTPS, or HTTP against a loopback host.
fn checked_endpoint(raw: &str) -> Result<Url, KeyResolutionError> {
    let url = Url::parse(raw).map_err(|e| KeyResolutionError::InvalidEndpoint(e.to_string()))?;
    match url.scheme() {
        "https" => Ok(url),
        "http" if is_loopback(&url) => Ok(url),
        scheme => Err(KeyResolutionError::InvalidEndpoint(format!(
            "scheme `{scheme}` is not permitted for {}",
            url.host_str().unwrap_or("<no host>")
        ))),
    }
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(url::Host::Domain(domain)) => domain == "localhost",
        Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
        Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}

#[derive(Default)]
struct RefreshState {
    last_attempt: Option<Instant>,
    last_error: Option<KeyResolutionError>,
}

/// Per-pool cache slot.
#[derive(Default)]
struct PoolSlot {
    current: RwLock<Option<Arc<KeySet>>>,
    /// Held for the whole duration of a fetch; waiters queue here.
    refresh: Arc<Mutex<RefreshState>>,
    /// Completed fetch attempts, bumped while `refresh` is held.
    attempts: AtomicU64,
}

impl PoolSlot {
    async fn snapshot(&self) -> Option<Arc<KeySet>> {
        self.current.read().await.clone()
    }
}

/// Key set cache shared by every request.
///
/// Lookups of known keys are served from memory. A miss refreshes the pool's
/// key set with singleflight semantics: concurrent misses for the same pool
/// collapse into one outbound fetch and all of them observe its outcome.
pub struct KeySetCache {
    source: Arc<dyn KeySetSource>,
    slots: RwLock<HashMap<UserPool, Arc<PoolSlot>>>,
    cache_ttl: Duration,
    min_refresh_interval: Duration,
    fetch_timeout: Duration,
}

impl KeySetCache {
    pub fn new(source: Arc<dyn KeySetSource>) -> Self {
        Self {
            source,
            slots: RwLock::new(HashMap::new()),
            cache_ttl: DEFAULT_CACHE_TTL,
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    /// Cache backed by [`HttpKeySetSource`].
    pub fn over_http(client: reqwest::Client) -> Self {
        Self::new(Arc::new(HttpKeySetSource::new(client)))
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    /// Resolve the signing key `kid` of `pool`.
    pub async fn resolve(&self, pool: &UserPool, kid: &str) -> Result<Arc<SigningKey>, ResolveError> {
        let slot = self.slot(pool).await;
        let observed = slot.attempts.load(Ordering::Acquire);

        if let Some(set) = slot.snapshot().await {
            if let Some(key) = set.get(kid) {
                if set.is_fresh(self.cache_ttl) {
                    return Ok(key);
                }
                debug!(pool = %pool, kid, "Key set is stale, refreshing");
            }
        }

        let refresh_error = self.refresh_slot(pool, &slot, observed).await;

        match slot.snapshot().await.and_then(|set| set.get(kid)) {
            Some(key) => Ok(key),
            None => match refresh_error {
                Some(e) => Err(ResolveError::Unavailable(e)),
                None => Err(ResolveError::UnknownKey {
                    kid: kid.to_string(),
                }),
            },
        }
    }

    /// Make sure `pool` has a key set, fetching one if needed.
    pub async fn ensure_loaded(&self, pool: &UserPool) -> Result<(), KeyResolutionError> {
        let slot = self.slot(pool).await;
        let observed = slot.attempts.load(Ordering::Acquire);

        if let Some(set) = slot.snapshot().await {
            if set.is_fresh(self.cache_ttl) {
                return Ok(());
            }
        }

        let refresh_error = self.refresh_slot(pool, &slot, observed).await;
        match (slot.snapshot().await, refresh_error) {
            (Some(_), _) => Ok(()),
            (None, Some(e)) => Err(e),
            (None, None) => Err(KeyResolutionError::Parse(
                "no key set has been loaded".to_string(),
            )),
        }
    }

    /// Whether a fresh key set is cached for `pool`.
    pub async fn is_cached(&self, pool: &UserPool) -> bool {
        let slots = self.slots.read().await;
        match slots.get(pool) {
            Some(slot) => slot
                .snapshot()
                .await
                .is_some_and(|set| set.is_fresh(self.cache_ttl)),
            None => false,
        }
    }

    async fn slot(&self, pool: &UserPool) -> Arc<PoolSlot> {
        if let Some(slot) = self.slots.read().await.get(pool) {
            return Arc::clone(slot);
        }
        let mut slots = self.slots.write().await;
        Arc::clone(slots.entry(pool.clone()).or_default())
    }

    /// Refresh the slot unless another caller already attempted it since
    /// `observed`, or the cooldown is still running. Returns the error of the
    /// attempt whose outcome the caller should report, if it failed.
    async fn refresh_slot(
        &self,
        pool: &UserPool,
        slot: &Arc<PoolSlot>,
        observed: u64,
    ) -> Option<KeyResolutionError> {
        let guard = Arc::clone(&slot.refresh).lock_owned().await;

        let attempted_meanwhile = slot.attempts.load(Ordering::Acquire) != observed;
        let cooling_down = guard
            .last_attempt
            .is_some_and(|at| at.elapsed() < self.min_refresh_interval);

        if attempted_meanwhile || cooling_down {
            debug!(pool = %pool, attempted_meanwhile, cooling_down, "Reusing last key set fetch outcome");
            return guard.last_error.clone();
        }

        // The fetch runs detached and owns the lock: a caller that goes away
        // mid-fetch neither cancels it nor lets a second fetch start.
        let task = tokio::spawn(fetch_into_slot(
            Arc::clone(&self.source),
            pool.clone(),
            Arc::clone(slot),
            self.fetch_timeout,
            guard,
        ));

        match task.await {
            Ok(result) => result.err(),
            Err(e) => Some(KeyResolutionError::Task(e.to_string())),
        }
    }
}

async fn fetch_into_slot(
    source: Arc<dyn KeySetSource>,
    pool: UserPool,
    slot: Arc<PoolSlot>,
    timeout: Duration,
    mut guard: OwnedMutexGuard<RefreshState>,
) -> Result<(), KeyResolutionError> {
    let url = pool.jwks_url();
    debug!(pool = %pool, url = %url, "Fetching key set");

    let fetched = match tokio::time::timeout(timeout, source.fetch(&url)).await {
        Ok(Ok(jwks)) => KeySet::from_jwks(&jwks, url),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(KeyResolutionError::Timeout(timeout)),
    };

    guard.last_attempt = Some(Instant::now());
    let result = match fetched {
        Ok(set) => {
            info!(pool = %pool, keys = set.len(), "Key set refreshed");
            *slot.current.write().await = Some(Arc::new(set));
            guard.last_error = None;
            Ok(())
        }
        Err(e) => {
            warn!(pool = %pool, error = %e, "Key set refresh failed");
            guard.last_error = Some(e.clone());
            Err(e)
        }
    };
    slot.attempts.fetch_add(1, Ordering::Release);

    result
}

/// Convert a JWK into a signing key bound to a single algorithm.
fn jwk_to_signing_key(jwk: &Jwk) -> Result<SigningKey, &'static str> {
    if matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption)) {
        return Err("encryption key");
    }
    let kid = jwk.common.key_id.clone().ok_or("missing kid")?;

    let (key, algorithm) = match &jwk.algorithm {
        AlgorithmParameters::RSA(rsa) => {
            let algorithm = match jwk.common.key_algorithm {
                None | Some(KeyAlgorithm::RS256) => Algorithm::RS256,
                Some(KeyAlgorithm::RS384) => Algorithm::RS384,
                Some(KeyAlgorithm::RS512) => Algorithm::RS512,
                Some(KeyAlgorithm::PS256) => Algorithm::PS256,
                Some(KeyAlgorithm::PS384) => Algorithm::PS384,
                Some(KeyAlgorithm::PS512) => Algorithm::PS512,
                Some(_) => return Err("unsupported RSA algorithm"),
            };
            let key = DecodingKey::from_rsa_components(&rsa.n, &rsa.e)
                .map_err(|_| "invalid RSA components")?;
            (key, algorithm)
        }
        AlgorithmParameters::EllipticCurve(ec) => {
            let algorithm = match (jwk.common.key_algorithm, &ec.curve) {
                (None | Some(KeyAlgorithm::ES256), EllipticCurve::P256) => Algorithm::ES256,
                (None | Some(KeyAlgorithm::ES384), EllipticCurve::P384) => Algorithm::ES384,
                _ => return Err("unsupported EC curve or algorithm"),
            };
            let key = DecodingKey::from_ec_components(&ec.x, &ec.y)
                .map_err(|_| "invalid EC components")?;
            (key, algorithm)
        }
        _ => return Err("unsupported key type"),
    };

    Ok(SigningKey {
        kid,
        algorithm,
        key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        foreign_jwk, test_pool, trusted_jwk, trusted_jwks, StaticKeySource, TRUSTED_KID,
    };

    fn cache_over(source: &Arc<StaticKeySource>) -> KeySetCache {
        KeySetCache::new(source.clone())
    }

    #[test]
    fn pool_urls_follow_cognito_layout() {
        let pool = UserPool::new("eu-central-1", "eu-central-1_AbC123");
        assert_eq!(
            pool.issuer(),
            "https://cognito-idp.eu-central-1.amazonaws.com/eu-central-1_AbC123"
        );
        assert_eq!(
            pool.jwks_url(),
            "https://cognito-idp.eu-central-1.amazonaws.com/eu-central-1_AbC123/.well-known/jwks.json"
        );
    }

    #[test]
    fn pool_endpoint_override_replaces_base() {
        let pool = UserPool::new("local", "local_pool").with_endpoint("http://localhost:9229/");
        assert_eq!(pool.issuer(), "http://localhost:9229/local_pool");
    }

    #[test]
    fn endpoint_check_rejects_plain_http_to_remote_hosts() {
        assert!(checked_endpoint("https://cognito-idp.eu-central-1.amazonaws.com/x").is_ok());
        assert!(checked_endpoint("http://127.0.0.1:9229/x").is_ok());
        assert!(checked_endpoint("http://localhost:9229/x").is_ok());
        assert!(matches!(
            checked_endpoint("http://cognito-idp.eu-central-1.amazonaws.com/x"),
            Err(KeyResolutionError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn key_set_skips_encryption_and_kidless_keys() {
        let mut enc = foreign_jwk("enc-key");
        enc.common.public_key_use = Some(PublicKeyUse::Encryption);
        let mut kidless = foreign_jwk("ignored");
        kidless.common.key_id = None;

        let jwks = JwkSet {
            keys: vec![trusted_jwk(TRUSTED_KID), enc, kidless],
        };
        let set = KeySet::from_jwks(&jwks, "https://example.test/jwks.json").unwrap();

        assert_eq!(set.len(), 1);
        assert!(set.get(TRUSTED_KID).is_some());
        assert_eq!(set.source_url(), "https://example.test/jwks.json");
    }

    #[test]
    fn key_set_without_usable_keys_is_a_parse_error() {
        let jwks = JwkSet { keys: vec![] };
        assert!(matches!(
            KeySet::from_jwks(&jwks, "https://example.test/jwks.json"),
            Err(KeyResolutionError::Parse(_))
        ));
    }

    #[test]
    fn rsa_key_without_alg_defaults_to_rs256() {
        let mut jwk = trusted_jwk(TRUSTED_KID);
        jwk.common.key_algorithm = None;
        let key = jwk_to_signing_key(&jwk).unwrap();
        assert_eq!(key.algorithm(), Algorithm::RS256);
    }

    #[tokio::test]
    async fn known_keys_are_served_from_memory() {
        let source = Arc::new(StaticKeySource::new(trusted_jwks()));
        let cache = cache_over(&source);
        let pool = test_pool();

        for _ in 0..5 {
            let key = cache.resolve(&pool, TRUSTED_KID).await.unwrap();
            assert_eq!(key.kid(), TRUSTED_KID);
        }
        assert_eq!(source.fetches(), 1);
        assert!(cache.is_cached(&pool).await);
    }

    #[tokio::test]
    async fn unknown_kid_refreshes_once_then_reports_unknown() {
        let source = Arc::new(StaticKeySource::new(trusted_jwks()));
        let cache = cache_over(&source);
        let pool = test_pool();

        cache.resolve(&pool, TRUSTED_KID).await.unwrap();
        assert_eq!(source.fetches(), 1);

        // The miss after the initial fetch falls inside the cooldown window.
        for _ in 0..10 {
            let err = cache.resolve(&pool, "forged").await.unwrap_err();
            assert_eq!(
                err,
                ResolveError::UnknownKey {
                    kid: "forged".to_string()
                }
            );
        }
        assert_eq!(source.fetches(), 1);
    }

    #[tokio::test]
    async fn unknown_kid_after_cooldown_picks_up_rotated_key() {
        let source = Arc::new(StaticKeySource::new(trusted_jwks()));
        let cache = cache_over(&source).with_min_refresh_interval(Duration::ZERO);
        let pool = test_pool();

        cache.resolve(&pool, TRUSTED_KID).await.unwrap();
        source.set_document(JwkSet {
            keys: vec![trusted_jwk(TRUSTED_KID), foreign_jwk("k2")],
        });

        let rotated = cache.resolve(&pool, "k2").await.unwrap();
        assert_eq!(rotated.kid(), "k2");
        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test]
    async fn fetch_failure_is_distinct_from_unknown_key() {
        let source = Arc::new(StaticKeySource::failing(KeyResolutionError::Status(503)));
        let cache = cache_over(&source);

        let err = cache.resolve(&test_pool(), TRUSTED_KID).await.unwrap_err();
        assert_eq!(err, ResolveError::Unavailable(KeyResolutionError::Status(503)));
        assert!(err.is_transient());
        assert!(!ResolveError::UnknownKey { kid: "x".into() }.is_transient());
    }

    #[tokio::test]
    async fn failed_fetch_is_not_retried_inside_cooldown() {
        let source = Arc::new(StaticKeySource::failing(KeyResolutionError::Status(500)));
        let cache = cache_over(&source);
        let pool = test_pool();

        for _ in 0..3 {
            assert!(cache.resolve(&pool, TRUSTED_KID).await.is_err());
        }
        assert_eq!(source.fetches(), 1);
    }

    #[tokio::test]
    async fn slow_fetch_times_out() {
        let source = Arc::new(
            StaticKeySource::new(trusted_jwks()).with_delay(Duration::from_millis(200)),
        );
        let cache = cache_over(&source).with_fetch_timeout(Duration::from_millis(20));

        let err = cache.resolve(&test_pool(), TRUSTED_KID).await.unwrap_err();
        assert!(matches!(
            err,
            ResolveError::Unavailable(KeyResolutionError::Timeout(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_misses_collapse_into_one_fetch() {
        let source = Arc::new(
            StaticKeySource::new(trusted_jwks()).with_delay(Duration::from_millis(50)),
        );
        let cache = Arc::new(cache_over(&source));
        let pool = test_pool();

        let mut handles = Vec::new();
        for _ in 0..32 {
            let cache = cache.clone();
            let pool = pool.clone();
            handles.push(tokio::spawn(async move {
                cache.resolve(&pool, "not-published").await
            }));
        }

        for handle in handles {
            let result = handle.await.unwrap();
            assert!(matches!(result, Err(ResolveError::UnknownKey { .. })));
        }
        assert_eq!(source.fetches(), 1);
    }

    #[tokio::test]
    async fn stale_set_keeps_serving_known_keys_when_refresh_fails() {
        let source = Arc::new(StaticKeySource::new(trusted_jwks()));
        let cache = cache_over(&source)
            .with_cache_ttl(Duration::ZERO)
            .with_min_refresh_interval(Duration::ZERO);
        let pool = test_pool();

        cache.resolve(&pool, TRUSTED_KID).await.unwrap();
        source.fail_with(KeyResolutionError::Request("connection reset".into()));

        let key = cache.resolve(&pool, TRUSTED_KID).await.unwrap();
        assert_eq!(key.kid(), TRUSTED_KID);
        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test]
    async fn abandoned_resolve_still_populates_cache() {
        let source = Arc::new(
            StaticKeySource::new(trusted_jwks()).with_delay(Duration::from_millis(50)),
        );
        let cache = Arc::new(cache_over(&source));
        let pool = test_pool();

        let abandoned = tokio::time::timeout(
            Duration::from_millis(5),
            cache.resolve(&pool, TRUSTED_KID),
        )
        .await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(cache.is_cached(&pool).await);
        cache.resolve(&pool, TRUSTED_KID).await.unwrap();
        assert_eq!(source.fetches(), 1);
    }

    #[tokio::test]
    async fn pools_are_cached_independently() {
        let source = Arc::new(StaticKeySource::new(trusted_jwks()));
        let cache = cache_over(&source);

        cache.resolve(&test_pool(), TRUSTED_KID).await.unwrap();
        cache
            .resolve(&UserPool::new("us-east-1", "us-east-1_Other"), TRUSTED_KID)
            .await
            .unwrap();
        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test]
    async fn ensure_loaded_warms_the_cache() {
        let source = Arc::new(StaticKeySource::new(trusted_jwks()));
        let cache = cache_over(&source);
        let pool = test_pool();

        assert!(!cache.is_cached(&pool).await);
        cache.ensure_loaded(&pool).await.unwrap();
        assert!(cache.is_cached(&pool).await);
        cache.ensure_loaded(&pool).await.unwrap();
        assert_eq!(source.fetches(), 1);
    }
}
