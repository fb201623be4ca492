// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWKS (JSON Web Key Set) fetching and caching.
//!
//! ## Security
//!
//! - Only RSA signing keys are turned into decoding keys; EC, OKP and
//!   symmetric (`oct`) entries are never used
//! - Keys marked for encryption (`use: enc`) are skipped
//! - A key that declares `alg` is only used for that algorithm
//!
//! ## Caching
//!
//! - Keys are cached with a TTL (5 minutes)
//! - An unknown `kid` triggers one refetch, at most every 30 seconds, so a
//!   rotated signing key is picked up without waiting for the TTL
//! - Fetches are serialized: concurrent lookups on a cold or expired cache
//!   wait for a single request to the endpoint

use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, JwkSet, KeyAlgorithm, PublicKeyUse};
use jsonwebtoken::{Algorithm, DecodingKey};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Default JWKS cache TTL (5 minutes).
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Minimum delay between refetches triggered by an unknown `kid`.
const REFETCH_COOLDOWN: Duration = Duration::from_secs(30);

/// HTTP timeout for the JWKS endpoint.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum JwksError {
    #[error("failed to fetch JWKS: {0}")]
    Fetch(String),
    #[error("no matching key found in JWKS")]
    NoMatchingKey,
    #[error("invalid RSA key in JWKS: {0}")]
    InvalidKey(String),
    #[error("invalid key set JSON: {0}")]
    InvalidJson(String),
}

/// JWKS cache entry.
struct CacheEntry {
    jwks: JwkSet,
    fetched_at: Instant,
}

/// JWKS manager with caching.
///
/// Fetches and caches the remote key set used for JWT verification.
/// Construction performs no network I/O.
#[derive(Clone)]
pub struct JwksManager {
    /// JWKS URL
    jwks_url: String,
    /// Cache TTL
    cache_ttl: Duration,
    /// Cached JWKS
    cache: Arc<RwLock<Option<CacheEntry>>>,
    /// Held while fetching
    fetch_lock: Arc<Mutex<()>>,
    /// HTTP client
    client: reqwest::Client,
}

impl JwksManager {
    /// Create a new JWKS manager.
    ///
    /// # Arguments
    /// - `jwks_url`: The JWKS endpoint URL (e.g., `https://login.example.com/discovery/v2.0/keys`)
    pub fn new(jwks_url: impl Into<String>) -> Result<Self, JwksError> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| JwksError::Fetch(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            jwks_url: jwks_url.into(),
            cache_ttl: DEFAULT_CACHE_TTL,
            cache: Arc::new(RwLock::new(None)),
            fetch_lock: Arc::new(Mutex::new(())),
            client,
        })
    }

    /// Create with custom cache TTL.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Get the JWKS URL.
    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    /// Fetch JWKS (with caching).
    async fn get_jwks(&self) -> Result<JwkSet, JwksError> {
        if let Some(jwks) = self.cached_within(self.cache_ttl).await {
            return Ok(jwks);
        }

        let _fetching = self.fetch_lock.lock().await;
        if let Some(jwks) = self.cached_within(self.cache_ttl).await {
            return Ok(jwks);
        }
        self.fetch_and_store().await
    }

    /// The cached key set, if it was fetched less than `max_age` ago.
    async fn cached_within(&self, max_age: Duration) -> Option<JwkSet> {
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .filter(|entry| entry.fetched_at.elapsed() < max_age)
            .map(|entry| entry.jwks.clone())
    }

    /// Fetch JWKS from the endpoint.
    async fn fetch_jwks(&self) -> Result<JwkSet, JwksError> {
        let response = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| JwksError::Fetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(JwksError::Fetch(format!(
                "HTTP {} from JWKS endpoint",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| JwksError::Fetch(e.to_string()))
    }

    /// Force refresh the JWKS cache.
    pub async fn refresh(&self) -> Result<JwkSet, JwksError> {
        let _fetching = self.fetch_lock.lock().await;
        self.fetch_and_store().await
    }

    /// Caller must hold `fetch_lock`.
    async fn fetch_and_store(&self) -> Result<JwkSet, JwksError> {
        let jwks = self.fetch_jwks().await?;
        debug!(url = %self.jwks_url, keys = jwks.keys.len(), "Fetched JWKS");
        let mut cache = self.cache.write().await;
        *cache = Some(CacheEntry {
            jwks: jwks.clone(),
            fetched_at: Instant::now(),
        });
        Ok(jwks)
    }

    /// Check if JWKS is currently cached and valid.
    pub async fn is_cached(&self) -> bool {
        let cache = self.cache.read().await;
        if let Some(entry) = &*cache {
            entry.fetched_at.elapsed() < self.cache_ttl
        } else {
            false
        }
    }

    /// Get a decoding key for the token's `kid` (or any usable key when the
    /// token carries none), refetching once on an unknown `kid`.
    pub async fn get_decoding_key(
        &self,
        kid: Option<&str>,
        algorithm: Algorithm,
    ) -> Result<DecodingKey, JwksError> {
        let jwks = self.get_jwks().await?;
        let result = select_key(&jwks, kid, algorithm);
        if !matches!(result, Err(JwksError::NoMatchingKey)) || kid.is_none() {
            return result;
        }

        // Within the cooldown, reuse whatever another lookup just fetched.
        let _fetching = self.fetch_lock.lock().await;
        let jwks = match self.cached_within(REFETCH_COOLDOWN).await {
            Some(jwks) => jwks,
            None => {
                debug!(kid, "Unknown kid, refetching JWKS");
                self.fetch_and_store().await?
            }
        };
        select_key(&jwks, kid, algorithm)
    }
}

/// The key set a verifier resolves keys from.
#[derive(Clone)]
pub enum KeySet {
    /// Remote, cached key set.
    Remote(JwksManager),
    /// Key set supplied inline through configuration.
    Inline(Arc<JwkSet>),
}

impl KeySet {
    /// Remote key set. Pure: no network I/O until the first lookup.
    pub fn remote(jwks_url: &str) -> Result<Self, JwksError> {
        JwksManager::new(jwks_url).map(KeySet::Remote)
    }

    /// Inline key set from either a JWKS document or a single JWK.
    pub fn inline_from_json(json: &str) -> Result<Self, JwksError> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| JwksError::InvalidJson(e.to_string()))?;
        let jwks = if value.get("keys").is_some() {
            serde_json::from_value::<JwkSet>(value)
        } else {
            serde_json::from_value::<Jwk>(value).map(|jwk| JwkSet { keys: vec![jwk] })
        }
        .map_err(|e| JwksError::InvalidJson(e.to_string()))?;
        Ok(KeySet::Inline(Arc::new(jwks)))
    }

    pub async fn decoding_key(
        &self,
        kid: Option<&str>,
        algorithm: Algorithm,
    ) -> Result<DecodingKey, JwksError> {
        match self {
            KeySet::Remote(manager) => manager.get_decoding_key(kid, algorithm).await,
            KeySet::Inline(jwks) => select_key(jwks, kid, algorithm),
        }
    }
}

/// Pick the signing key for `kid`, or the first usable RSA key when the
/// token has no `kid`.
fn select_key(
    jwks: &JwkSet,
    kid: Option<&str>,
    algorithm: Algorithm,
) -> Result<DecodingKey, JwksError> {
    let mut candidates = jwks
        .keys
        .iter()
        .filter(|jwk| usable_for(jwk, algorithm))
        .filter(|jwk| kid.is_none() || jwk.common.key_id.as_deref() == kid);

    let jwk = candidates.next().ok_or(JwksError::NoMatchingKey)?;
    jwk_to_decoding_key(jwk)
}

fn usable_for(jwk: &Jwk, algorithm: Algorithm) -> bool {
    let is_rsa = matches!(jwk.algorithm, AlgorithmParameters::RSA(_));
    let signing = !matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption));
    let alg_matches = jwk
        .common
        .key_algorithm
        .as_ref()
        .map_or(true, |declared| declared_algorithm(declared) == Some(algorithm));
    is_rsa && signing && alg_matches
}

fn declared_algorithm(alg: &KeyAlgorithm) -> Option<Algorithm> {
    match alg {
        KeyAlgorithm::RS256 => Some(Algorithm::RS256),
        KeyAlgorithm::RS384 => Some(Algorithm::RS384),
        KeyAlgorithm::RS512 => Some(Algorithm::RS512),
        KeyAlgorithm::PS256 => Some(Algorithm::PS256),
        KeyAlgorithm::PS384 => Some(Algorithm::PS384),
        KeyAlgorithm::PS512 => Some(Algorithm::PS512),
        _ => None,
    }
}

/// Convert an RSA JWK to a DecodingKey.
fn jwk_to_decoding_key(jwk: &Jwk) -> Result<DecodingKey, JwksError> {
    match &jwk.algorithm {
        AlgorithmParameters::RSA(rsa) => DecodingKey::from_rsa_components(&rsa.n, &rsa.e)
            .map_err(|e| JwksError::InvalidKey(e.to_string())),
        _ => Err(JwksError::NoMatchingKey),
    }
}
