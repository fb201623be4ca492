// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer token verification.
//!
//! Tokens are checked against the configured key set for signature,
//! algorithm (RSA PKCS#1 and PSS only), issuer, audience and expiry. The key
//! set is built on first use and retained for the life of the verifier.

use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use serde_json::{Map, Value};
use tokio::sync::OnceCell;
use tracing::{debug, error};

use super::claims::{Principal, TenantId};
use super::error::AuthError;
use super::jwks::KeySet;
use crate::config::{AuthSettings, KeySource};

/// Signature algorithms accepted from the token header.
pub const ALLOWED_ALGORITHMS: [Algorithm; 6] = [
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
];

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

const BEARER_PREFIX: &str = "Bearer ";

/// Result of a successful verification.
#[derive(Debug, Clone, PartialEq)]
pub struct Verified {
    pub principal: Principal,
    /// Tenant from the configured claim, if present and a string.
    pub tenant_id: Option<TenantId>,
}

/// Verifies bearer tokens. Shared by all requests of the process.
pub struct TokenVerifier {
    settings: AuthSettings,
    key_set: OnceCell<KeySet>,
}

impl TokenVerifier {
    pub fn new(settings: AuthSettings) -> Self {
        Self {
            settings,
            key_set: OnceCell::new(),
        }
    }

    pub fn settings(&self) -> &AuthSettings {
        &self.settings
    }

    /// Whether the key set has been constructed yet.
    pub fn key_set_initialized(&self) -> bool {
        self.key_set.initialized()
    }

    /// Verify the value of an `Authorization` header.
    pub async fn verify(&self, authorization: Option<&str>) -> Result<Verified, AuthError> {
        let token = bearer_token(authorization)?;
        self.verify_token(token).await
    }

    /// Verify a raw compact JWT.
    pub async fn verify_token(&self, token: &str) -> Result<Verified, AuthError> {
        let (Some(issuer), Some(audience), Some(source)) = (
            self.settings.issuer.as_deref(),
            self.settings.audience.as_deref(),
            self.settings.key_source.as_ref(),
        ) else {
            error!(
                "Token verification requested but AUTH_ISSUER, AUTH_AUDIENCE or the key set is \
                 not configured"
            );
            return Err(AuthError::NotConfigured);
        };

        let key_set = self.key_set(source).await?;

        let header = decode_header(token).map_err(|e| AuthError::invalid_token(e.to_string()))?;
        if !ALLOWED_ALGORITHMS.contains(&header.alg) {
            return Err(AuthError::invalid_token(format!(
                "unexpected algorithm {:?}",
                header.alg
            )));
        }

        let decoding_key = key_set
            .decoding_key(header.kid.as_deref(), header.alg)
            .await
            .map_err(|e| AuthError::invalid_token(e.to_string()))?;

        let mut validation = Validation::new(header.alg);
        validation.algorithms = ALLOWED_ALGORITHMS.to_vec();
        validation.leeway = CLOCK_SKEW_LEEWAY;
        validation.set_issuer(&[issuer]);
        validation.set_audience(&[audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);

        let token_data = decode::<Map<String, Value>>(token, &decoding_key, &validation)
            .map_err(|e| {
                debug!(error = %e, "Token rejected");
                AuthError::invalid_token(e.to_string())
            })?;

        let principal = Principal::new(token_data.claims);
        let tenant_id = principal.tenant_id(&self.settings.tenant_claim);
        Ok(Verified {
            principal,
            tenant_id,
        })
    }

    /// Build the key set once. Construction is pure, so a lost race costs
    /// nothing and only the first value is retained.
    async fn key_set(&self, source: &KeySource) -> Result<&KeySet, AuthError> {
        self.key_set
            .get_or_try_init(|| async {
                match source {
                    KeySource::Remote(uri) => KeySet::remote(uri).map_err(|e| {
                        error!(error = %e, "Failed to create JWKS client");
                        AuthError::NotConfigured
                    }),
                    KeySource::Inline(json) => KeySet::inline_from_json(json).map_err(|e| {
                        error!(error = %e, "Inline key set is not valid JSON");
                        AuthError::InvalidInlineKeySet
                    }),
                }
            })
            .await
    }
}

/// Extract the token from an `Authorization` header value.
pub fn bearer_token(authorization: Option<&str>) -> Result<&str, AuthError> {
    authorization
        .and_then(|value| value.strip_prefix(BEARER_PREFIX))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MissingToken)
}
