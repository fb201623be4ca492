// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names, default values and the
//! immutable [`ConfigEnv`] snapshot produced once at startup by
//! [`crate::secrets::SecretsBootstrapper`]. Nothing reads the ambient process
//! environment after the bootstrapper returns; every component receives the
//! snapshot (or settings derived from it) by injection.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `3000` |
//! | `AUTH_ISSUER` | Expected JWT issuer claim | Required |
//! | `AUTH_AUDIENCE` | Expected JWT audience claim | Required |
//! | `AUTH_JWKS_URI` | Remote JWKS endpoint | Required unless `AUTH_TEST_JWKS` is set |
//! | `AUTH_TEST_JWKS` / `AUTH_TEST_JWK` | Inline JWKS (or single JWK) JSON | Unset |
//! | `TENANT_CLAIM` | Claim carrying the tenant id | `ew_tenant_id` |
//! | `AUTH_ROLE_CLAIM` | Claim carrying roles | `roles` |
//! | `AUTH_SCOPE_CLAIM` | Claim carrying scopes | `scp` |
//! | `KEY_VAULT_NAME` | Remote secret store to merge at startup | Unset |
//! | `KEY_VAULT_ACCESS_TOKEN` | Static bearer token for the secret store | Managed identity |
//! | `APP_ENV` | Deployment mode (`production` makes bootstrap failures fatal) | Unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=info` |

use std::collections::BTreeMap;
use std::net::SocketAddr;

use thiserror::Error;

/// Expected token issuer.
pub const AUTH_ISSUER_ENV: &str = "AUTH_ISSUER";
/// Expected token audience.
pub const AUTH_AUDIENCE_ENV: &str = "AUTH_AUDIENCE";
/// Remote key set URI.
pub const AUTH_JWKS_URI_ENV: &str = "AUTH_JWKS_URI";
/// Inline key set (JWKS document or single JWK), mainly for tests and local runs.
pub const AUTH_TEST_JWKS_ENV: &str = "AUTH_TEST_JWKS";
/// Alias of [`AUTH_TEST_JWKS_ENV`] holding a single JWK.
pub const AUTH_TEST_JWK_ENV: &str = "AUTH_TEST_JWK";
/// Name of the claim carrying the tenant id.
pub const TENANT_CLAIM_ENV: &str = "TENANT_CLAIM";
/// Name of the claim carrying roles.
pub const AUTH_ROLE_CLAIM_ENV: &str = "AUTH_ROLE_CLAIM";
/// Name of the claim carrying scopes.
pub const AUTH_SCOPE_CLAIM_ENV: &str = "AUTH_SCOPE_CLAIM";
/// Remote secret store identifier.
pub const KEY_VAULT_NAME_ENV: &str = "KEY_VAULT_NAME";
/// Optional static access token for the remote secret store.
pub const KEY_VAULT_ACCESS_TOKEN_ENV: &str = "KEY_VAULT_ACCESS_TOKEN";
/// Deployment mode indicator.
pub const APP_ENV_ENV: &str = "APP_ENV";
/// Log output format.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";
/// Bind host.
pub const HOST_ENV: &str = "HOST";
/// Bind port.
pub const PORT_ENV: &str = "PORT";

/// Default tenant claim name.
pub const DEFAULT_TENANT_CLAIM: &str = "ew_tenant_id";
/// Default role claim name.
pub const DEFAULT_ROLE_CLAIM: &str = "roles";
/// Default scope claim name.
pub const DEFAULT_SCOPE_CLAIM: &str = "scp";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const PRODUCTION: &str = "production";

/// Configuration errors raised while deriving typed settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

/// Immutable key/value configuration snapshot.
///
/// Empty values are treated as unset, mirroring how the deployment tooling
/// blanks out variables it does not want to apply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigEnv {
    values: BTreeMap<String, String>,
}

impl ConfigEnv {
    /// Build a snapshot from explicit pairs. Later pairs win.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Look up a value. Returns `None` for missing or empty entries.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Look up a value, falling back to `default`.
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Whether the deployment mode indicator says production.
    pub fn is_production(&self) -> bool {
        self.get(APP_ENV_ENV)
            .is_some_and(|v| v.eq_ignore_ascii_case(PRODUCTION))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Overwrite a key. Only the bootstrapper writes.
    pub(crate) fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Insert a key only when it is not present yet.
    pub(crate) fn fill(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.entry(key.into()).or_insert_with(|| value.into());
    }
}

/// Where verification keys come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    /// Remote JWKS document fetched by URI.
    Remote(String),
    /// Inline JWKS document or single JWK (raw JSON).
    Inline(String),
}

/// Settings consumed by the token verifier and policy engine.
///
/// Required values are kept optional here: a missing issuer, audience or key
/// source is reported per request as a server misconfiguration rather than
/// preventing startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSettings {
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub key_source: Option<KeySource>,
    pub tenant_claim: String,
    pub role_claim: String,
    pub scope_claim: String,
}

impl AuthSettings {
    pub fn from_config(config: &ConfigEnv) -> Self {
        let inline = config
            .get(AUTH_TEST_JWKS_ENV)
            .or_else(|| config.get(AUTH_TEST_JWK_ENV))
            .map(|json| KeySource::Inline(json.to_string()));
        let remote = config
            .get(AUTH_JWKS_URI_ENV)
            .map(|uri| KeySource::Remote(uri.to_string()));

        Self {
            issuer: config.get(AUTH_ISSUER_ENV).map(str::to_string),
            audience: config.get(AUTH_AUDIENCE_ENV).map(str::to_string),
            key_source: inline.or(remote),
            tenant_claim: config
                .get_or(TENANT_CLAIM_ENV, DEFAULT_TENANT_CLAIM)
                .to_string(),
            role_claim: config
                .get_or(AUTH_ROLE_CLAIM_ENV, DEFAULT_ROLE_CLAIM)
                .to_string(),
            scope_claim: config
                .get_or(AUTH_SCOPE_CLAIM_ENV, DEFAULT_SCOPE_CLAIM)
                .to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Process-level server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub bind_addr: SocketAddr,
    pub log_format: LogFormat,
}

impl ServerSettings {
    pub fn from_config(config: &ConfigEnv) -> Result<Self, ConfigError> {
        let host = config.get_or(HOST_ENV, DEFAULT_HOST);
        let port = match config.get(PORT_ENV) {
            Some(raw) => raw.parse::<u16>().map_err(|_| ConfigError::InvalidValue {
                name: PORT_ENV,
                value: raw.to_string(),
            })?,
            None => DEFAULT_PORT,
        };
        let bind_addr = format!("{host}:{port}")
            .parse()
            .map_err(|_| ConfigError::InvalidValue {
                name: HOST_ENV,
                value: host.to_string(),
            })?;

        Ok(Self {
            bind_addr,
            log_format: log_format(config),
        })
    }
}

/// Resolve the log format. Unknown values fall back to pretty output.
pub fn log_format(config: &ConfigEnv) -> LogFormat {
    match config.get(LOG_FORMAT_ENV) {
        Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
        _ => LogFormat::Pretty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_values_read_as_unset() {
        let config = ConfigEnv::from_pairs([("A", ""), ("B", "x")]);
        assert_eq!(config.get("A"), None);
        assert_eq!(config.get("B"), Some("x"));
        assert_eq!(config.get_or("A", "fallback"), "fallback");
    }

    #[test]
    fn fill_never_overwrites() {
        let mut config = ConfigEnv::from_pairs([("A", "base")]);
        config.fill("A", "local");
        config.fill("B", "local");
        assert_eq!(config.get("A"), Some("base"));
        assert_eq!(config.get("B"), Some("local"));
    }

    #[test]
    fn production_detection_is_case_insensitive() {
        assert!(ConfigEnv::from_pairs([(APP_ENV_ENV, "Production")]).is_production());
        assert!(!ConfigEnv::from_pairs([(APP_ENV_ENV, "development")]).is_production());
        assert!(!ConfigEnv::default().is_production());
    }

    #[test]
    fn auth_settings_defaults() {
        let settings = AuthSettings::from_config(&ConfigEnv::default());
        assert_eq!(settings.issuer, None);
        assert_eq!(settings.key_source, None);
        assert_eq!(settings.tenant_claim, "ew_tenant_id");
        assert_eq!(settings.role_claim, "roles");
        assert_eq!(settings.scope_claim, "scp");
    }

    #[test]
    fn inline_key_set_takes_precedence() {
        let config = ConfigEnv::from_pairs([
            (AUTH_JWKS_URI_ENV, "https://login.example.com/keys"),
            (AUTH_TEST_JWK_ENV, r#"{"kty":"RSA"}"#),
        ]);
        let settings = AuthSettings::from_config(&config);
        assert_eq!(
            settings.key_source,
            Some(KeySource::Inline(r#"{"kty":"RSA"}"#.to_string()))
        );
    }

    #[test]
    fn claim_names_are_configurable() {
        let config = ConfigEnv::from_pairs([
            (TENANT_CLAIM_ENV, "tid"),
            (AUTH_ROLE_CLAIM_ENV, "groups"),
            (AUTH_SCOPE_CLAIM_ENV, "scope"),
        ]);
        let settings = AuthSettings::from_config(&config);
        assert_eq!(settings.tenant_claim, "tid");
        assert_eq!(settings.role_claim, "groups");
        assert_eq!(settings.scope_claim, "scope");
    }

    #[test]
    fn server_settings_parse_port() {
        let config = ConfigEnv::from_pairs([(PORT_ENV, "8081"), (LOG_FORMAT_ENV, "JSON")]);
        let settings = ServerSettings::from_config(&config).unwrap();
        assert_eq!(settings.bind_addr.port(), 8081);
        assert_eq!(settings.log_format, LogFormat::Json);

        let bad = ConfigEnv::from_pairs([(PORT_ENV, "eighty")]);
        assert!(ServerSettings::from_config(&bad).is_err());
    }
}
