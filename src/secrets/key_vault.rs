// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Azure Key Vault client (REST, `api-version=7.4`).
//!
//! Lists secret properties page by page following `nextLink` and fetches
//! each value individually. Credentials come from `KEY_VAULT_ACCESS_TOKEN`
//! when set, otherwise from the managed identity endpoint (App Service
//! `IDENTITY_ENDPOINT`/`IDENTITY_HEADER`, or the VM metadata service).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::{de::DeserializeOwned, Deserialize};
use tokio::sync::OnceCell;
use tracing::debug;
use url::Url;

use super::store::{SecretProperties, SecretStore, SecretStoreError};
use crate::config::{ConfigEnv, KEY_VAULT_ACCESS_TOKEN_ENV};

const API_VERSION: &str = "7.4";
const VAULT_RESOURCE: &str = "https://vault.azure.net";
const IMDS_TOKEN_URL: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const IMDS_API_VERSION: &str = "2018-02-01";
const APP_SERVICE_API_VERSION: &str = "2019-08-01";
const IDENTITY_ENDPOINT_ENV: &str = "IDENTITY_ENDPOINT";
const IDENTITY_HEADER_ENV: &str = "IDENTITY_HEADER";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// How the client obtains its bearer token.
#[derive(Debug, Clone)]
pub enum Credential {
    /// Pre-issued access token.
    Static(String),
    /// App Service managed identity endpoint.
    AppService { endpoint: String, header: String },
    /// VM instance metadata service.
    InstanceMetadata,
}

impl Credential {
    fn from_config(config: &ConfigEnv) -> Self {
        if let Some(token) = config.get(KEY_VAULT_ACCESS_TOKEN_ENV) {
            return Credential::Static(token.to_string());
        }
        match (config.get(IDENTITY_ENDPOINT_ENV), config.get(IDENTITY_HEADER_ENV)) {
            (Some(endpoint), Some(header)) => Credential::AppService {
                endpoint: endpoint.to_string(),
                header: header.to_string(),
            },
            _ => Credential::InstanceMetadata,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct SecretListPage {
    #[serde(default)]
    value: Vec<SecretItem>,
    #[serde(rename = "nextLink", default)]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SecretItem {
    id: String,
    #[serde(default)]
    attributes: SecretAttributes,
}

#[derive(Debug, Deserialize)]
struct SecretAttributes {
    #[serde(default = "enabled_by_default")]
    enabled: bool,
}

impl Default for SecretAttributes {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct SecretBundle {
    #[serde(default)]
    value: Option<String>,
}

/// Key Vault backed [`SecretStore`].
#[derive(Debug)]
pub struct KeyVaultClient {
    vault_name: String,
    base_url: Url,
    credential: Credential,
    token: OnceCell<String>,
    http: reqwest::Client,
}

impl KeyVaultClient {
    /// Client for `https://{vault_name}.vault.azure.net`.
    pub fn from_config(vault_name: &str, config: &ConfigEnv) -> Result<Self, SecretStoreError> {
        let base_url =
            Url::parse(&format!("https://{vault_name}.vault.azure.net/")).map_err(|e| {
                SecretStoreError::Request(format!("invalid vault name {vault_name}: {e}"))
            })?;
        Self::with_base_url(vault_name, base_url, Credential::from_config(config))
    }

    /// Client against an explicit endpoint.
    pub fn with_base_url(
        vault_name: impl Into<String>,
        base_url: Url,
        credential: Credential,
    ) -> Result<Self, SecretStoreError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SecretStoreError::Request(e.to_string()))?;
        Ok(Self {
            vault_name: vault_name.into(),
            base_url,
            credential,
            token: OnceCell::new(),
            http,
        })
    }

    async fn access_token(&self) -> Result<&str, SecretStoreError> {
        self.token
            .get_or_try_init(|| self.fetch_token())
            .await
            .map(String::as_str)
    }

    async fn fetch_token(&self) -> Result<String, SecretStoreError> {
        let request = match &self.credential {
            Credential::Static(token) => return Ok(token.clone()),
            Credential::AppService { endpoint, header } => self
                .http
                .get(endpoint)
                .query(&[("api-version", APP_SERVICE_API_VERSION), ("resource", VAULT_RESOURCE)])
                .header("X-IDENTITY-HEADER", header),
            Credential::InstanceMetadata => self
                .http
                .get(IMDS_TOKEN_URL)
                .query(&[("api-version", IMDS_API_VERSION), ("resource", VAULT_RESOURCE)])
                .header("Metadata", "true"),
        };

        let response = request
            .send()
            .await
            .map_err(|e| SecretStoreError::Credential(e.to_string()))?;
        if !response.status().is_success() {
            return Err(SecretStoreError::Credential(format!(
                "HTTP {} from identity endpoint",
                response.status()
            )));
        }
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| SecretStoreError::Credential(e.to_string()))?;
        Ok(token.access_token)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
    ) -> Result<Option<T>, SecretStoreError> {
        let token = self.access_token().await?;
        let response = self
            .http
            .get(url.clone())
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .send()
            .await
            .map_err(|e| SecretStoreError::Request(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(SecretStoreError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        response
            .json()
            .await
            .map(Some)
            .map_err(|e| SecretStoreError::Decode(e.to_string()))
    }

    /// Resolve a `nextLink`. The bearer token is only ever sent to the vault
    /// itself, so links to any other origin are rejected.
    fn next_page(&self, link: &str) -> Result<Url, SecretStoreError> {
        let url = Url::parse(link).map_err(|e| SecretStoreError::Decode(e.to_string()))?;
        if url.origin() != self.base_url.origin() {
            return Err(SecretStoreError::Decode(format!(
                "nextLink points outside the vault: {}",
                url.origin().ascii_serialization()
            )));
        }
        Ok(url)
    }

    fn endpoint(&self, path: &str) -> Result<Url, SecretStoreError> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| SecretStoreError::Request(e.to_string()))?;
        url.query_pairs_mut().append_pair("api-version", API_VERSION);
        Ok(url)
    }
}

/// Secret name is the last path segment of the item id
/// (`https://{vault}.vault.azure.net/secrets/{name}`).
fn secret_name_from_id(id: &str) -> Option<&str> {
    id.trim_end_matches('/').rsplit('/').next().filter(|s| !s.is_empty())
}

#[async_trait]
impl SecretStore for KeyVaultClient {
    fn name(&self) -> &str {
        &self.vault_name
    }

    async fn list_secrets(&self) -> Result<Vec<SecretProperties>, SecretStoreError> {
        let mut secrets = Vec::new();
        let mut next = Some(self.endpoint("secrets")?);

        while let Some(url) = next.take() {
            let page: SecretListPage = self
                .get_json(url)
                .await?
                .ok_or_else(|| SecretStoreError::Decode("secret listing not found".to_string()))?;

            for item in page.value {
                match secret_name_from_id(&item.id) {
                    Some(name) => secrets.push(SecretProperties {
                        name: name.to_string(),
                        enabled: item.attributes.enabled,
                    }),
                    None => debug!(id = %item.id, "Skipping secret with unparseable id"),
                }
            }

            next = match page.next_link {
                Some(link) => Some(self.next_page(&link)?),
                None => None,
            };
        }

        Ok(secrets)
    }

    async fn get_secret(&self, name: &str) -> Result<Option<String>, SecretStoreError> {
        let url = self.endpoint(&format!("secrets/{name}"))?;
        let bundle: Option<SecretBundle> = self.get_json(url).await?;
        Ok(bundle.and_then(|b| b.value))
    }
}
