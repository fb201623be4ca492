// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Remote secret store abstraction.

use async_trait::async_trait;
use thiserror::Error;

/// Listing entry: a secret's name and whether it is enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretProperties {
    pub name: String,
    pub enabled: bool,
}

/// A secret read from the remote store, ready to be projected into config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretEntry {
    pub name: String,
    pub normalized_name: String,
    pub value: String,
    pub enabled: bool,
}

impl SecretEntry {
    pub fn new(name: impl Into<String>, value: impl Into<String>, enabled: bool) -> Self {
        let name = name.into();
        Self {
            normalized_name: normalize_secret_name(&name),
            name,
            value: value.into(),
            enabled,
        }
    }

    /// Configuration keys this entry is written under: the original name and,
    /// when it differs, the normalized one.
    pub fn config_keys(&self) -> Vec<&str> {
        if self.normalized_name == self.name {
            vec![self.name.as_str()]
        } else {
            vec![self.name.as_str(), self.normalized_name.as_str()]
        }
    }
}

/// Secret stores only allow hyphens; environment-style keys use underscores.
pub fn normalize_secret_name(name: &str) -> String {
    name.replace('-', "_")
}

#[derive(Debug, Error)]
pub enum SecretStoreError {
    #[error("failed to acquire secret store credential: {0}")]
    Credential(String),
    #[error("secret store request failed: {0}")]
    Request(String),
    #[error("secret store returned HTTP {status} for {url}")]
    Status { status: u16, url: String },
    #[error("invalid secret store response: {0}")]
    Decode(String),
}

/// An enumerable collection of named secrets, each fetchable by name.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Human readable identifier used in logs.
    fn name(&self) -> &str;

    /// Enumerate every secret, enabled or not.
    async fn list_secrets(&self) -> Result<Vec<SecretProperties>, SecretStoreError>;

    /// Fetch a secret's current value. `None` when the secret has no value.
    async fn get_secret(&self, name: &str) -> Result<Option<String>, SecretStoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hyphenated_names_get_two_keys() {
        let entry = SecretEntry::new("DB-CONN-STRING", "v1", true);
        assert_eq!(entry.normalized_name, "DB_CONN_STRING");
        assert_eq!(entry.config_keys(), vec!["DB-CONN-STRING", "DB_CONN_STRING"]);
    }

    #[test]
    fn plain_names_are_written_once() {
        let entry = SecretEntry::new("APIKEY", "v1", true);
        assert_eq!(entry.config_keys(), vec!["APIKEY"]);
    }
}
