// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Secrets Bootstrap
//!
//! One-time startup step producing the immutable [`ConfigEnv`].
//!
//! ## Layering (highest precedence first)
//!
//! 1. Enabled secrets from the remote store named by `KEY_VAULT_NAME`,
//!    written under their original name and, when different, the
//!    hyphen-to-underscore normalized name
//! 2. Process environment
//! 3. `.env`
//! 4. `.env.local` (only fills keys absent from every layer above)
//!
//! A remote store failure is logged and skipped unless `APP_ENV=production`,
//! in which case bootstrap fails and the process must not start serving.

pub mod key_vault;
pub mod store;

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{ConfigEnv, KEY_VAULT_NAME_ENV};

pub use key_vault::KeyVaultClient;
pub use store::{
    normalize_secret_name, SecretEntry, SecretProperties, SecretStore, SecretStoreError,
};

const BASE_ENV_FILE: &str = ".env";
const LOCAL_ENV_FILE: &str = ".env.local";

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("failed to read configuration file {path}: {message}")]
    LocalSource { path: PathBuf, message: String },
    #[error("failed to load secrets from '{store}' in production: {source}")]
    SecretStore {
        store: String,
        #[source]
        source: SecretStoreError,
    },
}

/// Builds the process configuration exactly once.
///
/// `bootstrap` consumes the bootstrapper, so a second run needs a new value
/// and cannot mutate a snapshot already handed to the request-serving phase.
#[derive(Debug, Clone)]
pub struct SecretsBootstrapper {
    base_file: PathBuf,
    local_file: PathBuf,
    process_env: Vec<(String, String)>,
}

impl SecretsBootstrapper {
    /// Bootstrapper reading `.env`/`.env.local` from the working directory and
    /// capturing the current process environment.
    pub fn from_process() -> Self {
        Self::new(BASE_ENV_FILE, LOCAL_ENV_FILE).with_process_env(std::env::vars())
    }

    /// Bootstrapper over explicit files and an empty process environment.
    pub fn new(base_file: impl Into<PathBuf>, local_file: impl Into<PathBuf>) -> Self {
        Self {
            base_file: base_file.into(),
            local_file: local_file.into(),
            process_env: Vec::new(),
        }
    }

    pub fn with_process_env<I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.process_env = vars.into_iter().collect();
        self
    }

    /// Merge the local layers: process environment, then `.env`, then
    /// `.env.local`, each only supplying keys the previous ones lack.
    pub fn load_local(&self) -> Result<ConfigEnv, BootstrapError> {
        let mut config = ConfigEnv::from_pairs(self.process_env.iter().cloned());
        for path in [&self.base_file, &self.local_file] {
            for (key, value) in read_env_file(path)? {
                config.fill(key, value);
            }
        }
        Ok(config)
    }

    /// Run the full bootstrap, connecting to Key Vault when `KEY_VAULT_NAME`
    /// is configured.
    pub async fn bootstrap(self) -> Result<ConfigEnv, BootstrapError> {
        let config = self.load_local()?;
        let Some(vault_name) = config.get(KEY_VAULT_NAME_ENV).map(str::to_string) else {
            debug!("KEY_VAULT_NAME not set, using local configuration only");
            return Ok(config);
        };

        match KeyVaultClient::from_config(&vault_name, &config) {
            Ok(client) => merge_remote(config, Some(&client)).await,
            Err(e) => handle_store_failure(config, &vault_name, e),
        }
    }

    /// Run the bootstrap against an explicit store (or none).
    pub async fn bootstrap_with(
        self,
        store: Option<&dyn SecretStore>,
    ) -> Result<ConfigEnv, BootstrapError> {
        let config = self.load_local()?;
        merge_remote(config, store).await
    }
}

/// Parse a dotenv file without touching the process environment.
/// A missing file contributes nothing.
fn read_env_file(path: &Path) -> Result<Vec<(String, String)>, BootstrapError> {
    let iter = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter,
        Err(dotenvy::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(Vec::new());
        }
        Err(e) => {
            return Err(BootstrapError::LocalSource {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
        }
    };

    iter.map(|item| {
        item.map_err(|e| BootstrapError::LocalSource {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    })
    .collect()
}

async fn merge_remote(
    config: ConfigEnv,
    store: Option<&dyn SecretStore>,
) -> Result<ConfigEnv, BootstrapError> {
    let Some(store) = store else {
        return Ok(config);
    };

    info!(store = store.name(), "Loading secrets from remote store");
    match fetch_entries(store).await {
        Ok(entries) => {
            let mut merged = config;
            for entry in &entries {
                for key in entry.config_keys() {
                    merged.insert(key, entry.value.as_str());
                }
            }
            info!(
                store = store.name(),
                count = entries.len(),
                "Loaded secrets from remote store"
            );
            Ok(merged)
        }
        Err(e) => handle_store_failure(config, store.name(), e),
    }
}

/// Enumerate and fetch every enabled secret. Nothing is applied until the
/// whole listing succeeds.
async fn fetch_entries(store: &dyn SecretStore) -> Result<Vec<SecretEntry>, SecretStoreError> {
    let mut entries = Vec::new();
    for props in store.list_secrets().await? {
        if !props.enabled {
            debug!(secret = %props.name, "Skipping disabled secret");
            continue;
        }
        match store.get_secret(&props.name).await? {
            Some(value) if !value.is_empty() => {
                entries.push(SecretEntry::new(props.name, value, true))
            }
            _ => debug!(secret = %props.name, "Skipping secret without a value"),
        }
    }
    Ok(entries)
}

fn handle_store_failure(
    config: ConfigEnv,
    store: &str,
    error: SecretStoreError,
) -> Result<ConfigEnv, BootstrapError> {
    if config.is_production() {
        return Err(BootstrapError::SecretStore {
            store: store.to_string(),
            source: error,
        });
    }
    warn!(store, error = %error, "Failed to load secrets, continuing with local configuration");
    Ok(config)
}
