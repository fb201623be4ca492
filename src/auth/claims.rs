// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Verified principal and tenant identity.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

/// Claims in the order they identify the acting user.
const ACTOR_CLAIMS: [&str; 4] = ["oid", "sub", "upn", "preferred_username"];

/// The decoded claim set of a verified token.
///
/// Cheap to clone and immutable once attached to a request.
#[derive(Debug, Clone, PartialEq)]
pub struct Principal(Arc<Map<String, Value>>);

impl Principal {
    pub fn new(claims: Map<String, Value>) -> Self {
        Self(Arc::new(claims))
    }

    pub fn claims(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// A claim as a non-empty string.
    pub fn str_claim(&self, name: &str) -> Option<&str> {
        self.claim(name)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn subject(&self) -> Option<&str> {
        self.str_claim("sub")
    }

    /// Identifier of the acting user: `oid`, then `sub`, then `upn`, then
    /// `preferred_username`.
    pub fn actor_id(&self) -> Option<&str> {
        ACTOR_CLAIMS.iter().find_map(|claim| self.str_claim(claim))
    }

    /// Values of a multi-valued claim such as roles or scopes.
    ///
    /// Accepts a JSON array or a single space-delimited string. Array items
    /// that are numbers or booleans are stringified; nulls and objects are
    /// dropped.
    pub fn claim_values(&self, name: &str) -> Vec<String> {
        match self.claim(name) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.trim().to_string()),
                    Value::Number(n) => Some(n.to_string()),
                    Value::Bool(b) => Some(b.to_string()),
                    _ => None,
                })
                .filter(|s| !s.is_empty())
                .collect(),
            Some(Value::String(s)) => s.split_whitespace().map(str::to_string).collect(),
            _ => Vec::new(),
        }
    }

    /// Tenant id from the named claim; absent when missing or not a string.
    pub fn tenant_id(&self, claim_name: &str) -> Option<TenantId> {
        self.str_claim(claim_name).map(TenantId::from)
    }
}

/// Tenant the current request is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TenantId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TenantId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
