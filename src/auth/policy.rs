// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Role/scope access policy.
//!
//! A route declares an [`AccessRequirement`]: a set of roles and a set of
//! scopes. A caller is let through when any of their roles is a required
//! role, or any of their scopes is a required scope. Comparison ignores
//! case. A category with nothing required does not grant access on its own;
//! a requirement with both categories empty admits every authenticated
//! caller.

use std::collections::HashSet;

use super::claims::Principal;
use super::error::AuthError;
use crate::config::{AuthSettings, ConfigEnv};

/// Roles and scopes a route requires.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessRequirement {
    roles: Vec<String>,
    scopes: Vec<String>,
}

impl AccessRequirement {
    /// Values are trimmed, empties dropped and case-insensitive duplicates
    /// removed, keeping declaration order.
    pub fn new<R, S>(roles: R, scopes: S) -> Self
    where
        R: IntoIterator,
        R::Item: AsRef<str>,
        S: IntoIterator,
        S::Item: AsRef<str>,
    {
        Self {
            roles: clean(roles),
            scopes: clean(scopes),
        }
    }

    /// No restriction beyond being authenticated.
    pub fn authenticated() -> Self {
        Self::default()
    }

    pub fn roles<R>(roles: R) -> Self
    where
        R: IntoIterator,
        R::Item: AsRef<str>,
    {
        Self::new(roles, Vec::<String>::new())
    }

    pub fn scopes<S>(scopes: S) -> Self
    where
        S: IntoIterator,
        S::Item: AsRef<str>,
    {
        Self::new(Vec::<String>::new(), scopes)
    }

    /// Requirement taken from comma-separated configuration variables.
    ///
    /// When neither variable yields a value the defaults apply to both
    /// categories; otherwise both come from configuration.
    pub fn from_env(
        config: &ConfigEnv,
        roles_var: Option<&str>,
        scopes_var: Option<&str>,
        default_roles: &[&str],
        default_scopes: &[&str],
    ) -> Self {
        let roles = parse_csv(roles_var.and_then(|name| config.get(name)));
        let scopes = parse_csv(scopes_var.and_then(|name| config.get(name)));
        if roles.is_empty() && scopes.is_empty() {
            Self::new(default_roles, default_scopes)
        } else {
            Self::new(roles, scopes)
        }
    }

    pub fn required_roles(&self) -> &[String] {
        &self.roles
    }

    pub fn required_scopes(&self) -> &[String] {
        &self.scopes
    }

    pub fn is_unrestricted(&self) -> bool {
        self.roles.is_empty() && self.scopes.is_empty()
    }

    fn forbidden(&self) -> AuthError {
        AuthError::Forbidden {
            required_roles: self.roles.clone(),
            required_scopes: self.scopes.clone(),
        }
    }
}

/// Split a comma-separated list, trimming entries and dropping empties.
pub fn parse_csv(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn clean<I>(values: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut seen = HashSet::new();
    values
        .into_iter()
        .map(|v| v.as_ref().trim().to_string())
        .filter(|v| !v.is_empty() && seen.insert(v.to_lowercase()))
        .collect()
}

/// Decides whether a principal satisfies a requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPolicy {
    role_claim: String,
    scope_claim: String,
}

impl AccessPolicy {
    pub fn new(role_claim: impl Into<String>, scope_claim: impl Into<String>) -> Self {
        Self {
            role_claim: role_claim.into(),
            scope_claim: scope_claim.into(),
        }
    }

    pub fn from_settings(settings: &AuthSettings) -> Self {
        Self::new(settings.role_claim.clone(), settings.scope_claim.clone())
    }

    /// Authorize a request.
    ///
    /// `principal` is `None` when authentication never ran for the request,
    /// which is an ordering bug upstream and reported as `MissingContext`.
    pub fn authorize(
        &self,
        principal: Option<&Principal>,
        requirement: &AccessRequirement,
    ) -> Result<(), AuthError> {
        let principal = principal.ok_or(AuthError::MissingContext)?;
        if requirement.is_unrestricted() {
            return Ok(());
        }

        let roles = lowercase_set(principal.claim_values(&self.role_claim));
        let scopes = lowercase_set(principal.claim_values(&self.scope_claim));

        if intersects(&requirement.roles, &roles) || intersects(&requirement.scopes, &scopes) {
            Ok(())
        } else {
            Err(requirement.forbidden())
        }
    }
}

fn lowercase_set(values: Vec<String>) -> HashSet<String> {
    values.into_iter().map(|v| v.to_lowercase()).collect()
}

fn intersects(required: &[String], actual: &HashSet<String>) -> bool {
    required.iter().any(|r| actual.contains(&r.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn principal(claims: Value) -> Principal {
        match claims {
            Value::Object(map) => Principal::new(map),
            _ => panic!("claims must be an object"),
        }
    }

    fn policy() -> AccessPolicy {
        AccessPolicy::new("roles", "scp")
    }

    fn ops_route() -> AccessRequirement {
        AccessRequirement::roles(["portal_admin", "portal_ops"])
    }

    #[test]
    fn matching_role_is_allowed() {
        let p = principal(json!({"roles": ["viewer", "portal_ops"]}));
        assert_eq!(policy().authorize(Some(&p), &ops_route()), Ok(()));
    }

    #[test]
    fn role_match_ignores_case() {
        let p = principal(json!({"roles": ["Admin"]}));
        let requirement = AccessRequirement::roles(["admin"]);
        assert_eq!(policy().authorize(Some(&p), &requirement), Ok(()));
    }

    #[test]
    fn non_matching_roles_are_forbidden_with_requirement() {
        let p = principal(json!({"roles": ["viewer"], "scp": ""}));
        assert_eq!(
            policy().authorize(Some(&p), &ops_route()),
            Err(AuthError::Forbidden {
                required_roles: vec!["portal_admin".into(), "portal_ops".into()],
                required_scopes: vec![],
            })
        );
    }

    #[test]
    fn scope_alone_satisfies_requirement() {
        let p = principal(json!({"roles": ["viewer"], "scp": "notify.send Other"}));
        let requirement = AccessRequirement::new(["portal_admin"], ["Notify.Send"]);
        assert_eq!(policy().authorize(Some(&p), &requirement), Ok(()));
    }

    #[test]
    fn empty_requirement_admits_any_principal() {
        let p = principal(json!({"sub": "u1"}));
        assert_eq!(
            policy().authorize(Some(&p), &AccessRequirement::authenticated()),
            Ok(())
        );
    }

    #[test]
    fn missing_principal_is_missing_context() {
        assert_eq!(
            policy().authorize(None, &AccessRequirement::authenticated()),
            Err(AuthError::MissingContext)
        );
    }

    #[test]
    fn claim_names_are_configurable() {
        let policy = AccessPolicy::new("groups", "scope");
        let p = principal(json!({"groups": "portal_ops", "roles": ["portal_admin"]}));
        assert_eq!(policy.authorize(Some(&p), &ops_route()), Ok(()));

        let p = principal(json!({"roles": ["portal_admin"]}));
        assert!(policy.authorize(Some(&p), &ops_route()).is_err());
    }

    #[test]
    fn requirement_is_cleaned() {
        let requirement = AccessRequirement::new([" a ", "", "A", "b"], Vec::<String>::new());
        assert_eq!(requirement.required_roles(), ["a", "b"]);
    }

    #[test]
    fn from_env_prefers_configured_values() {
        let config = ConfigEnv::from_pairs([("NOTIFY_ROLES", "ops, admin ,")]);
        let requirement = AccessRequirement::from_env(
            &config,
            Some("NOTIFY_ROLES"),
            Some("NOTIFY_SCOPES"),
            &["portal_admin"],
            &["default.scope"],
        );
        assert_eq!(requirement.required_roles(), ["ops", "admin"]);
        assert!(requirement.required_scopes().is_empty());
    }

    #[test]
    fn from_env_falls_back_to_defaults() {
        let config = ConfigEnv::from_pairs([("NOTIFY_ROLES", " , ")]);
        let requirement = AccessRequirement::from_env(
            &config,
            Some("NOTIFY_ROLES"),
            None,
            &["portal_admin", "portal_ops"],
            &[],
        );
        assert_eq!(requirement.required_roles(), ["portal_admin", "portal_ops"]);
    }

    #[test]
    fn parse_csv_handles_missing_values() {
        assert!(parse_csv(None).is_empty());
        assert_eq!(parse_csv(Some("a,,b ")), vec!["a", "b"]);
    }
}
