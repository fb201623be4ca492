// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Tenant resolution.
//!
//! The tenant claim of a verified token always wins. A [`TenantResolver`]
//! is consulted only when the token carries no tenant.

use axum::http::HeaderMap;

use super::claims::{Principal, TenantId};

/// Header consulted by [`HeaderTenantResolver`].
pub const TENANT_HEADER: &str = "x-tenant-id";

const MIN_TENANT_LEN: usize = 3;
const MAX_TENANT_LEN: usize = 32;

/// Supplies a tenant for an authenticated request whose token had none.
pub trait TenantResolver: Send + Sync {
    fn resolve(&self, headers: &HeaderMap, principal: &Principal) -> Option<TenantId>;
}

/// Reads the tenant from the `X-Tenant-Id` header.
///
/// Values outside 3..=32 characters are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderTenantResolver;

impl TenantResolver for HeaderTenantResolver {
    fn resolve(&self, headers: &HeaderMap, _principal: &Principal) -> Option<TenantId> {
        let value = headers.get(TENANT_HEADER)?.to_str().ok()?.trim();
        let len = value.chars().count();
        (MIN_TENANT_LEN..=MAX_TENANT_LEN)
            .contains(&len)
            .then(|| TenantId::from(value))
    }
}

/// Combine the claim-derived tenant with the resolver's.
pub fn resolve_tenant(
    from_claim: Option<TenantId>,
    resolver: Option<&dyn TenantResolver>,
    headers: &HeaderMap,
    principal: &Principal,
) -> Option<TenantId> {
    from_claim.or_else(|| resolver.and_then(|r| r.resolve(headers, principal)))
}
