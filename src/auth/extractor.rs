// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for the authenticated principal and tenant.
//!
//! Both read what [`authenticate`](super::middleware::authenticate) attached
//! to the request:
//!
//! ```rust,ignore
//! async fn my_handler(
//!     Auth(principal): Auth,
//!     CurrentTenant(tenant): CurrentTenant,
//! ) -> impl IntoResponse {
//!     // principal is the verified claim set, tenant is Option<TenantId>
//! }
//! ```

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};

use super::claims::{Principal, TenantId};
use super::error::AuthError;

/// The verified principal of the request.
///
/// Rejects with `MissingContext` when the route is not behind the
/// authentication middleware.
pub struct Auth(pub Principal);

impl<S> FromRequestParts<S> for Auth
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(Auth)
            .ok_or(AuthError::MissingContext)
    }
}

/// The tenant resolved for the request, if any.
pub struct CurrentTenant(pub Option<TenantId>);

impl<S> FromRequestParts<S> for CurrentTenant
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(CurrentTenant(parts.extensions.get::<TenantId>().cloned()))
    }
}
