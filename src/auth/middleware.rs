// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication and authorization middleware for Axum.
//!
//! Layer order on a gated route, outermost first:
//!
//! ```rust,ignore
//! Router::new()
//!     .route("/notifications/send", post(send))
//!     .route_layer(from_fn_with_state(state.gate(requirement), require_access))
//!     .route_layer(from_fn_with_state(state.clone(), authenticate))
//!     .route_layer(from_fn_with_state(state.audit.wrap("api.notifications"), audit_access));
//! ```
//!
//! Failures are answered here and never reach the handler.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, error, warn};

use super::claims::{Principal, TenantId};
use super::error::AuthError;
use super::policy::{AccessPolicy, AccessRequirement};
use super::tenant::resolve_tenant;
use super::verifier::Verified;
use crate::state::AppState;

/// Verify the bearer token and attach the principal and tenant.
///
/// Both are inserted into the request extensions for handlers and into the
/// response extensions for the audit layer.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let authorization = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let Verified {
        principal,
        tenant_id,
    } = match state.verifier.verify(authorization).await {
        Ok(verified) => verified,
        Err(e) => {
            log_rejection(&e);
            return e.into_response();
        }
    };

    let tenant = resolve_tenant(
        tenant_id,
        state.tenant_resolver.as_deref(),
        request.headers(),
        &principal,
    );
    debug!(
        actor = principal.actor_id(),
        tenant = tenant.as_ref().map(TenantId::as_str),
        "Request authenticated"
    );

    request.extensions_mut().insert(principal.clone());
    if let Some(tenant) = &tenant {
        request.extensions_mut().insert(tenant.clone());
    }

    let mut response = next.run(request).await;
    response.extensions_mut().insert(principal);
    if let Some(tenant) = tenant {
        response.extensions_mut().insert(tenant);
    }
    response
}

fn log_rejection(e: &AuthError) {
    match e {
        AuthError::NotConfigured | AuthError::InvalidInlineKeySet => {
            error!(error_code = e.error_code(), "Authentication unavailable")
        }
        AuthError::InvalidToken { details } => {
            warn!(error_code = e.error_code(), details = %details, "Token rejected")
        }
        _ => debug!(error_code = e.error_code(), "Request not authenticated"),
    }
}

/// State for [`require_access`]: the policy and one route's requirement.
#[derive(Debug, Clone)]
pub struct AccessGate {
    policy: Arc<AccessPolicy>,
    requirement: Arc<AccessRequirement>,
}

impl AccessGate {
    pub fn new(policy: Arc<AccessPolicy>, requirement: AccessRequirement) -> Self {
        Self {
            policy,
            requirement: Arc::new(requirement),
        }
    }

    pub fn requirement(&self) -> &AccessRequirement {
        &self.requirement
    }
}

/// Authorize the request against the gate's requirement.
///
/// Must run inside [`authenticate`].
pub async fn require_access(
    State(gate): State<AccessGate>,
    request: Request,
    next: Next,
) -> Response {
    let principal = request.extensions().get::<Principal>();
    match gate.policy.authorize(principal, &gate.requirement) {
        Ok(()) => next.run(request).await,
        Err(e) => {
            warn!(
                error_code = e.error_code(),
                actor = principal.and_then(Principal::actor_id),
                path = %request.uri().path(),
                "Access denied"
            );
            e.into_response()
        }
    }
}
