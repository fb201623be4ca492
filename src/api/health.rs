// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::Json;
use serde::Serialize;

use crate::auth::{Auth, CurrentTenant, TenantId};

/// Authenticated health response, echoing the resolved tenant.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub tenant: Option<TenantId>,
}

/// Simple health check response for liveness probes.
#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    pub status: &'static str,
}

/// Health check behind authentication.
pub async fn health(Auth(_): Auth, CurrentTenant(tenant): CurrentTenant) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        tenant,
    })
}

/// Liveness probe handler.
///
/// Always returns 200 if the process is running. Not authenticated and not
/// audited.
pub async fn liveness() -> Json<LivenessResponse> {
    Json(LivenessResponse { status: "ok" })
}
