// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Notification routes, gated by an environment-configurable requirement.
//!
//! The handlers only acknowledge the request; delivery is owned by the
//! downstream notification service.

use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{AccessRequirement, Auth, CurrentTenant, TenantId};
use crate::config::ConfigEnv;
use crate::error::ApiError;

/// Comma-separated roles allowed to use the notification routes.
pub const NOTIFY_ROLES_ENV: &str = "NOTIFY_ROLES";
/// Comma-separated scopes allowed to use the notification routes.
pub const NOTIFY_SCOPES_ENV: &str = "NOTIFY_SCOPES";
pub const DEFAULT_NOTIFY_ROLES: [&str; 3] = ["portal_admin", "portal_governance", "portal_ops"];

/// Requirement applied to every notification route.
pub fn requirement(config: &ConfigEnv) -> AccessRequirement {
    AccessRequirement::from_env(
        config,
        Some(NOTIFY_ROLES_ENV),
        Some(NOTIFY_SCOPES_ENV),
        &DEFAULT_NOTIFY_ROLES,
        &[],
    )
}

#[derive(Debug, Deserialize)]
pub struct SendNotificationRequest {
    pub channel: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationAccepted {
    pub id: Uuid,
    pub status: &'static str,
    pub channel: String,
    pub tenant: Option<TenantId>,
    pub requested_by: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub topic: String,
}

#[derive(Debug, Serialize)]
pub struct Subscription {
    pub topic: String,
    pub tenant: Option<TenantId>,
    pub subscriber: Option<String>,
}

pub async fn send(
    Auth(principal): Auth,
    CurrentTenant(tenant): CurrentTenant,
    Json(request): Json<SendNotificationRequest>,
) -> Result<(StatusCode, Json<NotificationAccepted>), ApiError> {
    let channel = request.channel.trim();
    if channel.is_empty() {
        return Err(ApiError::bad_request("channel is required"));
    }
    if request.message.trim().is_empty() {
        return Err(ApiError::bad_request("message is required"));
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(NotificationAccepted {
            id: Uuid::new_v4(),
            status: "queued",
            channel: channel.to_string(),
            tenant,
            requested_by: principal.actor_id().map(str::to_string),
        }),
    ))
}

pub async fn subscribe(
    Auth(principal): Auth,
    CurrentTenant(tenant): CurrentTenant,
    Json(request): Json<SubscribeRequest>,
) -> Result<Json<Subscription>, ApiError> {
    let topic = request.topic.trim();
    if topic.is_empty() {
        return Err(ApiError::bad_request("topic is required"));
    }

    Ok(Json(Subscription {
        topic: topic.to_string(),
        tenant,
        subscriber: principal.actor_id().map(str::to_string),
    }))
}
