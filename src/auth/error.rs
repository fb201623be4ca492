// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication and authorization errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Failure of a gating stage.
///
/// Every variant is terminal at the middleware boundary: the request is
/// answered with the mapped response and never reaches the route handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No `Authorization: Bearer <token>` header.
    #[error("Missing Bearer token")]
    MissingToken,
    /// Signature, issuer, audience, algorithm, expiry or format check failed.
    #[error("Invalid token: {details}")]
    InvalidToken { details: String },
    /// Issuer, audience or key source is not configured (server side).
    #[error("Auth not configured")]
    NotConfigured,
    /// The inline key set could not be parsed (server side).
    #[error("Invalid AUTH_TEST_JWK(S) JSON")]
    InvalidInlineKeySet,
    /// Authorization ran without a principal on the request.
    #[error("Missing user context")]
    MissingContext,
    /// Policy denial. Lists only the requirement, never the caller's claims.
    #[error("Forbidden")]
    Forbidden {
        required_roles: Vec<String>,
        required_scopes: Vec<String>,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthErrorBody {
    error: &'static str,
    error_code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    required_roles: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    required_scopes: Option<Vec<String>>,
}

impl AuthError {
    pub fn invalid_token(details: impl Into<String>) -> Self {
        AuthError::InvalidToken {
            details: details.into(),
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "missing_token",
            AuthError::InvalidToken { .. } => "invalid_token",
            AuthError::NotConfigured | AuthError::InvalidInlineKeySet => "auth_not_configured",
            AuthError::MissingContext => "missing_context",
            AuthError::Forbidden { .. } => "forbidden",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingToken
            | AuthError::InvalidToken { .. }
            | AuthError::MissingContext => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AuthError::NotConfigured | AuthError::InvalidInlineKeySet => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Client-facing summary, without details.
    fn summary(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "Missing Bearer token",
            AuthError::InvalidToken { .. } => "Invalid token",
            AuthError::NotConfigured => "Auth not configured",
            AuthError::InvalidInlineKeySet => "Invalid AUTH_TEST_JWK(S) JSON",
            AuthError::MissingContext => "Missing user context",
            AuthError::Forbidden { .. } => "Forbidden",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut body = AuthErrorBody {
            error: self.summary(),
            error_code: self.error_code(),
            details: None,
            required_roles: None,
            required_scopes: None,
        };
        match self {
            AuthError::InvalidToken { details } => body.details = Some(details),
            AuthError::Forbidden {
                required_roles,
                required_scopes,
            } => {
                body.required_roles = Some(required_roles);
                body.required_scopes = Some(required_scopes);
            }
            _ => {}
        }
        (status, Json(body)).into_response()
    }
}
