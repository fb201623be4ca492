// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::{
    audit::audit_access,
    auth::{authenticate, require_access},
    error::ApiError,
    request_id::{correlation_id, RequestIds, REQUEST_ID_HEADER},
    state::AppState,
};

pub mod health;
pub mod notifications;

pub fn router(state: AppState) -> Router {
    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route_layer(from_fn_with_state(state.clone(), authenticate))
        .route_layer(from_fn_with_state(
            state.audit.wrap("api.health"),
            audit_access,
        ));

    let notification_routes = Router::new()
        .route("/notifications/send", post(notifications::send))
        .route("/notifications/subscribe", post(notifications::subscribe))
        .route_layer(from_fn_with_state(
            state.gate(notifications::requirement(&state.config)),
            require_access,
        ))
        .route_layer(from_fn_with_state(state.clone(), authenticate))
        .route_layer(from_fn_with_state(
            state.audit.wrap("api.notifications"),
            audit_access,
        ));

    Router::new()
        .route("/health/live", get(health::liveness))
        .merge(health_routes)
        .merge(notification_routes)
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(REQUEST_ID_HEADER, MakeRequestUuid))
                .layer(PropagateRequestIdLayer::new(REQUEST_ID_HEADER))
                .layer(from_fn(correlation_id))
                .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
                    let request_id = request
                        .headers()
                        .get(&REQUEST_ID_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default();
                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        path = %request.uri().path(),
                        request_id = %request_id,
                    )
                }))
                .layer(CatchPanicLayer::new()),
        )
}

async fn not_found(headers: HeaderMap) -> ApiError {
    ApiError::not_found("Route not found").with_ids(RequestIds::from_headers(&headers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{body::Body, http::StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::audit::{AuditRecorder, MemoryAuditSink, Outcome};
    use crate::testutil;

    struct TestApp {
        router: Router,
        audit: MemoryAuditSink,
    }

    fn test_app() -> TestApp {
        let audit = MemoryAuditSink::new();
        let config = testutil::config(&[("NOTIFY_ROLES", "portal_admin,portal_ops")]);
        let state = AppState::new(config).with_audit(AuditRecorder::new(Arc::new(audit.clone())));
        TestApp {
            router: router(state),
            audit,
        }
    }

    async fn send(app: &TestApp, request: Request) -> (StatusCode, HeaderMap, Value) {
        let response = app.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, headers, body)
    }

    fn get_health(token: Option<&str>) -> Request {
        let mut builder = axum::http::Request::builder().uri("/health");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    fn subscribe(token: &str) -> Request {
        axum::http::Request::builder()
            .method("POST")
            .uri("/notifications/subscribe")
            .header("authorization", format!("Bearer {token}"))
            .header("content-type", "application/json")
            .body(Body::from(json!({"topic": "incidents"}).to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_without_header_is_401() {
        let app = test_app();
        let (status, _, body) = send(&app, get_health(None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Missing Bearer token");
    }

    #[tokio::test]
    async fn health_reports_claim_tenant() {
        let app = test_app();
        let token = testutil::mint(json!({"sub": "u1", "ew_tenant_id": "T1"}));
        let (status, _, body) = send(&app, get_health(Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok", "tenant": "T1"}));
    }

    #[tokio::test]
    async fn health_with_invalid_token_is_401() {
        let app = test_app();
        let token = testutil::mint(json!({"sub": "u1", "aud": "api://other"}));
        let (status, _, body) = send(&app, get_health(Some(&token))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid token");
        assert!(body["details"].is_string());
    }

    #[tokio::test]
    async fn liveness_is_open_and_not_audited() {
        let app = test_app();
        let request = axum::http::Request::builder()
            .uri("/health/live")
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert!(app.audit.records().is_empty());
    }

    #[tokio::test]
    async fn matching_role_reaches_handler() {
        let app = test_app();
        let token = testutil::mint(json!({"sub": "u1", "roles": ["viewer", "portal_ops"]}));
        let (status, _, body) = send(&app, subscribe(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["topic"], "incidents");
        assert_eq!(body["subscriber"], "u1");
    }

    #[tokio::test]
    async fn non_matching_role_is_403_with_requirement() {
        let app = test_app();
        let token = testutil::mint(json!({"sub": "u1", "roles": ["viewer"], "scp": ""}));
        let (status, _, body) = send(&app, subscribe(&token)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Forbidden");
        assert_eq!(body["requiredRoles"], json!(["portal_admin", "portal_ops"]));
        assert_eq!(body["requiredScopes"], json!([]));
    }

    #[tokio::test]
    async fn role_match_is_case_insensitive() {
        let app = test_app();
        let token = testutil::mint(json!({"sub": "u1", "roles": ["PORTAL_ADMIN"]}));
        let (status, _, _) = send(&app, subscribe(&token)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn send_validates_body() {
        let app = test_app();
        let token = testutil::mint(json!({"sub": "u1", "roles": ["portal_ops"]}));
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/notifications/send")
            .header("authorization", format!("Bearer {token}"))
            .header("content-type", "application/json")
            .body(Body::from(json!({"channel": "email", "message": " "}).to_string()))
            .unwrap();
        let (status, _, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "bad_request");
    }

    #[tokio::test]
    async fn send_is_accepted() {
        let app = test_app();
        let token = testutil::mint(json!({
            "oid": "o-7",
            "roles": ["portal_admin"],
            "ew_tenant_id": "T9"
        }));
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/notifications/send")
            .header("authorization", format!("Bearer {token}"))
            .header("content-type", "application/json")
            .body(Body::from(json!({"channel": "email", "message": "hi"}).to_string()))
            .unwrap();
        let (status, _, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["status"], "queued");
        assert_eq!(body["tenant"], "T9");
        assert_eq!(body["requestedBy"], "o-7");
    }

    #[tokio::test]
    async fn each_request_is_audited_once() {
        let app = test_app();
        let ok = testutil::mint(json!({
            "sub": "u1",
            "roles": ["portal_ops"],
            "ew_tenant_id": "T1"
        }));
        let denied = testutil::mint(json!({"sub": "u2", "roles": ["viewer"]}));

        send(&app, get_health(None)).await;
        send(&app, subscribe(&ok)).await;
        send(&app, subscribe(&denied)).await;

        let records = app.audit.records();
        assert_eq!(records.len(), 3);

        assert_eq!(records[0].action, "api.health");
        assert_eq!(records[0].status, 401);
        assert_eq!(records[0].outcome, Outcome::Error);
        assert_eq!(records[0].actor_id, None);

        assert_eq!(records[1].action, "api.notifications");
        assert_eq!(records[1].status, 200);
        assert_eq!(records[1].outcome, Outcome::Ok);
        assert_eq!(records[1].actor_id.as_deref(), Some("u1"));
        assert_eq!(records[1].tenant_id.as_ref().map(|t| t.as_str()), Some("T1"));

        assert_eq!(records[2].status, 403);
        assert_eq!(records[2].outcome, Outcome::Error);
        assert_eq!(records[2].actor_id.as_deref(), Some("u2"));

        for record in &records {
            assert!(record.request_id.is_some());
            assert_eq!(record.request_id, record.correlation_id);
        }
    }

    #[tokio::test]
    async fn unknown_route_is_404_with_ids() {
        let app = test_app();
        let request = axum::http::Request::builder()
            .uri("/nope")
            .header("x-request-id", "req-42")
            .header("x-correlation-id", "corr-42")
            .body(Body::empty())
            .unwrap();
        let (status, headers, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "not_found");
        assert_eq!(body["error"]["message"], "Route not found");
        assert_eq!(body["requestId"], "req-42");
        assert_eq!(body["correlationId"], "corr-42");
        assert_eq!(headers["x-request-id"], "req-42");
        assert_eq!(headers["x-correlation-id"], "corr-42");
    }

    #[tokio::test]
    async fn request_id_is_generated_and_echoed() {
        let app = test_app();
        let (_, headers, _) = send(&app, get_health(None)).await;
        let request_id = headers["x-request-id"].to_str().unwrap();
        assert!(uuid::Uuid::parse_str(request_id).is_ok());
        assert_eq!(headers["x-correlation-id"], request_id);
    }
}
