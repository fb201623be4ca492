// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Access Audit
//!
//! One [`AuditRecord`] per request.
//!
//! [`audit_access`] arms a drop guard when the request enters. The guard
//! emits the record as soon as the inner service returns the response head
//! (status and headers), before the body is streamed to the client. Status,
//! principal and tenant are all known at that point; `durationMs` measures
//! handling time and excludes body transfer. A client that disconnects while
//! a body is still streaming is therefore recorded with the handler's status.
//!
//! The guard also emits when the request future is dropped without a
//! response:
//!
//! - client disconnect or cancellation: status 499
//! - panic while handling (caught further out): status 500
//!
//! Sink failures are logged and never reach the client.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{Principal, TenantId};
use crate::request_id::RequestIds;

/// Status recorded when the request is dropped before a response exists.
pub const CLIENT_CLOSED_REQUEST: u16 = 499;
const PANICKED: u16 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Ok,
    Error,
}

impl Outcome {
    pub fn from_status(status: u16) -> Self {
        if status < 400 {
            Outcome::Ok
        } else {
            Outcome::Error
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Ok => "ok",
            Outcome::Error => "error",
        }
    }
}

/// Structured record of one completed request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub event_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub method: String,
    pub path: String,
    pub status: u16,
    pub outcome: Outcome,
    pub duration_ms: u64,
    pub tenant_id: Option<TenantId>,
    pub actor_id: Option<String>,
    pub request_id: Option<String>,
    pub correlation_id: Option<String>,
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit sink unavailable: {0}")]
    Unavailable(String),
}

/// Destination for audit records.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: &AuditRecord) -> Result<(), AuditError>;
}

/// Emits records as `tracing` events on the `audit` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: &AuditRecord) -> Result<(), AuditError> {
        info!(
            target: "audit",
            event_id = %record.event_id,
            timestamp = %record.timestamp.to_rfc3339(),
            action = %record.action,
            method = %record.method,
            path = %record.path,
            status = record.status,
            outcome = record.outcome.as_str(),
            duration_ms = record.duration_ms,
            tenant_id = record.tenant_id.as_ref().map(TenantId::as_str),
            actor_id = record.actor_id.as_deref(),
            request_id = record.request_id.as_deref(),
            correlation_id = record.correlation_id.as_deref(),
            "api.access"
        );
        Ok(())
    }
}

/// Keeps records in memory for assertions.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub(crate) struct MemoryAuditSink {
    records: Arc<std::sync::Mutex<Vec<AuditRecord>>>,
}

#[cfg(test)]
impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
impl AuditSink for MemoryAuditSink {
    fn record(&self, record: &AuditRecord) -> Result<(), AuditError> {
        self.records
            .lock()
            .map_err(|e| AuditError::Unavailable(e.to_string()))?
            .push(record.clone());
        Ok(())
    }
}

/// Shared handle to the process audit sink.
#[derive(Clone)]
pub struct AuditRecorder {
    sink: Arc<dyn AuditSink>,
}

impl AuditRecorder {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    /// Recorder writing to [`TracingAuditSink`].
    pub fn tracing() -> Self {
        Self::new(Arc::new(TracingAuditSink))
    }

    /// Middleware state auditing every request under `action`.
    ///
    /// ```rust,ignore
    /// router.route_layer(middleware::from_fn_with_state(
    ///     state.audit.wrap("api.health"),
    ///     audit_access,
    /// ))
    /// ```
    pub fn wrap(&self, action: impl Into<String>) -> AuditScope {
        AuditScope {
            recorder: self.clone(),
            action: Arc::from(action.into()),
        }
    }

    fn emit(&self, record: AuditRecord) {
        if let Err(e) = self.sink.record(&record) {
            warn!(
                error = %e,
                action = %record.action,
                request_id = record.request_id.as_deref(),
                "Failed to record audit event"
            );
        }
    }
}

impl Default for AuditRecorder {
    fn default() -> Self {
        Self::tracing()
    }
}

/// State for [`audit_access`]: a recorder bound to an action name.
#[derive(Clone)]
pub struct AuditScope {
    recorder: AuditRecorder,
    action: Arc<str>,
}

impl AuditScope {
    pub fn action(&self) -> &str {
        &self.action
    }
}

/// A record waiting for its response.
struct PendingAudit {
    recorder: AuditRecorder,
    action: Arc<str>,
    method: String,
    path: String,
    ids: RequestIds,
    started: Instant,
    done: bool,
}

impl PendingAudit {
    fn finish(mut self, status: u16, principal: Option<&Principal>, tenant_id: Option<TenantId>) {
        self.done = true;
        let actor_id = principal.and_then(Principal::actor_id).map(str::to_string);
        let record = self.record(status, actor_id, tenant_id);
        self.recorder.emit(record);
    }

    fn record(
        &mut self,
        status: u16,
        actor_id: Option<String>,
        tenant_id: Option<TenantId>,
    ) -> AuditRecord {
        AuditRecord {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            action: self.action.to_string(),
            method: std::mem::take(&mut self.method),
            path: std::mem::take(&mut self.path),
            status,
            outcome: Outcome::from_status(status),
            duration_ms: u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX),
            tenant_id,
            actor_id,
            request_id: self.ids.request_id.take(),
            correlation_id: self.ids.correlation_id.take(),
        }
    }
}

impl Drop for PendingAudit {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        let status = if std::thread::panicking() {
            PANICKED
        } else {
            CLIENT_CLOSED_REQUEST
        };
        let record = self.record(status, None, None);
        self.recorder.emit(record);
    }
}

/// Audit middleware. Principal and tenant are read from the response
/// extensions, where the authentication middleware leaves them.
pub async fn audit_access(
    State(scope): State<AuditScope>,
    request: Request,
    next: Next,
) -> Response {
    let pending = PendingAudit {
        recorder: scope.recorder,
        action: scope.action,
        method: request.method().to_string(),
        path: request.uri().path().to_string(),
        ids: RequestIds::from_headers(request.headers()),
        started: Instant::now(),
        done: false,
    };

    let response = next.run(request).await;

    pending.finish(
        response.status().as_u16(),
        response.extensions().get::<Principal>(),
        response.extensions().get::<TenantId>().cloned(),
    );
    response
}
