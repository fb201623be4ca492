// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::audit::AuditRecorder;
use crate::auth::{
    AccessGate, AccessPolicy, AccessRequirement, HeaderTenantResolver, TenantResolver,
    TokenVerifier,
};
use crate::config::{AuthSettings, ConfigEnv};

/// Shared, read-only state of the gating layer.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ConfigEnv>,
    pub verifier: Arc<TokenVerifier>,
    pub policy: Arc<AccessPolicy>,
    pub tenant_resolver: Option<Arc<dyn TenantResolver>>,
    pub audit: AuditRecorder,
}

impl AppState {
    /// Build state from the bootstrapped configuration, with the header
    /// tenant resolver and the tracing audit sink.
    pub fn new(config: ConfigEnv) -> Self {
        let settings = AuthSettings::from_config(&config);
        Self {
            policy: Arc::new(AccessPolicy::from_settings(&settings)),
            verifier: Arc::new(TokenVerifier::new(settings)),
            config: Arc::new(config),
            tenant_resolver: Some(Arc::new(HeaderTenantResolver)),
            audit: AuditRecorder::tracing(),
        }
    }

    pub fn with_tenant_resolver(mut self, resolver: Option<Arc<dyn TenantResolver>>) -> Self {
        self.tenant_resolver = resolver;
        self
    }

    pub fn with_audit(mut self, audit: AuditRecorder) -> Self {
        self.audit = audit;
        self
    }

    /// Middleware state enforcing `requirement` with the shared policy.
    pub fn gate(&self, requirement: AccessRequirement) -> AccessGate {
        AccessGate::new(self.policy.clone(), requirement)
    }
}
