// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Request gating: bearer token verification, tenant resolution and
//! role/scope authorization.
//!
//! ## Auth Flow
//!
//! 1. Caller sends `Authorization: Bearer <JWT>`
//! 2. [`middleware::authenticate`]:
//!    - Verifies signature, algorithm, expiry, issuer, audience against the
//!      configured key set (remote JWKS or inline)
//!    - Attaches the [`Principal`] and the tenant (token claim first, then
//!      the [`TenantResolver`])
//! 3. [`middleware::require_access`] checks the route's
//!    [`AccessRequirement`]
//! 4. The handler runs and reads identity through [`Auth`] and
//!    [`CurrentTenant`]
//!
//! ## Security
//!
//! - Only RSA PKCS#1 v1.5 and PSS signatures are accepted
//! - JWKS is cached with TTL and refetched once on an unknown `kid`
//! - Clock skew tolerance is 60 seconds
//! - Policy denials list the requirement, never the caller's claims

pub mod claims;
pub mod error;
pub mod extractor;
pub mod jwks;
pub mod middleware;
pub mod policy;
pub mod tenant;
pub mod verifier;

pub use claims::{Principal, TenantId};
pub use error::AuthError;
pub use extractor::{Auth, CurrentTenant};
pub use jwks::{JwksManager, KeySet};
pub use middleware::{authenticate, require_access, AccessGate};
pub use policy::{AccessPolicy, AccessRequirement};
pub use tenant::{HeaderTenantResolver, TenantResolver};
pub use verifier::{TokenVerifier, Verified};
