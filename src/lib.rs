// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Portal Access Gate - request gating for a multi-tenant HTTP API
//!
//! Authenticates bearer tokens against a remote key set, resolves the
//! caller's tenant, enforces role/scope policy per route and records one
//! audit event per request. Configuration is assembled once at startup from
//! env files, the process environment and a remote secret store.
//!
//! ## Modules
//!
//! - `secrets` - Startup configuration bootstrap (env files + Key Vault)
//! - `auth` - Token verification, tenant resolution, access policy
//! - `audit` - Per-request access audit records
//! - `api` - HTTP routes and router wiring (Axum)

pub mod api;
pub mod audit;
pub mod auth;
pub mod config;
pub mod error;
pub mod request_id;
pub mod secrets;
pub mod state;
pub mod telemetry;

#[cfg(test)]
mod testutil;
