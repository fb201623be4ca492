// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared test fixtures: RSA keys, token minting and a JWKS endpoint.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{routing::get, Router};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};

use crate::config::ConfigEnv;

pub const ISSUER: &str = "https://test-issuer/";
pub const AUDIENCE: &str = "api://test";
pub const KID: &str = "test-key-1";

/// Public half of [`SIGNING_PEM`].
pub const JWKS: &str = include_str!("../tests/fixtures/jwks.json");
/// A key pair the verifier does not trust.
pub const ROGUE_PEM: &[u8] = include_bytes!("../tests/fixtures/rogue.pem");
pub const SIGNING_PEM: &[u8] = include_bytes!("../tests/fixtures/signing.pem");

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Configuration with issuer, audience and the inline test key set, plus
/// `extra` pairs (which win).
pub fn config(extra: &[(&str, &str)]) -> ConfigEnv {
    let mut pairs = vec![
        ("AUTH_ISSUER", ISSUER),
        ("AUTH_AUDIENCE", AUDIENCE),
        ("AUTH_TEST_JWKS", JWKS),
    ];
    pairs.extend_from_slice(extra);
    ConfigEnv::from_pairs(pairs)
}

/// Standard valid claims merged with `overrides`.
pub fn claims(overrides: Value) -> Value {
    let now = now();
    let mut claims = json!({
        "iss": ISSUER,
        "aud": AUDIENCE,
        "iat": now,
        "exp": now + 600,
    });
    if let (Some(base), Value::Object(extra)) = (claims.as_object_mut(), overrides) {
        base.extend(extra);
    }
    claims
}

/// RS256 token signed by the trusted key.
pub fn mint(overrides: Value) -> String {
    mint_with(Algorithm::RS256, Some(KID), SIGNING_PEM, claims(overrides))
}

pub fn mint_with(alg: Algorithm, kid: Option<&str>, pem: &[u8], claims: Value) -> String {
    let mut header = Header::new(alg);
    header.kid = kid.map(str::to_string);
    let key = EncodingKey::from_rsa_pem(pem).expect("fixture key");
    encode(&header, &claims, &key).expect("sign token")
}

/// Hand-built token with an arbitrary `alg` and a junk signature.
pub fn forge(alg: &str, claims: Value) -> String {
    let header = json!({"alg": alg, "typ": "JWT", "kid": KID});
    format!(
        "{}.{}.{}",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(claims.to_string()),
        URL_SAFE_NO_PAD.encode(b"signature"),
    )
}

/// In-process JWKS endpoint counting how often it is fetched.
pub struct JwksServer {
    addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

impl JwksServer {
    pub async fn spawn(jwks: &'static str) -> Self {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            "/keys",
            get(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    ([("content-type", "application/json")], jwks)
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { addr, hits }
    }

    pub fn url(&self) -> String {
        format!("http://{}/keys", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}
