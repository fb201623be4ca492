// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request and correlation identifiers.
//!
//! `x-request-id` is assigned by `tower_http::request_id` at the edge of the
//! router. `x-correlation-id` is taken from the caller when present and
//! otherwise defaults to the request id. Both are echoed on the response.

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");
pub const CORRELATION_ID_HEADER: HeaderName = HeaderName::from_static("x-correlation-id");

/// Identifiers of the current request, as found on its headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestIds {
    pub request_id: Option<String>,
    pub correlation_id: Option<String>,
}

impl RequestIds {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            request_id: header_str(headers, &REQUEST_ID_HEADER),
            correlation_id: header_str(headers, &CORRELATION_ID_HEADER),
        }
    }
}

fn header_str(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Ensure every request carries a correlation id and echo it back.
///
/// Must run inside the layer that sets `x-request-id`.
pub async fn correlation_id(mut request: Request, next: Next) -> Response {
    let correlation: Option<HeaderValue> = request
        .headers()
        .get(&CORRELATION_ID_HEADER)
        .filter(|v| !v.is_empty())
        .or_else(|| request.headers().get(&REQUEST_ID_HEADER))
        .cloned();

    if let Some(value) = &correlation {
        request
            .headers_mut()
            .insert(CORRELATION_ID_HEADER, value.clone());
    }

    let mut response = next.run(request).await;
    if let Some(value) = correlation {
        response.headers_mut().insert(CORRELATION_ID_HEADER, value);
    }
    response
}
