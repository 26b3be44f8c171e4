//! Reverse proxy to original backends
//!
//! Forwards a request to the backend recorded on the compiled route,
//! preserving method, headers, body, and upstream status. Only hop-by-hop
//! headers and the inbound payment headers are stripped.

use std::collections::HashMap;
use std::time::Duration;

use axum::body::Body;
use axum::extract::Request;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::error;

use crate::matcher::match_path;
use crate::store::CompiledRoute;

/// Deadline for a single upstream call
const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Largest request body the gateway will buffer for forwarding
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Header carrying the settlement envelope on successful paid responses
pub const PAYMENT_RESPONSE_HEADER: &str = "payment-response";

/// Headers never forwarded upstream: hop-by-hop headers plus the inbound
/// payment headers, which are consumed here.
const REQUEST_HEADERS_TO_STRIP: &[&str] = &[
    "host",
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "upgrade",
    "te",
    "trailer",
    "content-length",
    "payment-signature",
    "x-payment",
];

/// Headers never copied back from the upstream response; the HTTP layer
/// recomputes framing itself.
const RESPONSE_HEADERS_TO_STRIP: &[&str] =
    &["connection", "keep-alive", "transfer-encoding", "content-length"];

/// Find the best matching backend URL for a path: exact key first, then the
/// first key whose pattern matches, then any backend at all (the
/// single-backend common case).
pub fn find_backend<'a>(backends: &'a HashMap<String, String>, path: &str) -> Option<&'a str> {
    if let Some(url) = backends.get(path) {
        return Some(url);
    }
    if let Some(url) = backends
        .iter()
        .find(|(pattern, _)| match_path(pattern, path))
        .map(|(_, url)| url)
    {
        return Some(url);
    }
    backends.values().next().map(String::as_str)
}

/// Forward the request to the route's backend for `path`.
///
/// When `settlement` is set it is attached as the `PAYMENT-RESPONSE` header
/// before any body bytes are written, so paying clients always receive their
/// envelope even if the body transfer fails midway.
pub async fn forward(
    client: &reqwest::Client,
    req: Request,
    route: &CompiledRoute,
    path: &str,
    settlement: Option<String>,
) -> Response {
    let Some(backend_url) = find_backend(&route.backends, path) else {
        error!(path, route = %route.name, "no backend found for path");
        return (StatusCode::BAD_GATEWAY, "no backend configured").into_response();
    };

    let method = match reqwest::Method::from_bytes(req.method().as_str().as_bytes()) {
        Ok(m) => m,
        Err(_) => return (StatusCode::BAD_GATEWAY, "unsupported method").into_response(),
    };

    let path_and_query = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or(path);
    let target = format!("{}{}", backend_url.trim_end_matches('/'), path_and_query);

    let mut builder = client.request(method, &target).timeout(UPSTREAM_TIMEOUT);
    for (name, value) in req.headers() {
        if REQUEST_HEADERS_TO_STRIP.contains(&name.as_str()) {
            continue;
        }
        if let Ok(value) = value.to_str() {
            builder = builder.header(name.as_str(), value);
        }
    }

    let body = match axum::body::to_bytes(req.into_body(), MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(_) => return (StatusCode::PAYLOAD_TOO_LARGE, "request body too large").into_response(),
    };
    if !body.is_empty() {
        builder = builder.body(body.to_vec());
    }

    let upstream = match builder.send().await {
        Ok(resp) => resp,
        Err(e) => {
            error!(target, route = %route.name, error = %e, "proxy request failed");
            return (StatusCode::BAD_GATEWAY, "upstream request failed").into_response();
        }
    };

    let status = StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let headers = upstream.headers().clone();
    let body = match upstream.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(target, error = %e, "failed to read upstream response body");
            return (StatusCode::BAD_GATEWAY, "failed to read upstream response").into_response();
        }
    };

    let mut response = Response::builder().status(status);
    if let Some(response_headers) = response.headers_mut() {
        for (name, value) in headers.iter() {
            if RESPONSE_HEADERS_TO_STRIP.contains(&name.as_str()) {
                continue;
            }
            if let (Ok(name), Ok(value)) = (
                HeaderName::try_from(name.as_str()),
                HeaderValue::from_bytes(value.as_bytes()),
            ) {
                response_headers.insert(name, value);
            }
        }
        if let Some(envelope) = settlement {
            if let Ok(value) = HeaderValue::from_str(&envelope) {
                response_headers
                    .insert(HeaderName::from_static(PAYMENT_RESPONSE_HEADER), value);
            }
        }
    }

    response
        .body(Body::from(body))
        .unwrap_or_else(|_| StatusCode::BAD_GATEWAY.into_response())
}
