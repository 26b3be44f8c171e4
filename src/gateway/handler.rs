//! Gateway request pipeline
//!
//! Every request reaches exactly one terminal state: proxied (free,
//! conditionally free, or paid), challenged with a 402, 404 when no route
//! matches, or 502 when the backend cannot be resolved.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tracing::{error, info, warn};

use super::{conditions, proxy};
use crate::crd::RouteMode;
use crate::matcher::match_path;
use crate::metrics::{self, PaymentStatus};
use crate::payment::{
    build_payment_requirements, settlement_header, FacilitatorClient, PaymentError,
    PaymentRequirements,
};
use crate::store::{CompiledRoute, CompiledRule, RouteStore};

/// Shared state for gateway request handlers
pub struct GatewayState {
    /// Compiled routes published by the reconciler
    pub store: Arc<RouteStore>,
    /// Facilitator client with its own 10 s deadline
    pub facilitator: FacilitatorClient,
    /// HTTP client used for backend proxying
    pub upstream: reqwest::Client,
}

impl GatewayState {
    /// Create gateway state backed by the given route store
    pub fn new(store: Arc<RouteStore>) -> Self {
        Self {
            store,
            facilitator: FacilitatorClient::new(),
            upstream: reqwest::Client::new(),
        }
    }
}

/// Entry point for all gateway traffic except `/healthz`
pub async fn handle(State(state): State<Arc<GatewayState>>, req: Request) -> Response {
    let start = Instant::now();
    let path = req.uri().path().to_string();

    let Some((route, rule_index)) = find_route(&state.store, &path) else {
        info!(path, "no matching route");
        return (
            StatusCode::NOT_FOUND,
            "no x402 route configured for this path",
        )
            .into_response();
    };
    let rule = &route.rules[rule_index];

    // Free path: forward directly.
    if rule.free {
        info!(path, route = %route.name, "free path, forwarding");
        metrics::record_request(&path, &route.namespace, &route.name, PaymentStatus::Free);
        let response = proxy::forward(&state.upstream, req, &route, &path, None).await;
        metrics::PROXY_REQUEST_DURATION.observe(start.elapsed().as_secs_f64());
        return response;
    }

    // Conditional mode may waive the payment for this particular request.
    if rule.mode == RouteMode::Conditional
        && !rule.conditions.is_empty()
        && !conditions::payment_required(req.headers(), &rule.conditions)
    {
        info!(path, route = %route.name, "conditional: no payment needed");
        metrics::record_request(
            &path,
            &route.namespace,
            &route.name,
            PaymentStatus::ConditionalFree,
        );
        let response = proxy::forward(&state.upstream, req, &route, &path, None).await;
        metrics::PROXY_REQUEST_DURATION.observe(start.elapsed().as_secs_f64());
        return response;
    }

    // Paid branch. Compilation guarantees every non-free rule has a price.
    let price = rule.price.clone().unwrap_or_default();
    let resource_url = req.uri().to_string();
    let requirements = match build_payment_requirements(&resource_url, &route, &price) {
        Ok(reqs) => reqs,
        Err(e) => {
            error!(path, route = %route.name, error = %e, "failed to build payment requirements");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to build payment requirements",
            )
                .into_response();
        }
    };

    let Some(payment_header) = payment_header(req.headers()) else {
        info!(path, route = %route.name, "paid path, no payment header");
        metrics::record_request(
            &path,
            &route.namespace,
            &route.name,
            PaymentStatus::PaymentRequired,
        );
        return payment_required_response(&requirements);
    };

    let verify_start = Instant::now();
    let settled = state
        .facilitator
        .verify_and_settle(&payment_header, &requirements, &route.facilitator_url)
        .await;
    metrics::PAYMENT_VERIFICATION_DURATION.observe(verify_start.elapsed().as_secs_f64());

    match settled {
        Ok(settle) => {
            info!(path, route = %route.name, "payment verified, forwarding");
            metrics::record_request(
                &path,
                &route.namespace,
                &route.name,
                PaymentStatus::PaymentAccepted,
            );
            let envelope = settlement_header(&settle);
            let response = proxy::forward(&state.upstream, req, &route, &path, Some(envelope)).await;
            metrics::PROXY_REQUEST_DURATION.observe(start.elapsed().as_secs_f64());
            response
        }
        Err(e) => {
            let status = match &e {
                PaymentError::Invalid(_) | PaymentError::Settlement(_) => {
                    PaymentStatus::PaymentInvalid
                }
                _ => PaymentStatus::VerificationError,
            };
            warn!(path, route = %route.name, error = %e, "payment rejected");
            metrics::record_request(&path, &route.namespace, &route.name, status);
            payment_required_response(&requirements)
        }
    }
}

/// Find the first route in the snapshot with a rule matching the path.
///
/// Rules are checked in their declared order; between routes the snapshot
/// order is unspecified and the first hit wins.
fn find_route(store: &RouteStore, path: &str) -> Option<(Arc<CompiledRoute>, usize)> {
    for route in store.snapshot() {
        if let Some(index) = find_matching_rule(&route.rules, path) {
            return Some((route, index));
        }
    }
    None
}

fn find_matching_rule(rules: &[CompiledRule], path: &str) -> Option<usize> {
    rules.iter().position(|rule| match_path(&rule.path, path))
}

/// Extract the inbound payment header: `Payment-Signature` preferred,
/// `X-Payment` for compat.
fn payment_header(headers: &HeaderMap) -> Option<String> {
    for name in ["payment-signature", "x-payment"] {
        if let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) {
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

/// Write the 402 challenge: JSON body plus the same bytes base64-encoded in
/// the `PAYMENT-REQUIRED` header.
fn payment_required_response(requirements: &PaymentRequirements) -> Response {
    let json = match serde_json::to_vec(requirements) {
        Ok(json) => json,
        Err(e) => {
            error!(error = %e, "failed to marshal payment requirements");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to marshal payment requirements",
            )
                .into_response();
        }
    };

    Response::builder()
        .status(StatusCode::PAYMENT_REQUIRED)
        .header(header::CONTENT_TYPE, "application/json")
        .header("payment-required", BASE64.encode(&json))
        .body(Body::from(json))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
