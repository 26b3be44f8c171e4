//! Prometheus metrics for the operator
//!
//! A process-global registry exposed as text on the metrics listener.
//! Metrics are observed after a request or reconciliation reaches its
//! terminal state and never influence control flow.

use std::sync::LazyLock;

use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

/// Global metrics registry served on `/metrics`
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Terminal payment status of a gateway request, used as a metric label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    /// Rule was free; proxied without a payment check
    Free,
    /// Conditional rule decided no payment was needed
    ConditionalFree,
    /// Paid path with no payment header; challenged
    PaymentRequired,
    /// Facilitator could not be reached or answered abnormally
    VerificationError,
    /// Facilitator rejected the payment
    PaymentInvalid,
    /// Payment verified and settled; proxied
    PaymentAccepted,
}

impl PaymentStatus {
    /// Convert to label value
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::ConditionalFree => "conditional_free",
            Self::PaymentRequired => "payment_required",
            Self::VerificationError => "verification_error",
            Self::PaymentInvalid => "payment_invalid",
            Self::PaymentAccepted => "payment_accepted",
        }
    }
}

/// Requests processed by the gateway, labelled by terminal state
pub static REQUESTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "x402_requests_total",
            "Total number of requests processed by the x402 gateway",
        ),
        &["path", "namespace", "route_name", "payment_status"],
    )
    .unwrap()
});

/// Duration of facilitator verification calls
pub static PAYMENT_VERIFICATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(HistogramOpts::new(
        "x402_payment_verification_duration_seconds",
        "Duration of payment verification calls to the facilitator",
    ))
    .unwrap()
});

/// Duration of proxied requests, end to end
pub static PROXY_REQUEST_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(HistogramOpts::new(
        "x402_proxy_request_duration_seconds",
        "Duration of proxied requests to backends",
    ))
    .unwrap()
});

/// Number of compiled routes currently published
pub static ACTIVE_ROUTES: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "x402_active_routes",
        "Number of active X402Route resources",
    )
    .unwrap()
});

/// Route store writes (publishes and deletes)
pub static ROUTE_STORE_UPDATES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "x402_route_store_updates_total",
        "Total number of route store updates",
    )
    .unwrap()
});

/// Register all metrics with the global registry; call once at startup
pub fn register_metrics() {
    REGISTRY
        .register(Box::new(REQUESTS_TOTAL.clone()))
        .expect("register x402_requests_total");
    REGISTRY
        .register(Box::new(PAYMENT_VERIFICATION_DURATION.clone()))
        .expect("register x402_payment_verification_duration_seconds");
    REGISTRY
        .register(Box::new(PROXY_REQUEST_DURATION.clone()))
        .expect("register x402_proxy_request_duration_seconds");
    REGISTRY
        .register(Box::new(ACTIVE_ROUTES.clone()))
        .expect("register x402_active_routes");
    REGISTRY
        .register(Box::new(ROUTE_STORE_UPDATES_TOTAL.clone()))
        .expect("register x402_route_store_updates_total");
}

/// Record a gateway request outcome
pub fn record_request(path: &str, namespace: &str, route: &str, status: PaymentStatus) {
    REQUESTS_TOTAL
        .with_label_values(&[path, namespace, route, status.as_str()])
        .inc();
}

/// Render the registry in Prometheus text format
pub fn gather() -> String {
    TextEncoder::new()
        .encode_to_string(&REGISTRY.gather())
        .unwrap_or_default()
}
