//! x402-operator - payment gating for Kubernetes Ingress resources
//!
//! The operator watches `X402Route` custom resources. Each route binds
//! per-path pricing rules to an existing Ingress: the reconciler compiles the
//! rules into an in-memory route store, rewrites the Ingress so that paid
//! paths resolve to the operator's gateway service, and the gateway then
//! demands, verifies, and settles x402 payments before proxying requests to
//! the original backend.
//!
//! # Architecture
//!
//! Two long-lived activities share the process:
//! - The reconciler (one reconciliation per `X402Route` event, serialised per
//!   key by `kube::runtime::Controller`)
//! - The gateway HTTP server (one task per request)
//!
//! They communicate only through the [`store::RouteStore`]; neither holds a
//! handle to the other.
//!
//! # Modules
//!
//! - [`crd`] - X402Route Custom Resource Definition
//! - [`controller`] - reconciliation logic (compile, patch, restore)
//! - [`gateway`] - gateway HTTP server and request pipeline
//! - [`payment`] - x402 payment protocol client (challenge, verify, settle)
//! - [`matcher`] - path pattern matching
//! - [`store`] - shared compiled-route store
//! - [`leader`] - Lease-based leader election
//! - [`metrics`] - Prometheus metrics registry
//! - [`error`] - error types for the operator

#![deny(missing_docs)]

pub mod controller;
pub mod crd;
pub mod error;
pub mod gateway;
pub mod leader;
pub mod matcher;
pub mod metrics;
pub mod payment;
pub mod store;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Default Configuration Constants
// =============================================================================
// Centralised so the CRD defaults, the reconciler, and test fixtures agree.

/// Port the gateway listens on and the port patched into Ingress backends
pub const GATEWAY_PORT: i32 = 8402;

/// Finalizer placed on every reconciled X402Route
pub const FINALIZER: &str = "x402.io/finalizer";

/// Name of the ExternalName alias Service created in foreign namespaces
pub const EXTERNAL_SERVICE_NAME: &str = "x402-gateway-proxy";

/// Ingress annotation holding the pre-patch backends as JSON `{path: "svc:port"}`
pub const ANNOTATION_ORIGINAL_BACKENDS: &str = "x402.io/original-backends";

/// Ingress annotation marking the object as managed by this operator
pub const ANNOTATION_MANAGED_BY: &str = "x402.io/managed-by";

/// Value written to the managed-by annotation
pub const MANAGED_BY_VALUE: &str = "x402-operator";

/// Facilitator used when a route does not name one
pub const DEFAULT_FACILITATOR_URL: &str = "https://x402.org/facilitator";
