//! Custom Resource Definitions for the x402 operator
//!
//! The single CRD is [`X402Route`]: a namespaced binding of per-path pricing
//! rules to an existing Ingress.

mod route;
mod types;

pub use route::{X402Route, X402RouteSpec, X402RouteStatus};
pub use types::{
    Condition, ConditionAction, ConditionStatus, IngressReference, PaymentCondition,
    PaymentDefaults, RouteMode, RouteRule,
};
