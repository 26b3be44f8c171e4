//! X402Route Custom Resource Definition
//!
//! An X402Route binds an ordered list of per-path pricing rules to a single
//! named Ingress. The reconciler compiles the rules, publishes them to the
//! route store, and rewrites the Ingress so paid paths resolve to the
//! gateway.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{Condition, IngressReference, PaymentDefaults, RouteRule};

/// Specification for an X402Route
///
/// The referenced Ingress must already exist; its original backends are
/// snapshotted into an annotation before the first patch so deletion can
/// restore them.
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "x402.io",
    version = "v1alpha1",
    kind = "X402Route",
    plural = "x402routes",
    shortname = "x4r",
    status = "X402RouteStatus",
    namespaced,
    printcolumn = r#"{"name":"Ingress Patched","type":"boolean","jsonPath":".status.ingressPatched"}"#,
    printcolumn = r#"{"name":"Ready","type":"boolean","jsonPath":".status.ready"}"#,
    printcolumn = r#"{"name":"Active Routes","type":"integer","jsonPath":".status.activeRoutes"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct X402RouteSpec {
    /// The existing Ingress to patch with payment gating
    pub ingress_ref: IngressReference,

    /// Global payment defaults for this route
    pub payment: PaymentDefaults,

    /// Ordered per-path pricing rules; first match wins
    pub routes: Vec<RouteRule>,
}

impl X402RouteSpec {
    /// Resolve the Ingress namespace, defaulting to the route's own
    pub fn ingress_namespace<'a>(&'a self, route_namespace: &'a str) -> &'a str {
        self.ingress_ref
            .namespace
            .as_deref()
            .filter(|ns| !ns.is_empty())
            .unwrap_or(route_namespace)
    }

    /// Structural validation of the spec
    ///
    /// Price formats, condition regexes, and the facilitator URL are checked
    /// during compilation; this catches the mistakes that need no context.
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.ingress_ref.name.is_empty() {
            return Err(crate::Error::validation("ingressRef.name must be set"));
        }
        if self.payment.wallet.is_empty() {
            return Err(crate::Error::validation("payment.wallet must be set"));
        }
        if self.payment.network.is_empty() {
            return Err(crate::Error::validation("payment.network must be set"));
        }
        for rule in &self.routes {
            if rule.path.is_empty() {
                return Err(crate::Error::validation("route rule path must be set"));
            }
            if !rule.free && rule.price.is_none() && self.payment.default_price.is_none() {
                return Err(crate::Error::validation(format!(
                    "paid route {:?} has no price and no defaultPrice",
                    rule.path
                )));
            }
        }
        Ok(())
    }
}

/// Observed state of an X402Route
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct X402RouteStatus {
    /// Whether the referenced Ingress has been patched
    #[serde(default)]
    pub ingress_patched: bool,

    /// Whether the route is fully configured and serving
    #[serde(default)]
    pub ready: bool,

    /// Number of active route rules
    #[serde(default)]
    pub active_routes: i32,

    /// Latest observations of the route's state
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl X402RouteStatus {
    /// Set or replace a condition of the same type
    ///
    /// The transition timestamp is preserved when the status value does not
    /// change, so repeated reconciliations of an unchanged spec do not churn
    /// the status subresource.
    pub fn set_condition(&mut self, condition: Condition) {
        if let Some(existing) = self
            .conditions
            .iter_mut()
            .find(|c| c.type_ == condition.type_)
        {
            let last_transition_time = if existing.status == condition.status {
                existing.last_transition_time
            } else {
                condition.last_transition_time
            };
            *existing = Condition {
                last_transition_time,
                ..condition
            };
        } else {
            self.conditions.push(condition);
        }
    }
}
