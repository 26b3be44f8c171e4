//! Shared types for the X402Route CRD

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Reference to the Ingress resource a route patches
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IngressReference {
    /// Name of the Ingress resource
    pub name: String,

    /// Namespace of the Ingress. Defaults to the X402Route's namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Global payment defaults for a route
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDefaults {
    /// Wallet address that receives payments
    pub wallet: String,

    /// Blockchain network (e.g. "base", "base-sepolia")
    pub network: String,

    /// Default price for paid routes (e.g. "0.001"); individual rules may
    /// override it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_price: Option<String>,

    /// URL of the x402 facilitator service. Defaults to
    /// `https://x402.org/facilitator`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facilitator_url: Option<String>,
}

/// Payment mode of a single rule
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RouteMode {
    /// Every request must pay
    #[default]
    AllPay,
    /// Payment is decided by header conditions
    Conditional,
}

/// What happens when a condition's pattern matches
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConditionAction {
    /// Require payment
    Pay,
    /// Waive payment
    Free,
}

/// A header condition for conditional payment evaluation
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCondition {
    /// HTTP request header to inspect
    pub header: String,

    /// Regex matched against the header value
    pub pattern: String,

    /// Action taken when the pattern matches
    pub action: ConditionAction,
}

/// A single route rule with pricing and optional conditions
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RouteRule {
    /// URL path pattern: literal segments, `*` for one segment, a trailing
    /// `/**` (or `/*`) for any depth
    pub path: String,

    /// Price override for this path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,

    /// Marks this path as free (no payment required)
    #[serde(default)]
    pub free: bool,

    /// Payment mode, defaults to all-pay
    #[serde(default)]
    pub mode: RouteMode,

    /// Conditions evaluated in order when mode is conditional
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<PaymentCondition>,
}

/// Status of a condition (True, False, Unknown)
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    /// Condition holds
    True,
    /// Condition does not hold
    False,
    /// Condition state cannot be determined
    Unknown,
}

/// An observation of the route's state at a point in time
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition (IngressPatched, Ready, ExternalServiceReady)
    #[serde(rename = "type")]
    pub type_: String,

    /// Status of the condition
    pub status: ConditionStatus,

    /// Machine-readable reason for the transition
    pub reason: String,

    /// Human-readable message
    pub message: String,

    /// Generation of the spec this condition was observed against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Last time the condition transitioned between statuses
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    /// Create a new condition stamped with the current time
    pub fn new(
        type_: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_: type_.into(),
            status,
            reason: reason.into(),
            message: message.into(),
            observed_generation: None,
            last_transition_time: Utc::now(),
        }
    }

    /// Set the observed generation and return self for chaining
    pub fn observed_generation(mut self, generation: Option<i64>) -> Self {
        self.observed_generation = generation;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_mode_wire_names() {
        assert_eq!(
            serde_json::to_string(&RouteMode::AllPay).unwrap(),
            "\"all-pay\""
        );
        assert_eq!(
            serde_json::to_string(&RouteMode::Conditional).unwrap(),
            "\"conditional\""
        );
        let parsed: RouteMode = serde_json::from_str("\"conditional\"").unwrap();
        assert_eq!(parsed, RouteMode::Conditional);
    }

    #[test]
    fn test_mode_defaults_to_all_pay() {
        let rule: RouteRule = serde_json::from_str(r#"{"path": "/api/*"}"#).unwrap();
        assert_eq!(rule.mode, RouteMode::AllPay);
        assert!(!rule.free);
        assert!(rule.conditions.is_empty());
    }

    #[test]
    fn test_condition_action_wire_names() {
        assert_eq!(
            serde_json::to_string(&ConditionAction::Pay).unwrap(),
            "\"pay\""
        );
        assert_eq!(
            serde_json::to_string(&ConditionAction::Free).unwrap(),
            "\"free\""
        );
    }

    #[test]
    fn test_condition_serializes_camel_case() {
        let cond = Condition::new("Ready", ConditionStatus::True, "Reconciled", "ok")
            .observed_generation(Some(3));
        let json = serde_json::to_value(&cond).unwrap();
        assert_eq!(json["type"], "Ready");
        assert_eq!(json["status"], "True");
        assert_eq!(json["observedGeneration"], 3);
        assert!(json.get("lastTransitionTime").is_some());
    }
}
