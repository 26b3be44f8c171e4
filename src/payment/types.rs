//! x402 v2 wire types
//!
//! The challenge (`PaymentRequirements`) is carried both in the 402 body and,
//! base64-encoded, in the `PAYMENT-REQUIRED` header; the two must be
//! byte-identical, so callers serialize once and reuse the bytes.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::{assets, human_to_atomic, PaymentError};
use crate::store::CompiledRoute;

/// The resource a payment is demanded for
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResource {
    /// URL of the resource being paid for
    pub url: String,
    /// Human-readable description
    pub description: String,
    /// MIME type of the resource, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// Asset metadata carried in the `extra` block of an accept entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentExtra {
    /// Asset name (e.g. "USDC")
    pub name: String,
    /// EIP-712 domain version
    pub version: String,
}

/// A single accepted payment method
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentAccept {
    /// Payment scheme, always "exact"
    pub scheme: String,
    /// Chain identifier
    pub network: String,
    /// Amount in atomic units
    pub amount: String,
    /// Receiving wallet address
    pub pay_to: String,
    /// Seconds the client has to settle
    pub max_timeout_seconds: u64,
    /// Asset contract address
    pub asset: String,
    /// Asset metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<PaymentExtra>,
}

/// The full 402 challenge: response body and `PAYMENT-REQUIRED` header
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    /// Protocol version, always 2
    pub x402_version: u32,
    /// The resource being paid for
    pub resource: PaymentResource,
    /// Accepted payment methods; this implementation emits exactly one
    pub accepts: Vec<PaymentAccept>,
    /// Optional error detail on re-challenges
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response from the facilitator's `/verify` endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    /// Whether the payment payload is valid
    pub is_valid: bool,
    /// Reason the payload was rejected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid_reason: Option<String>,
    /// Paying wallet address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
}

/// Response from the facilitator's `/settle` endpoint; also the settlement
/// envelope carried in `PAYMENT-RESPONSE`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SettleResponse {
    /// Whether settlement succeeded
    pub success: bool,
    /// Reason settlement failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
    /// Paying wallet address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
    /// Settlement transaction hash
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
    /// Network the settlement landed on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
}

/// Build the challenge for a request against a route at the given price.
///
/// Resolves the chain identifier and asset from the route's network and
/// converts the human price to atomic units; a price that does not divide
/// into whole atomic units is rejected here, before anything hits the wire.
pub fn build_payment_requirements(
    resource_url: &str,
    route: &CompiledRoute,
    price: &str,
) -> Result<PaymentRequirements, PaymentError> {
    let chain_id = assets::chain_id(&route.network);
    let info = assets::asset_info(chain_id);
    let amount = human_to_atomic(price, info.decimals)?;

    Ok(PaymentRequirements {
        x402_version: 2,
        resource: PaymentResource {
            url: resource_url.to_string(),
            description: "Payment required to access this resource".to_string(),
            mime_type: None,
        },
        accepts: vec![PaymentAccept {
            scheme: "exact".to_string(),
            network: chain_id.to_string(),
            amount,
            pay_to: route.wallet.clone(),
            max_timeout_seconds: 300,
            asset: assets::asset_address(&route.network).to_string(),
            extra: Some(PaymentExtra {
                name: info.name.to_string(),
                version: info.version.to_string(),
            }),
        }],
        error: None,
    })
}

/// Encode the settlement envelope for the `PAYMENT-RESPONSE` header
pub fn settlement_header(settle: &SettleResponse) -> String {
    // Serialization of this struct cannot fail.
    let json = serde_json::to_vec(settle).expect("settle response serializes");
    BASE64.encode(json)
}
