//! HTTP client for the facilitator's `/verify` and `/settle` endpoints

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Serialize;
use serde_json::value::RawValue;
use tracing::debug;

use super::types::{PaymentAccept, PaymentRequirements, SettleResponse, VerifyResponse};
use super::PaymentError;

/// Deadline applied to each facilitator call, independent of the inbound
/// request.
const FACILITATOR_TIMEOUT: Duration = Duration::from_secs(10);

/// Request body shared by `/verify` and `/settle`
///
/// The payment payload is forwarded byte-for-byte: the facilitator verifies a
/// signature over it, so re-encoding could invalidate a good payment.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FacilitatorRequest<'a> {
    payment_payload: &'a RawValue,
    payment_requirements: &'a PaymentAccept,
}

/// Client for a two-endpoint x402 facilitator
#[derive(Clone)]
pub struct FacilitatorClient {
    http: reqwest::Client,
}

impl Default for FacilitatorClient {
    fn default() -> Self {
        Self::new()
    }
}

impl FacilitatorClient {
    /// Create a new facilitator client
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// Decode the payment header, verify the payment, and settle it.
    ///
    /// No retries at any step: a transport failure, an invalid payment, or a
    /// failed settlement all bubble up for the gateway to answer with a
    /// fresh 402. The client retries by re-issuing the request with a new
    /// signature.
    pub async fn verify_and_settle(
        &self,
        payment_header: &str,
        requirements: &PaymentRequirements,
        facilitator_url: &str,
    ) -> Result<SettleResponse, PaymentError> {
        let payload_bytes = BASE64
            .decode(payment_header)
            .map_err(|e| PaymentError::Header(format!("base64 decode: {e}")))?;
        let payload_str = String::from_utf8(payload_bytes)
            .map_err(|_| PaymentError::Header("payload is not UTF-8".to_string()))?;
        let payload = RawValue::from_string(payload_str)
            .map_err(|_| PaymentError::Header("payload is not valid JSON".to_string()))?;

        let accept = requirements
            .accepts
            .first()
            .ok_or_else(|| PaymentError::Invalid("no payment accepts in requirements".into()))?;

        let body = FacilitatorRequest {
            payment_payload: &payload,
            payment_requirements: accept,
        };

        let base_url = facilitator_url.trim_end_matches('/');

        let verify: VerifyResponse = self.post(&format!("{base_url}/verify"), &body, "verify").await?;
        if !verify.is_valid {
            let reason = verify
                .invalid_reason
                .unwrap_or_else(|| "payment not valid".to_string());
            return Err(PaymentError::Invalid(reason));
        }
        debug!(payer = ?verify.payer, "payment verified");

        let settle: SettleResponse = self.post(&format!("{base_url}/settle"), &body, "settle").await?;
        if !settle.success {
            let reason = settle
                .error_reason
                .unwrap_or_else(|| "settlement failed".to_string());
            return Err(PaymentError::Settlement(reason));
        }
        debug!(transaction = ?settle.transaction, "payment settled");

        Ok(settle)
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        body: &FacilitatorRequest<'_>,
        endpoint: &'static str,
    ) -> Result<T, PaymentError> {
        let response = self
            .http
            .post(url)
            .timeout(FACILITATOR_TIMEOUT)
            .json(body)
            .send()
            .await
            .map_err(|e| PaymentError::Transport(format!("POST {url}: {e}")))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(PaymentError::Status {
                endpoint,
                status: status.as_u16(),
                body,
            });
        }

        response.json().await.map_err(|e| PaymentError::Decode {
            endpoint,
            message: e.to_string(),
        })
    }
}
