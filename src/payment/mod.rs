//! x402 payment protocol support
//!
//! Implements the v2 wire protocol: the 402 challenge (`PAYMENT-REQUIRED`),
//! inbound payment headers (`Payment-Signature`, `X-Payment` for compat), the
//! facilitator `/verify` + `/settle` flow, and the settlement envelope
//! (`PAYMENT-RESPONSE`). Payment payloads are opaque to this crate; signing
//! and validation are the facilitator's job.

mod assets;
mod client;
mod types;

pub use assets::{asset_address, asset_info, chain_id, AssetInfo};
pub use client::FacilitatorClient;
pub use types::{
    build_payment_requirements, settlement_header, PaymentAccept, PaymentExtra,
    PaymentRequirements, PaymentResource, SettleResponse, VerifyResponse,
};

use thiserror::Error;

/// Errors on the payment path
///
/// None of these surface as 5xx to the end user; every variant is answered
/// with a fresh 402 challenge.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The payment header was not base64-encoded JSON
    #[error("invalid payment header: {0}")]
    Header(String),

    /// The price string could not be converted to atomic units
    #[error("invalid price: {0}")]
    Price(String),

    /// The facilitator could not be reached within the deadline
    #[error("facilitator request failed: {0}")]
    Transport(String),

    /// The facilitator answered with a non-200 status
    #[error("facilitator {endpoint} returned status {status}: {body}")]
    Status {
        /// Which endpoint failed (verify or settle)
        endpoint: &'static str,
        /// HTTP status code returned
        status: u16,
        /// Response body, for the logs
        body: String,
    },

    /// The facilitator response could not be decoded
    #[error("decode facilitator {endpoint} response: {message}")]
    Decode {
        /// Which endpoint failed (verify or settle)
        endpoint: &'static str,
        /// Decode failure detail
        message: String,
    },

    /// The facilitator rejected the payment during verification
    #[error("payment invalid: {0}")]
    Invalid(String),

    /// Verification passed but settlement failed
    #[error("settlement failed: {0}")]
    Settlement(String),
}

/// Convert a human-readable price string to atomic token units.
///
/// `"0.001"` with 6 decimals becomes `"1000"`. The conversion is exact
/// string arithmetic; empty, non-numeric, negative, or excess-precision
/// inputs are rejected.
pub fn human_to_atomic(price: &str, decimals: u32) -> Result<String, PaymentError> {
    if price.is_empty() {
        return Err(PaymentError::Price("empty price".into()));
    }

    let (int_part, frac_part) = match price.split_once('.') {
        Some((i, f)) => (i, f),
        None => (price, ""),
    };

    let all_digits =
        |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if !all_digits(int_part) || !all_digits(frac_part) || (int_part.is_empty() && frac_part.is_empty())
    {
        return Err(PaymentError::Price(format!("invalid price format: {price:?}")));
    }

    let frac = if frac_part.len() > decimals as usize {
        let (keep, excess) = frac_part.split_at(decimals as usize);
        if excess.chars().any(|c| c != '0') {
            return Err(PaymentError::Price(format!(
                "price {price:?} has more decimal places than token supports ({decimals})"
            )));
        }
        keep
    } else {
        frac_part
    };

    let mut atomic = String::with_capacity(int_part.len() + decimals as usize);
    atomic.push_str(int_part);
    atomic.push_str(frac);
    for _ in 0..(decimals as usize - frac.len()) {
        atomic.push('0');
    }

    let trimmed = atomic.trim_start_matches('0');
    Ok(if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    })
}
