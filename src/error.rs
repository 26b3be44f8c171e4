//! Error types for the x402 operator
//!
//! Reconciliation errors carry enough context to decide whether the
//! controller should retry with backoff or wait for the user to change the
//! spec. Payment-path errors live in [`crate::payment`]; they never cross
//! into reconciliation.

use thiserror::Error;

/// Main error type for operator operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Validation error for X402Route specs (wallet, network, prices, URLs)
    #[error("validation error: {0}")]
    Validation(String),

    /// Rule compilation error (bad regex, unresolvable price)
    #[error("compile error: {0}")]
    Compile(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Internal/operational error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a compile error with the given message
    pub fn compile(msg: impl Into<String>) -> Self {
        Self::Compile(msg.into())
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Check if this error is retryable
    ///
    /// Validation, compile, and serialization failures require a spec change
    /// and are not retried on a timer. Kubernetes errors retry unless the API
    /// rejected the request outright with a 4xx.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube(kube::Error::Api(ae)) => !(400..500).contains(&ae.code) || ae.code == 409,
            Error::Kube(_) => true,
            Error::Validation(_) => false,
            Error::Compile(_) => false,
            Error::Serialization(_) => false,
            Error::Internal(_) => true,
        }
    }
}
