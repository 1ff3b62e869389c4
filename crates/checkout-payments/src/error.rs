//! Payment Error Types

use serde_json::Value;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Provider-side errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// PayPal answered with a non-2xx status
    #[error("PayPal API error ({status}): {details}")]
    Provider { status: u16, details: Value },

    /// Request failed before a usable response arrived
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body had an unexpected shape
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Credentials missing
    #[error("Configuration error: {0}")]
    Config(String),

    /// OAuth exchange did not yield a token
    #[error("Access token unavailable: {0}")]
    TokenUnavailable(String),

    /// Order id is not a provider order id; never sent upstream
    #[error("Invalid order ID: {0:?}")]
    InvalidOrderId(String),
}

impl PaymentError {
    /// Check if this error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Http(_) | Self::TokenUnavailable(_))
    }

    /// Get user-friendly message
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::Provider { .. } => "PayPal rejected the request.",
            Self::Config(_) => "PayPal credentials not configured",
            Self::InvalidOrderId(_) => "Invalid order ID",
            _ => "Internal server error",
        }
    }
}
