//! Error Types

use std::time::Duration;

use thiserror::Error;

/// Result type alias for widget lifecycle operations
pub type Result<T> = std::result::Result<T, WidgetError>;

/// Errors surfaced to the popup
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WidgetError {
    /// Credential missing or malformed; checked before any network activity
    #[error("Configuration error: {0}")]
    Config(String),

    /// SDK script failed to load or its entry point never appeared
    #[error("SDK load error: {0}")]
    SdkLoad(String),

    /// Widget construction or mount failed
    #[error("Render error: {0}")]
    Render(String),

    /// Both order creation tiers failed
    #[error("Order creation failed: {0}")]
    OrderCreation(String),

    /// Both capture tiers failed
    #[error("Capture failed: {0}")]
    Capture(String),

    /// A transaction is already creating or capturing
    #[error("Transaction busy: {0}")]
    Busy(String),

    /// Operation not valid in the current transaction phase
    #[error("Invalid transaction phase: {0}")]
    InvalidPhase(String),
}

impl WidgetError {
    /// Check if the user can recover from this error with "try again"
    pub const fn is_retryable(&self) -> bool {
        !matches!(self, Self::Config(_))
    }

    /// Get user-friendly message
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::Config(_) => {
                "PayPal Client ID not properly configured. Please check your environment variables."
            }
            Self::SdkLoad(_) => {
                "Failed to load PayPal SDK. Please check your internet connection and try again."
            }
            Self::Render(_) => "Failed to load payment options. Please try again.",
            Self::OrderCreation(_) => "Could not start the payment. Please try again.",
            Self::Capture(_) => "Payment capture failed. Please try again.",
            Self::Busy(_) | Self::InvalidPhase(_) => "A payment is already in progress.",
        }
    }
}

/// Why a single resolution tier (primary or fallback) failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TierError {
    /// Endpoint answered with a non-2xx status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Request never produced a response
    #[error("Transport error: {0}")]
    Transport(String),

    /// Response body did not have the expected shape
    #[error("Decode error: {0}")]
    Decode(String),

    /// Primary tier exceeded the configured timeout
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// SDK-direct call rejected
    #[error("SDK error: {0}")]
    Sdk(String),
}

/// Fault raised by the provider SDK
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct SdkFault {
    pub message: String,
}

impl SdkFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl From<SdkFault> for TierError {
    fn from(fault: SdkFault) -> Self {
        Self::Sdk(fault.message)
    }
}
