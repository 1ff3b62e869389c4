//! Data Model
//!
//! Lifecycle statuses, order values and the wire shapes exchanged with the
//! order endpoints.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Provider status string that authorizes success
pub const COMPLETED_STATUS: &str = "COMPLETED";

/// Order description when none is configured
pub const DEFAULT_DESCRIPTION: &str = "Unlock unlimited Tic Tac Toe plays";

/// SDK script lifecycle (one per page)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SdkStatus {
    NotLoaded,
    Loading,
    Ready,
    Failed,
}

/// Widget mount lifecycle (one per popup instance)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RenderStatus {
    NotRendered,
    Rendering,
    Rendered,
    Failed,
}

impl RenderStatus {
    /// A mount is in flight or live
    pub const fn is_occupied(self) -> bool {
        matches!(self, Self::Rendering | Self::Rendered)
    }
}

/// Which screen of the popup is visible
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UiStep {
    Intro,
    Payment,
}

/// Transaction progress
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionPhase {
    Idle,
    CreatingOrder,
    AwaitingCapture,
    Capturing,
    Completed,
    Cancelled,
    Failed,
}

impl TransactionPhase {
    /// Completed, Cancelled and Failed never regress without a reset
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    /// A remote call is in flight
    pub const fn is_busy(self) -> bool {
        matches!(self, Self::CreatingOrder | Self::Capturing)
    }
}

/// What to charge; fixed by configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub amount: Decimal,
    pub currency: String,
    pub description: String,
}

impl OrderRequest {
    pub fn new(amount: Decimal, currency: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into(),
            description: description.into(),
        }
    }

    /// Amount with exactly two fractional digits ("1.00")
    pub fn amount_string(&self) -> String {
        let mut amount = self.amount.round_dp(2);
        amount.rescale(2);
        amount.to_string()
    }

    /// Body for the server-mediated create endpoint
    pub fn to_wire(&self) -> CreateOrderBody {
        CreateOrderBody {
            amount: self.amount_string(),
            currency: self.currency.clone(),
            description: Some(self.description.clone()),
        }
    }

    /// Body for the SDK-direct order API
    pub fn to_sdk_payload(&self) -> Value {
        json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "amount": {
                    "currency_code": self.currency,
                    "value": self.amount_string(),
                },
                "description": self.description,
            }]
        })
    }
}

/// Opaque provider order id
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderHandle {
    pub id: String,
}

impl OrderHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.id
    }
}

impl std::fmt::Display for OrderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Capture outcome at the business level
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureStatus {
    Completed,
    Incomplete,
}

/// Result of a successful capture call
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CaptureResult {
    pub status: CaptureStatus,
    pub raw: Value,
}

impl CaptureResult {
    /// Classify a provider capture payload
    pub fn from_payload(raw: Value) -> Self {
        let status = if raw.get("status").and_then(Value::as_str) == Some(COMPLETED_STATUS) {
            CaptureStatus::Completed
        } else {
            CaptureStatus::Incomplete
        };
        Self { status, raw }
    }

    pub fn is_completed(&self) -> bool {
        self.status == CaptureStatus::Completed
    }

    /// Status string reported by the provider, if any
    pub fn provider_status(&self) -> Option<&str> {
        self.raw.get("status").and_then(Value::as_str)
    }
}

/// `POST` body of the order-create endpoint
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrderBody {
    pub amount: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_currency() -> String {
    "USD".into()
}

/// Success body of the order-create endpoint
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrderResponse {
    #[serde(rename = "orderID")]
    pub order_id: String,
}

/// `POST` body of the order-capture endpoint
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureOrderBody {
    #[serde(rename = "orderID", default)]
    pub order_id: Option<String>,
}

/// Signed-in user as supplied by the session provider
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub email: String,
}
