//! Provider SDK Interface
//!
//! The payment SDK is remote script code this crate does not control. These
//! traits describe the slice of it the widget lifecycle depends on, so the
//! browser binding and the in-process mock are interchangeable.
//!
//! ```text
//!  SdkLoader ──▶ PaymentSdk ──buttons()──▶ Widget ──render()──▶ Container
//!                     ▲                       │
//!                     │ request()             │ invokes
//!                     │ (fallback tier)       ▼
//!              TransactionOrchestrator ◀── WidgetHooks
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SdkFault};
use crate::render::Container;

/// Visual options passed to the widget constructor
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonStyle {
    pub color: String,
    pub shape: String,
    pub label: String,
    pub height: u32,
    pub tagline: bool,
    pub layout: String,
}

impl Default for ButtonStyle {
    fn default() -> Self {
        Self {
            color: "blue".into(),
            shape: "rect".into(),
            label: "pay".into(),
            height: 45,
            tagline: false,
            layout: "vertical".into(),
        }
    }
}

/// A call through the SDK's own order API
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SdkRequest {
    pub url: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<Value>,
}

impl SdkRequest {
    pub fn post(url: impl Into<String>, json: Value) -> Self {
        Self {
            url: url.into(),
            method: "POST".into(),
            json: Some(json),
        }
    }

    pub fn post_empty(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "POST".into(),
            json: None,
        }
    }
}

/// Callbacks the SDK invokes on the widget's behalf
///
/// `create_order` must resolve to the order id value itself; the SDK feeds
/// that id back through `on_approve` once the buyer approves.
#[async_trait]
pub trait WidgetHooks: Send + Sync {
    /// Create an order and return its id
    async fn create_order(&self) -> Result<String>;

    /// Buyer approved the order; capture it
    async fn on_approve(&self, order_id: String) -> Result<()>;

    /// Buyer closed the provider window
    fn on_cancel(&self, details: Value);

    /// SDK detected a fault outside create/capture
    fn on_error(&self, fault: SdkFault);
}

/// A constructed, not yet mounted, widget
#[async_trait]
pub trait Widget: Send + Sync {
    /// Mount into the container; resolves once the widget is on screen
    async fn render(&self, container: Arc<dyn Container>) -> std::result::Result<(), SdkFault>;

    /// Unmount whatever `render` put into the container
    fn close(&self);
}

/// Entry point exposed by a loaded SDK script
#[async_trait]
pub trait PaymentSdk: Send + Sync {
    /// Construct a payment button widget
    fn buttons(
        &self,
        style: &ButtonStyle,
        hooks: Arc<dyn WidgetHooks>,
    ) -> std::result::Result<Box<dyn Widget>, SdkFault>;

    /// SDK-direct order API (used as the fallback tier)
    async fn request(&self, request: SdkRequest) -> std::result::Result<Value, SdkFault>;

    /// SDK name, for logs
    fn name(&self) -> &str {
        "paypal"
    }
}
