//! Application State

use std::sync::Arc;

use checkout_payments::{PayPalClient, PayPalConfig};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Credentials as read at startup
    pub config: Arc<PayPalConfig>,

    /// PayPal client (optional - None if credentials are missing)
    pub paypal: Option<Arc<PayPalClient>>,
}

impl AppState {
    pub fn new(config: PayPalConfig, paypal: Option<PayPalClient>) -> Self {
        Self {
            config: Arc::new(config),
            paypal: paypal.map(Arc::new),
        }
    }

    /// Build the client from `config`; a missing credential leaves payments disabled
    pub fn from_config(config: PayPalConfig) -> Self {
        let paypal = PayPalClient::new(&config)
            .inspect_err(|e| tracing::warn!(error = %e, "PayPal client not created"))
            .ok();
        Self::new(config, paypal)
    }
}
