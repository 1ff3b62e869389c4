//! Configuration
//!
//! Environment-style settings for the widget: provider credential, the
//! charge, endpoint locations and timing.

use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{Result, WidgetError};
use crate::model::{DEFAULT_DESCRIPTION, OrderRequest};

/// Fragment identifying provider SDK script tags
pub const SDK_SCRIPT_MARKER: &str = "paypal.com/sdk/js";

/// Placeholder shipped in sample env files
pub const PLACEHOLDER_CLIENT_ID: &str = "YOUR_SANDBOX_CLIENT_ID_HERE";

/// Shortest credential accepted
pub const MIN_CLIENT_ID_LEN: usize = 10;

/// Provider environment
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Sandbox,
    Production,
}

impl Environment {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sandbox => "sandbox",
            Self::Production => "production",
        }
    }

    /// Anything other than "production" is treated as sandbox
    pub fn from_tag(tag: &str) -> Self {
        if tag.trim().eq_ignore_ascii_case("production") {
            Self::Production
        } else {
            Self::Sandbox
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the SDK loader needs
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SdkConfig {
    pub client_id: Option<String>,
    pub environment: Environment,
    pub currency: String,
    pub debug: bool,
}

impl SdkConfig {
    pub fn new(client_id: impl Into<String>, environment: Environment) -> Self {
        Self {
            client_id: Some(client_id.into()),
            environment,
            currency: "USD".into(),
            debug: false,
        }
    }

    /// Reject absent, placeholder or too-short credentials
    pub fn validate(&self) -> Result<&str> {
        let id = self.client_id.as_deref().map(str::trim).unwrap_or_default();
        if id.is_empty() {
            return Err(WidgetError::Config("client id not set".into()));
        }
        if id == PLACEHOLDER_CLIENT_ID {
            return Err(WidgetError::Config("client id is the sample placeholder".into()));
        }
        if id.len() < MIN_CLIENT_ID_LEN {
            return Err(WidgetError::Config(format!(
                "client id shorter than {MIN_CLIENT_ID_LEN} characters"
            )));
        }
        Ok(id)
    }

    /// Script URL for a validated credential
    pub fn script_url(&self) -> Result<String> {
        let id = self.validate()?;
        let mut url = format!(
            "https://www.{SDK_SCRIPT_MARKER}?client-id={id}&currency={}&intent=capture&environment={}",
            self.currency, self.environment
        );
        if self.debug {
            url.push_str("&debug=true");
        }
        Ok(url)
    }

    /// First ten characters, for logs
    pub fn masked_client_id(&self) -> String {
        self.client_id.as_deref().map_or_else(
            || "Not set".to_string(),
            |id| format!("{}...", id.chars().take(10).collect::<String>()),
        )
    }
}

/// Where the server-mediated tier lives
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndpointConfig {
    pub create_url: String,
    pub capture_url: String,
}

impl EndpointConfig {
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            create_url: format!("{base}/api/create-paypal-order"),
            capture_url: format!("{base}/api/capture-paypal-order"),
        }
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self::with_base("")
    }
}

/// Complete widget configuration
#[derive(Clone, Debug)]
pub struct WidgetConfig {
    pub sdk: SdkConfig,
    pub order: OrderRequest,
    pub endpoints: EndpointConfig,

    /// Delay before mounting, so the host can attach the container
    pub render_delay: Duration,

    /// Give up on the primary tier after this long; `None` waits forever
    pub primary_timeout: Option<Duration>,

    /// Completed matches before the popup is offered
    pub trial_threshold: u32,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            sdk: SdkConfig {
                client_id: None,
                environment: Environment::Sandbox,
                currency: "USD".into(),
                debug: false,
            },
            order: OrderRequest::new(dec!(1.00), "USD", DEFAULT_DESCRIPTION),
            endpoints: EndpointConfig::default(),
            render_delay: Duration::from_millis(100),
            primary_timeout: None,
            trial_threshold: 1,
        }
    }
}

impl WidgetConfig {
    /// Read from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read through an arbitrary lookup (tests pass a map)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let either = |primary: &str, legacy: &str| lookup(primary).or_else(|| lookup(legacy));

        config.sdk.client_id = either("PAYPAL_CLIENT_ID", "VITE_PAYPAL_CLIENT_ID");
        if let Some(env) = either("PAYPAL_ENVIRONMENT", "VITE_PAYPAL_ENVIRONMENT") {
            config.sdk.environment = Environment::from_tag(&env);
        }
        config.sdk.debug = lookup("PAYPAL_SDK_DEBUG").is_some_and(|v| v == "true" || v == "1");

        if let Some(amount) = lookup("CHECKOUT_AMOUNT") {
            config.order.amount = Decimal::from_str(amount.trim())
                .map_err(|e| WidgetError::Config(format!("CHECKOUT_AMOUNT: {e}")))?;
        }
        if let Some(currency) = lookup("CHECKOUT_CURRENCY") {
            let currency = currency.trim().to_uppercase();
            if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(WidgetError::Config(format!("CHECKOUT_CURRENCY: invalid code {currency}")));
            }
            config.order.currency.clone_from(&currency);
            config.sdk.currency = currency;
        }
        if let Some(description) = lookup("CHECKOUT_DESCRIPTION") {
            config.order.description = description;
        }
        if let Some(base) = lookup("CHECKOUT_API_BASE") {
            config.endpoints = EndpointConfig::with_base(&base);
        }
        if let Some(ms) = lookup("CHECKOUT_PRIMARY_TIMEOUT_MS") {
            let ms: u64 = ms
                .trim()
                .parse()
                .map_err(|_| WidgetError::Config(format!("CHECKOUT_PRIMARY_TIMEOUT_MS: {ms}")))?;
            config.primary_timeout = Some(Duration::from_millis(ms));
        }
        if let Some(threshold) = lookup("CHECKOUT_TRIAL_THRESHOLD") {
            config.trial_threshold = threshold
                .trim()
                .parse()
                .map_err(|_| WidgetError::Config(format!("CHECKOUT_TRIAL_THRESHOLD: {threshold}")))?;
        }

        tracing::debug!(
            client_id = %config.sdk.masked_client_id(),
            environment = %config.sdk.environment,
            amount = %config.order.amount_string(),
            currency = %config.order.currency,
            "Loaded widget configuration"
        );

        Ok(config)
    }
}
