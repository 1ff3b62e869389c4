//! # checkout-payments
//!
//! Both ends of the primary order tier.
//!
//! ```text
//! HttpOrderBackend ──/api/create-paypal-order──▶ checkout-server
//!   (widget side)  ──/api/capture-paypal-order─▶    │
//!                                                   │ PayPalClient
//!                                                   ▼
//!                                         Orders v2 REST API
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use checkout_payments::{PayPalClient, PayPalConfig};
//!
//! let client = PayPalClient::new(&PayPalConfig::from_env())?;
//! let order_id = client.create_order(&body, "https://game.example").await?;
//! let payload = client.capture_order(&order_id).await?;
//! ```

mod client;
mod error;
mod paypal;

pub use client::HttpOrderBackend;
pub use error::{PaymentError, Result};
pub use paypal::{PRODUCTION_BASE_URL, PayPalClient, PayPalConfig, SANDBOX_BASE_URL, is_valid_order_id};
