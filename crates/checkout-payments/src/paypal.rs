//! PayPal REST Client
//!
//! Server-side half of the primary tier: exchanges the client credentials
//! for an access token, then creates and captures orders against the
//! Orders v2 API.

use checkout_core::{CreateOrderBody, DEFAULT_DESCRIPTION, Environment};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PaymentError, Result};

pub const PRODUCTION_BASE_URL: &str = "https://api.paypal.com";
pub const SANDBOX_BASE_URL: &str = "https://api.sandbox.paypal.com";

/// Characters of the client id shown in diagnostics
const PREVIEW_LEN: usize = 10;

/// Longest order id accepted for capture
const MAX_ORDER_ID_LEN: usize = 64;

/// Provider order ids are short alphanumeric tokens, optionally dashed
///
/// Anything else is refused before it is spliced into a request path.
pub fn is_valid_order_id(order_id: &str) -> bool {
    !order_id.is_empty()
        && order_id.len() <= MAX_ORDER_ID_LEN
        && order_id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

/// Server-side provider credentials
#[derive(Clone, Debug, Default)]
pub struct PayPalConfig {
    pub client_id: Option<String>,
    pub secret: Option<String>,
    pub environment: Environment,
}

impl PayPalConfig {
    /// Create from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let either = |primary: &str, legacy: &str| {
            lookup(primary)
                .or_else(|| lookup(legacy))
                .filter(|v| !v.is_empty())
        };
        Self {
            client_id: either("PAYPAL_CLIENT_ID", "VITE_PAYPAL_CLIENT_ID"),
            secret: either("PAYPAL_SECRET", "VITE_PAYPAL_SECRET"),
            environment: either("PAYPAL_ENVIRONMENT", "VITE_PAYPAL_ENVIRONMENT")
                .map(|env| Environment::from_tag(&env))
                .unwrap_or_default(),
        }
    }

    pub const fn is_configured(&self) -> bool {
        self.client_id.is_some() && self.secret.is_some()
    }

    pub const fn base_url(&self) -> &'static str {
        match self.environment {
            Environment::Production => PRODUCTION_BASE_URL,
            Environment::Sandbox => SANDBOX_BASE_URL,
        }
    }

    /// First characters of the client id, or "Not set"
    pub fn client_id_preview(&self) -> String {
        self.client_id.as_deref().map_or_else(
            || "Not set".to_string(),
            |id| format!("{}...", id.chars().take(PREVIEW_LEN).collect::<String>()),
        )
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

#[derive(Deserialize)]
struct CreatedOrder {
    id: String,
}

#[derive(Serialize)]
struct OrderPayload<'a> {
    intent: &'static str,
    purchase_units: [PurchaseUnit<'a>; 1],
    application_context: ApplicationContext,
}

#[derive(Serialize)]
struct PurchaseUnit<'a> {
    amount: Amount<'a>,
    description: &'a str,
}

#[derive(Serialize)]
struct Amount<'a> {
    currency_code: &'a str,
    value: &'a str,
}

#[derive(Serialize)]
struct ApplicationContext {
    return_url: String,
    cancel_url: String,
    shipping_preference: &'static str,
    user_action: &'static str,
}

/// Authenticated Orders v2 client
#[derive(Clone)]
pub struct PayPalClient {
    http: Client,
    base_url: String,
    client_id: String,
    secret: String,
}

impl std::fmt::Debug for PayPalClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayPalClient")
            .field("base_url", &self.base_url)
            .field("client_id", &format!("{}...", self.client_id.chars().take(PREVIEW_LEN).collect::<String>()))
            .finish_non_exhaustive()
    }
}

impl PayPalClient {
    /// Fails with `Config` when either credential is missing
    pub fn new(config: &PayPalConfig) -> Result<Self> {
        let (Some(client_id), Some(secret)) = (config.client_id.clone(), config.secret.clone()) else {
            return Err(PaymentError::Config("PayPal credentials not configured".into()));
        };
        Ok(Self {
            http: Client::new(),
            base_url: config.base_url().to_string(),
            client_id,
            secret,
        })
    }

    /// Point at another API host (tests use a local mock server)
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Client-credentials grant
    pub async fn access_token(&self) -> Result<String> {
        let response = self
            .http
            .post(format!("{}/v1/oauth2/token", self.base_url))
            .basic_auth(&self.client_id, Some(&self.secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), "PayPal token request rejected");
            return Err(PaymentError::TokenUnavailable(format!("HTTP {status}: {body}")));
        }

        let token: TokenResponse = response.json().await?;
        token
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| PaymentError::TokenUnavailable("response carried no access_token".into()))
    }

    /// Create a `CAPTURE` order; returns the provider order id
    ///
    /// `origin` is the caller's page origin, used for the return and cancel URLs.
    pub async fn create_order(&self, body: &CreateOrderBody, origin: &str) -> Result<String> {
        let token = self.access_token().await?;
        let description = body.description.as_deref().unwrap_or(DEFAULT_DESCRIPTION);
        let payload = OrderPayload {
            intent: "CAPTURE",
            purchase_units: [PurchaseUnit {
                amount: Amount {
                    currency_code: &body.currency,
                    value: &body.amount,
                },
                description,
            }],
            application_context: ApplicationContext {
                return_url: format!("{origin}/success"),
                cancel_url: format!("{origin}/cancel"),
                shipping_preference: "NO_SHIPPING",
                user_action: "PAY_NOW",
            },
        };

        let response = self
            .http
            .post(format!("{}/v2/checkout/orders", self.base_url))
            .bearer_auth(&token)
            .header("PayPal-Request-Id", uuid::Uuid::new_v4().to_string())
            .json(&payload)
            .send()
            .await?;

        let value = Self::read(response).await?;
        let order: CreatedOrder = serde_json::from_value(value)?;
        tracing::info!(order_id = %order.id, amount = %body.amount, currency = %body.currency, "PayPal order created");
        Ok(order.id)
    }

    /// Capture an approved order; returns the provider payload untouched
    pub async fn capture_order(&self, order_id: &str) -> Result<Value> {
        if !is_valid_order_id(order_id) {
            tracing::warn!(order_id = %order_id, "Refusing to capture malformed order id");
            return Err(PaymentError::InvalidOrderId(order_id.to_string()));
        }
        let token = self.access_token().await?;
        let response = self
            .http
            .post(format!("{}/v2/checkout/orders/{order_id}/capture", self.base_url))
            .bearer_auth(&token)
            .header("Content-Type", "application/json")
            .send()
            .await?;

        let value = Self::read(response).await?;
        tracing::info!(
            order_id = %order_id,
            status = value.get("status").and_then(serde_json::Value::as_str).unwrap_or("unknown"),
            "PayPal order captured"
        );
        Ok(value)
    }

    async fn read(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let details: Value = response.json().await?;
        if status.is_success() {
            Ok(details)
        } else {
            tracing::error!(status = status.as_u16(), details = %details, "PayPal request failed");
            Err(PaymentError::Provider {
                status: status.as_u16(),
                details,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn config() -> PayPalConfig {
        PayPalConfig {
            client_id: Some("AZDxjDScFpQtjWTO".into()),
            secret: Some("shh".into()),
            environment: Environment::Sandbox,
        }
    }

    async fn token_mock(server: &mut mockito::ServerGuard) -> mockito::Mock {
        server
            .mock("POST", "/v1/oauth2/token")
            .match_header("authorization", Matcher::Regex("^Basic ".into()))
            .match_body(Matcher::UrlEncoded("grant_type".into(), "client_credentials".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"A21AA","token_type":"Bearer"}"#)
            .create_async()
            .await
    }

    fn body() -> CreateOrderBody {
        CreateOrderBody {
            amount: "1.00".into(),
            currency: "USD".into(),
            description: None,
        }
    }

    #[test]
    fn test_config_from_lookup() {
        let config = PayPalConfig::from_lookup(|key| match key {
            "VITE_PAYPAL_CLIENT_ID" => Some("AZDxjDScFpQtjWTO".into()),
            "PAYPAL_SECRET" => Some("shh".into()),
            "PAYPAL_ENVIRONMENT" => Some("production".into()),
            _ => None,
        });
        assert!(config.is_configured());
        assert_eq!(config.base_url(), PRODUCTION_BASE_URL);
        assert_eq!(config.client_id_preview(), "AZDxjDScFp...");

        let empty = PayPalConfig::from_lookup(|_| None);
        assert!(!empty.is_configured());
        assert_eq!(empty.base_url(), SANDBOX_BASE_URL);
        assert_eq!(empty.client_id_preview(), "Not set");
    }

    #[test]
    fn test_missing_credentials() {
        let err = PayPalClient::new(&PayPalConfig::default()).unwrap_err();
        assert!(matches!(err, PaymentError::Config(_)));
    }

    #[tokio::test]
    async fn test_create_order() {
        let mut server = mockito::Server::new_async().await;
        let token = token_mock(&mut server).await;
        let create = server
            .mock("POST", "/v2/checkout/orders")
            .match_header("authorization", "Bearer A21AA")
            .match_header("paypal-request-id", Matcher::Any)
            .match_body(Matcher::PartialJson(json!({
                "intent": "CAPTURE",
                "purchase_units": [{
                    "amount": {"currency_code": "USD", "value": "1.00"},
                    "description": DEFAULT_DESCRIPTION,
                }],
                "application_context": {
                    "return_url": "https://game.example/success",
                    "cancel_url": "https://game.example/cancel",
                    "shipping_preference": "NO_SHIPPING",
                    "user_action": "PAY_NOW",
                },
            })))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"5O190127TN364715T","status":"CREATED"}"#)
            .create_async()
            .await;

        let client = PayPalClient::new(&config()).unwrap().with_base_url(server.url());
        let id = client.create_order(&body(), "https://game.example").await.unwrap();

        assert_eq!(id, "5O190127TN364715T");
        token.assert_async().await;
        create.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_order_rejected() {
        let mut server = mockito::Server::new_async().await;
        let _token = token_mock(&mut server).await;
        let _create = server
            .mock("POST", "/v2/checkout/orders")
            .with_status(422)
            .with_header("content-type", "application/json")
            .with_body(r#"{"name":"UNPROCESSABLE_ENTITY"}"#)
            .create_async()
            .await;

        let client = PayPalClient::new(&config()).unwrap().with_base_url(server.url());
        let err = client.create_order(&body(), "https://game.example").await.unwrap_err();

        match err {
            PaymentError::Provider { status, details } => {
                assert_eq!(status, 422);
                assert_eq!(details["name"], "UNPROCESSABLE_ENTITY");
            }
            other => panic!("expected provider error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_token_rejected() {
        let mut server = mockito::Server::new_async().await;
        let _token = server
            .mock("POST", "/v1/oauth2/token")
            .with_status(401)
            .with_body(r#"{"error":"invalid_client"}"#)
            .create_async()
            .await;

        let client = PayPalClient::new(&config()).unwrap().with_base_url(server.url());
        let err = client.capture_order("ORDER-1").await.unwrap_err();
        assert!(matches!(err, PaymentError::TokenUnavailable(_)));
    }

    #[tokio::test]
    async fn test_capture_returns_payload_verbatim() {
        let mut server = mockito::Server::new_async().await;
        let _token = token_mock(&mut server).await;
        let _capture = server
            .mock("POST", "/v2/checkout/orders/ORDER-1/capture")
            .match_header("authorization", "Bearer A21AA")
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"ORDER-1","status":"COMPLETED","payer":{"payer_id":"QYR5Z8XDVJNXQ"}}"#)
            .create_async()
            .await;

        let client = PayPalClient::new(&config()).unwrap().with_base_url(server.url());
        let payload = client.capture_order("ORDER-1").await.unwrap();

        assert_eq!(payload["status"], "COMPLETED");
        assert_eq!(payload["payer"]["payer_id"], "QYR5Z8XDVJNXQ");
    }

    #[test]
    fn test_order_id_validation() {
        assert!(is_valid_order_id("5O190127TN364715T"));
        assert!(is_valid_order_id("SDK-ORDER-1"));
        assert!(!is_valid_order_id(""));
        assert!(!is_valid_order_id("../v1/identity/oauth2/userinfo"));
        assert!(!is_valid_order_id("ORDER-1/capture?x=1"));
        assert!(!is_valid_order_id("ORDER 1"));
        assert!(!is_valid_order_id(&"A".repeat(65)));
    }

    #[tokio::test]
    async fn test_capture_refuses_path_traversal_without_calling_provider() {
        let mut server = mockito::Server::new_async().await;
        let token = server.mock("POST", "/v1/oauth2/token").expect(0).create_async().await;
        let any = server.mock("POST", Matcher::Any).expect(0).create_async().await;

        let client = PayPalClient::new(&config()).unwrap().with_base_url(server.url());
        let err = client.capture_order("../v1/identity/oauth2/userinfo").await.unwrap_err();

        assert!(matches!(err, PaymentError::InvalidOrderId(_)));
        token.assert_async().await;
        any.assert_async().await;
    }
}
