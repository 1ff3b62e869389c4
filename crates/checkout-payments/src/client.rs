//! Order Endpoint Client
//!
//! Primary tier of the widget: talks to the server's order-create and
//! order-capture endpoints. Failures come back as `TierError` so the
//! orchestrator can decide whether to fall back.

use async_trait::async_trait;
use checkout_core::{
    CaptureOrderBody, CaptureResult, CreateOrderResponse, EndpointConfig, OrderBackend, OrderHandle, OrderRequest,
    TierError,
};
use reqwest::{Client, Response};
use serde_json::Value;

/// `OrderBackend` over HTTP
#[derive(Clone, Debug)]
pub struct HttpOrderBackend {
    http: Client,
    endpoints: EndpointConfig,
}

impl HttpOrderBackend {
    pub fn new(endpoints: EndpointConfig) -> Self {
        Self::with_client(Client::new(), endpoints)
    }

    /// Share an existing connection pool
    pub const fn with_client(http: Client, endpoints: EndpointConfig) -> Self {
        Self { http, endpoints }
    }

    pub const fn endpoints(&self) -> &EndpointConfig {
        &self.endpoints
    }

    async fn check(response: Response) -> Result<Response, TierError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(TierError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

fn transport(e: &reqwest::Error) -> TierError {
    TierError::Transport(e.to_string())
}

fn decode(e: &reqwest::Error) -> TierError {
    TierError::Decode(e.to_string())
}

#[async_trait]
impl OrderBackend for HttpOrderBackend {
    async fn create_order(&self, request: &OrderRequest) -> Result<OrderHandle, TierError> {
        let response = self
            .http
            .post(&self.endpoints.create_url)
            .json(&request.to_wire())
            .send()
            .await
            .map_err(|e| transport(&e))?;

        let created: CreateOrderResponse = Self::check(response).await?.json().await.map_err(|e| decode(&e))?;
        if created.order_id.is_empty() {
            return Err(TierError::Decode("empty orderID".into()));
        }
        Ok(OrderHandle::new(created.order_id))
    }

    async fn capture_order(&self, handle: &OrderHandle) -> Result<CaptureResult, TierError> {
        let body = CaptureOrderBody {
            order_id: Some(handle.as_str().to_string()),
        };
        let response = self
            .http
            .post(&self.endpoints.capture_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport(&e))?;

        let payload: Value = Self::check(response).await?.json().await.map_err(|e| decode(&e))?;
        Ok(CaptureResult::from_payload(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkout_core::CaptureStatus;
    use mockito::Matcher;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn request() -> OrderRequest {
        OrderRequest::new(dec!(1), "USD", "Unlock unlimited Tic Tac Toe plays")
    }

    #[tokio::test]
    async fn test_create_order_posts_wire_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/create-paypal-order")
            .match_body(Matcher::Json(json!({
                "amount": "1.00",
                "currency": "USD",
                "description": "Unlock unlimited Tic Tac Toe plays",
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"orderID":"5O190127TN364715T"}"#)
            .create_async()
            .await;

        let backend = HttpOrderBackend::new(EndpointConfig::with_base(&server.url()));
        let handle = backend.create_order(&request()).await.unwrap();

        assert_eq!(handle.as_str(), "5O190127TN364715T");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_order_error_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/create-paypal-order")
            .with_status(400)
            .with_body(r#"{"error":"Failed to create PayPal order"}"#)
            .create_async()
            .await;

        let backend = HttpOrderBackend::new(EndpointConfig::with_base(&server.url()));
        let err = backend.create_order(&request()).await.unwrap_err();

        match err {
            TierError::Status { status, body } => {
                assert_eq!(status, 400);
                assert!(body.contains("Failed to create PayPal order"));
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_order_bad_body_is_decode_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/create-paypal-order")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<html>index</html>")
            .create_async()
            .await;

        let backend = HttpOrderBackend::new(EndpointConfig::with_base(&server.url()));
        let err = backend.create_order(&request()).await.unwrap_err();
        assert!(matches!(err, TierError::Decode(_)));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        let backend = HttpOrderBackend::new(EndpointConfig::with_base("http://127.0.0.1:1"));
        let err = backend.create_order(&request()).await.unwrap_err();
        assert!(matches!(err, TierError::Transport(_)));
    }

    #[tokio::test]
    async fn test_capture_classifies_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/capture-paypal-order")
            .match_body(Matcher::Json(json!({"orderID": "ORDER-1"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"ORDER-1","status":"PENDING"}"#)
            .create_async()
            .await;

        let backend = HttpOrderBackend::new(EndpointConfig::with_base(&server.url()));
        let result = backend.capture_order(&OrderHandle::new("ORDER-1")).await.unwrap();

        assert_eq!(result.status, CaptureStatus::Incomplete);
        assert_eq!(result.provider_status(), Some("PENDING"));
    }
}
