//! HTTP Handlers

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode, header},
};
use chrono::{SecondsFormat, Utc};
use checkout_core::{CaptureOrderBody, CreateOrderBody, CreateOrderResponse};
use checkout_payments::{PayPalClient, PaymentError, is_valid_order_id};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub paypal_configured: bool,
    pub environment: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvCheckResponse {
    pub timestamp: String,
    pub environment: &'static str,
    pub paypal_client_id_set: bool,
    pub paypal_secret_set: bool,
    pub client_id_length: usize,
    pub client_id_preview: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error(status: StatusCode, message: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
            details: None,
        }),
    )
}

/// Map a provider failure for `action` ("create" / "capture")
fn payment_failure(action: &str, e: PaymentError) -> ApiError {
    match e {
        PaymentError::Provider { status, details } => {
            tracing::error!(action, status, details = %details, "PayPal rejected order request");
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: format!("Failed to {action} PayPal order"),
                    details: Some(details),
                }),
            )
        }
        PaymentError::TokenUnavailable(reason) => {
            tracing::error!(action, reason = %reason, "PayPal token error");
            error(StatusCode::BAD_REQUEST, "Failed to get PayPal access token")
        }
        PaymentError::Config(_) => error(StatusCode::INTERNAL_SERVER_ERROR, "PayPal credentials not configured"),
        PaymentError::InvalidOrderId(_) => error(StatusCode::BAD_REQUEST, "Invalid order ID"),
        other => {
            tracing::error!(action, error = %other, "Error calling PayPal");
            error(StatusCode::INTERNAL_SERVER_ERROR, other.user_message())
        }
    }
}

fn client(state: &AppState) -> Result<&Arc<PayPalClient>, ApiError> {
    state
        .paypal
        .as_ref()
        .ok_or_else(|| error(StatusCode::INTERNAL_SERVER_ERROR, "PayPal credentials not configured"))
}

/// Origin of the calling page, for the provider's return and cancel URLs
fn request_origin(headers: &HeaderMap) -> String {
    if let Some(origin) = headers.get(header::ORIGIN).and_then(|v| v.to_str().ok()) {
        return origin.trim_end_matches('/').to_string();
    }
    headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| "http://localhost".to_string(), |host| format!("http://{host}"))
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        paypal_configured: state.config.is_configured(),
        environment: state.config.environment.as_str(),
    })
}

/// Configuration diagnostics without exposing the credentials
pub async fn env_check(State(state): State<AppState>) -> Json<EnvCheckResponse> {
    let config = &state.config;
    Json(EnvCheckResponse {
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        environment: config.environment.as_str(),
        paypal_client_id_set: config.client_id.is_some(),
        paypal_secret_set: config.secret.is_some(),
        client_id_length: config.client_id.as_deref().map_or(0, |id| id.chars().count()),
        client_id_preview: config.client_id_preview(),
    })
}

/// Create a PayPal order for the widget's primary tier
pub async fn create_paypal_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateOrderBody>,
) -> Result<Json<CreateOrderResponse>, ApiError> {
    let paypal = client(&state)?;
    let origin = request_origin(&headers);

    let order_id = paypal
        .create_order(&body, &origin)
        .await
        .map_err(|e| payment_failure("create", e))?;

    Ok(Json(CreateOrderResponse { order_id }))
}

/// Capture an approved order; the provider payload is passed through
pub async fn capture_paypal_order(
    State(state): State<AppState>,
    Json(body): Json<CaptureOrderBody>,
) -> Result<Json<Value>, ApiError> {
    let Some(order_id) = body.order_id.filter(|id| !id.is_empty()) else {
        return Err(error(StatusCode::BAD_REQUEST, "Order ID is required"));
    };
    if !is_valid_order_id(&order_id) {
        tracing::warn!(order_id = %order_id, "Rejected malformed order id");
        return Err(error(StatusCode::BAD_REQUEST, "Invalid order ID"));
    }
    let paypal = client(&state)?;

    let payload = paypal
        .capture_order(&order_id)
        .await
        .map_err(|e| payment_failure("capture", e))?;

    Ok(Json(payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_router;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use checkout_core::Environment;
    use checkout_payments::PayPalConfig;
    use serde_json::json;
    use tower::ServiceExt;

    fn config() -> PayPalConfig {
        PayPalConfig {
            client_id: Some("AZDxjDScFpQtjWTO".into()),
            secret: Some("shh".into()),
            environment: Environment::Sandbox,
        }
    }

    fn state_for(server: &mockito::ServerGuard) -> AppState {
        let client = PayPalClient::new(&config()).unwrap().with_base_url(server.url());
        AppState::new(config(), Some(client))
    }

    async fn send(state: AppState, request: Request<Body>) -> (StatusCode, Value) {
        let response = build_router(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post(uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .header("origin", "https://game.example")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn mock_token(server: &mut mockito::ServerGuard) -> mockito::Mock {
        server
            .mock("POST", "/v1/oauth2/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"A21AA"}"#)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn test_health() {
        let state = AppState::from_config(PayPalConfig::default());
        let (status, body) = send(state, get("/api/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "OK", "paypalConfigured": false, "environment": "sandbox"}));
    }

    #[tokio::test]
    async fn test_env_check_hides_credentials() {
        let state = AppState::from_config(config());
        let (status, body) = send(state, get("/api/env-check")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["paypalClientIdSet"], true);
        assert_eq!(body["paypalSecretSet"], true);
        assert_eq!(body["clientIdLength"], 16);
        assert_eq!(body["clientIdPreview"], "AZDxjDScFp...");
        assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));
        assert!(!body.to_string().contains("shh"));
    }

    #[tokio::test]
    async fn test_create_order() {
        let mut server = mockito::Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let create = server
            .mock("POST", "/v2/checkout/orders")
            .match_body(mockito::Matcher::PartialJson(json!({
                "application_context": {"return_url": "https://game.example/success"}
            })))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"5O190127TN364715T","status":"CREATED"}"#)
            .create_async()
            .await;

        let (status, body) = send(
            state_for(&server),
            post("/api/create-paypal-order", &json!({"amount": "1.00"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"orderID": "5O190127TN364715T"}));
        create.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_order_rejected_by_provider() {
        let mut server = mockito::Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let _create = server
            .mock("POST", "/v2/checkout/orders")
            .with_status(422)
            .with_header("content-type", "application/json")
            .with_body(r#"{"name":"UNPROCESSABLE_ENTITY"}"#)
            .create_async()
            .await;

        let (status, body) = send(
            state_for(&server),
            post("/api/create-paypal-order", &json!({"amount": "1.00", "currency": "USD"})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Failed to create PayPal order");
        assert_eq!(body["details"]["name"], "UNPROCESSABLE_ENTITY");
    }

    #[tokio::test]
    async fn test_create_order_without_credentials() {
        let state = AppState::from_config(PayPalConfig::default());
        let (status, body) = send(state, post("/api/create-paypal-order", &json!({"amount": "1.00"}))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "PayPal credentials not configured");
    }

    #[tokio::test]
    async fn test_capture_requires_order_id() {
        let state = AppState::from_config(config());
        let (status, body) = send(state, post("/api/capture-paypal-order", &json!({}))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "Order ID is required"}));
    }

    #[tokio::test]
    async fn test_capture_rejects_order_id_outside_orders_api() {
        let mut server = mockito::Server::new_async().await;
        let upstream = server.mock("POST", mockito::Matcher::Any).expect(0).create_async().await;

        let (status, body) = send(
            state_for(&server),
            post("/api/capture-paypal-order", &json!({"orderID": "../v1/identity/oauth2/userinfo"})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "Invalid order ID"}));
        upstream.assert_async().await;
    }

    #[tokio::test]
    async fn test_capture_passes_payload_through() {
        let mut server = mockito::Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let _capture = server
            .mock("POST", "/v2/checkout/orders/ORDER-1/capture")
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"ORDER-1","status":"COMPLETED"}"#)
            .create_async()
            .await;

        let (status, body) = send(
            state_for(&server),
            post("/api/capture-paypal-order", &json!({"orderID": "ORDER-1"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"id": "ORDER-1", "status": "COMPLETED"}));
    }

    #[tokio::test]
    async fn test_capture_token_failure() {
        let mut server = mockito::Server::new_async().await;
        let _token = server
            .mock("POST", "/v1/oauth2/token")
            .with_status(401)
            .with_body(r#"{"error":"invalid_client"}"#)
            .create_async()
            .await;

        let (status, body) = send(
            state_for(&server),
            post("/api/capture-paypal-order", &json!({"orderID": "ORDER-1"})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Failed to get PayPal access token");
    }

    #[test]
    fn test_request_origin_fallbacks() {
        let mut headers = HeaderMap::new();
        assert_eq!(request_origin(&headers), "http://localhost");

        headers.insert(header::HOST, "localhost:3001".parse().unwrap());
        assert_eq!(request_origin(&headers), "http://localhost:3001");

        headers.insert(header::ORIGIN, "https://game.example/".parse().unwrap());
        assert_eq!(request_origin(&headers), "https://game.example");
    }
}
