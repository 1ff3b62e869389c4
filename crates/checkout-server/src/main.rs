//! checkout-widget HTTP Server
//!
//! Axum server holding the PayPal secret. The widget's primary tier calls
//! the order endpoints here; the frontend bundle is served from `static/`.

mod handlers;
mod state;

use axum::{
    Router,
    routing::{get, post},
};
use checkout_payments::PayPalConfig;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::handlers::{capture_paypal_order, create_paypal_order, env_check, health_check};
use crate::state::AppState;

fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health & diagnostics
        .route("/api/health", get(health_check))
        .route("/api/env-check", get(env_check))
        // Orders
        .route("/api/create-paypal-order", post(create_paypal_order))
        .route("/api/capture-paypal-order", post(capture_paypal_order))
        // Frontend bundle
        .fallback_service(ServeDir::new("static"))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let config = PayPalConfig::from_env();
    if config.is_configured() {
        tracing::info!(
            client_id = %config.client_id_preview(),
            environment = %config.environment,
            "✓ PayPal configured"
        );
    } else {
        tracing::warn!("⚠ PayPal not configured - order endpoints will answer 500");
        tracing::warn!("  Set PAYPAL_CLIENT_ID and PAYPAL_SECRET in .env");
    }

    let app = build_router(AppState::from_config(config));

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("PayPal API server running on http://{}", addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /api/health               - Health check");
    tracing::info!("  GET  /api/env-check            - Configuration diagnostics");
    tracing::info!("  POST /api/create-paypal-order  - Create order");
    tracing::info!("  POST /api/capture-paypal-order - Capture order");

    axum::serve(listener, app).await?;

    Ok(())
}
