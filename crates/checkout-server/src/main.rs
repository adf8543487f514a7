//! checkout-hooks HTTP Server
//!
//! Axum server that redirects browsers to Stripe-hosted checkout and
//! billing portal pages, and routes verified Stripe webhooks through the
//! listener delegator.

mod config;
mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use checkout_core::Delegator;
use checkout_payments::{MemoryOrderStore, StripeClient, register_checkout_listeners};

use crate::config::Config;
use crate::handlers::{
    checkout_success, create_checkout_session, create_portal_session, health_check,
    stripe_webhook,
};
use crate::state::AppState;

/// Build the router over the given state
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        // Hosted pages
        .route("/create-checkout-session", post(create_checkout_session))
        .route("/create-portal-session", post(create_portal_session))
        .route("/success", get(checkout_success))
        // Processor callbacks
        .route("/webhook", post(stripe_webhook))
        // Static pricing/cancel pages
        .fallback_service(ServeDir::new("static"))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment first so RUST_LOG from .env applies
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let stripe = match StripeClient::from_env() {
        Ok(client) => {
            tracing::info!("✓ Stripe configured");
            Some(client)
        }
        Err(e) => {
            tracing::warn!("⚠ Stripe not configured - payments disabled ({})", e);
            tracing::warn!("  Set STRIPE_SECRET_KEY and STRIPE_WEBHOOK_SECRET in .env");
            None
        }
    };

    if config.default_price.is_none() {
        tracing::warn!("STRIPE_PRICE_ID not set - checkout requests must name a price");
    }

    // Listeners are registered once, before serving
    let orders = Arc::new(MemoryOrderStore::new());
    let mut delegator = Delegator::new();
    register_checkout_listeners(&mut delegator, orders.clone());

    tracing::info!("Registered {} webhook listeners:", delegator.len());
    for name in delegator.event_names() {
        tracing::info!("  • {} ({})", name, delegator.listener_count(name));
    }

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(config, stripe, delegator, orders);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    tracing::info!("checkout-server running on http://{}", bind_addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                  - Health check");
    tracing::info!("  POST /create-checkout-session - Redirect to hosted checkout");
    tracing::info!("  POST /create-portal-session   - Redirect to billing portal");
    tracing::info!("  GET  /success?session_id=     - Checkout session status");
    tracing::info!("  POST /webhook                 - Stripe webhook endpoint");

    axum::serve(listener, app(state)).await?;

    Ok(())
}
