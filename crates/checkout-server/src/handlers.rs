//! HTTP Handlers

use axum::{
    Form, Json,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::Redirect,
};
use serde::{Deserialize, Serialize};

use checkout_payments::{
    CheckoutMode, CheckoutRequest, Claim, OrderStore, PaymentError, PortalRequest,
    SIGNATURE_HEADER, StripeClient,
};

use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub stripe_configured: bool,
    pub listeners: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>, code: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.into(),
        }),
    )
}

#[derive(Debug, Deserialize)]
pub struct CheckoutForm {
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub quantity: Option<u64>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PortalForm {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub customer: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SuccessQuery {
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub session_id: String,
    pub payment_status: String,
    pub customer: Option<String>,
    pub fulfilled: bool,
}

fn require_stripe(state: &AppState) -> Result<&StripeClient, ApiError> {
    state.stripe.as_deref().ok_or_else(|| {
        api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "Payments not configured",
            "PAYMENTS_DISABLED",
        )
    })
}

fn stripe_failure(context: &str, e: &PaymentError) -> ApiError {
    if e.is_retryable() {
        tracing::error!("{}: {}", context, e);
        return api_error(StatusCode::BAD_GATEWAY, e.user_message(), "STRIPE_ERROR");
    }

    tracing::warn!("{}: {}", context, e);
    let code = match e {
        PaymentError::MissingCustomer(_) => "MISSING_CUSTOMER",
        PaymentError::InvalidId(_) => "INVALID_ID",
        _ => "INVALID_REQUEST",
    };
    api_error(StatusCode::BAD_REQUEST, e.user_message(), code)
}

fn storage_failure(context: &str, e: &PaymentError) -> ApiError {
    tracing::error!("{}: {}", context, e);
    api_error(StatusCode::INTERNAL_SERVER_ERROR, e.user_message(), "STORAGE_ERROR")
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        stripe_configured: state.stripe.is_some(),
        listeners: state.delegator.len(),
    })
}

/// Create a hosted checkout session and redirect (303) to it
pub async fn create_checkout_session(
    State(state): State<AppState>,
    Form(form): Form<CheckoutForm>,
) -> Result<Redirect, ApiError> {
    let stripe = require_stripe(&state)?;

    let price = form
        .price
        .filter(|p| !p.is_empty())
        .or_else(|| state.config.default_price.clone())
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "No price given", "MISSING_PRICE"))?;

    let mode = match form.mode.as_deref() {
        Some(mode) => mode
            .parse::<CheckoutMode>()
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string(), "INVALID_MODE"))?,
        None => CheckoutMode::default(),
    };

    let request = CheckoutRequest {
        price,
        quantity: form.quantity.unwrap_or(1).max(1),
        mode,
        customer_email: form.customer_email.filter(|e| !e.is_empty()),
        success_url: state.config.url("/success"),
        cancel_url: state.config.url("/cancel.html"),
        client_reference_id: None,
    };

    let session = stripe
        .create_checkout_session(request)
        .await
        .map_err(|e| stripe_failure("Checkout error", &e))?;

    Ok(Redirect::to(&session.url))
}

/// Create a billing portal session and redirect (303) to it
pub async fn create_portal_session(
    State(state): State<AppState>,
    Form(form): Form<PortalForm>,
) -> Result<Redirect, ApiError> {
    let stripe = require_stripe(&state)?;

    let customer = form.customer.filter(|c| !c.is_empty());
    let session_id = form.session_id.filter(|s| !s.is_empty());
    if session_id.is_none() && customer.is_none() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "session_id or customer is required",
            "MISSING_CUSTOMER",
        ));
    }

    let request = PortalRequest {
        customer,
        session_id,
        return_url: state.config.url("/"),
    };

    let session = stripe
        .create_portal_session(request)
        .await
        .map_err(|e| stripe_failure("Portal error", &e))?;

    Ok(Redirect::to(&session.url))
}

/// Look up the session the customer was redirected back with
///
/// Read-only: fulfillment happens in the webhook.
pub async fn checkout_success(
    State(state): State<AppState>,
    Query(query): Query<SuccessQuery>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let stripe = require_stripe(&state)?;

    let summary = stripe
        .retrieve_checkout_session(&query.session_id)
        .await
        .map_err(|e| stripe_failure("Session lookup error", &e))?;

    let fulfilled = state
        .orders
        .is_fulfilled(&summary.session_id)
        .map_err(|e| storage_failure("Order lookup error", &e))?;

    Ok(Json(SuccessResponse {
        session_id: summary.session_id,
        payment_status: summary.payment_status,
        customer: summary.customer,
        fulfilled,
    }))
}

/// Stripe webhook endpoint
///
/// 200 acknowledges the delivery, including unknown and duplicate events
/// and events a listener rejected as malformed. 500 makes Stripe redeliver;
/// it is returned when a listener failed in a way a retry could fix. 409
/// answers a delivery that arrives while the same event is still being
/// dispatched.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let verifier = state.verifier.as_ref().ok_or_else(|| {
        api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "Payments not configured",
            "PAYMENTS_DISABLED",
        )
    })?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            api_error(
                StatusCode::BAD_REQUEST,
                "Missing Stripe signature",
                "MISSING_SIGNATURE",
            )
        })?;

    let event = verifier.construct_event(&body, signature).map_err(|e| {
        tracing::warn!("Webhook rejected: {}", e);
        let code = match e {
            PaymentError::WebhookParse(_) => "INVALID_PAYLOAD",
            _ => "INVALID_SIGNATURE",
        };
        api_error(StatusCode::BAD_REQUEST, e.user_message(), code)
    })?;

    tracing::info!(
        event_id = %event.id,
        event_type = %event.name,
        livemode = event.livemode,
        created = ?event.created_at(),
        "Received webhook event"
    );

    let claim = state
        .redelivery
        .begin(&event.id)
        .map_err(|e| storage_failure("Redelivery guard error", &e))?;
    match claim {
        Claim::Claimed => {}
        Claim::Processed => {
            tracing::info!(event_id = %event.id, "Duplicate delivery, skipping");
            return Ok(StatusCode::OK);
        }
        Claim::InFlight => {
            tracing::info!(event_id = %event.id, "Event already being dispatched");
            return Err(api_error(
                StatusCode::CONFLICT,
                "Event is already being processed",
                "DELIVERY_IN_PROGRESS",
            ));
        }
    }

    let report = state.delegator.dispatch(&event).await;
    let redeliver = report.needs_redelivery();

    state
        .redelivery
        .finish(&event.id, !redeliver)
        .map_err(|e| storage_failure("Redelivery guard error", &e))?;

    if redeliver {
        return Err(api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Webhook processing failed",
            "WEBHOOK_ERROR",
        ));
    }

    if report.is_noop() {
        tracing::debug!(event_id = %event.id, event_type = %event.name, "Nothing subscribed");
    } else if !report.is_success() {
        tracing::warn!(
            event_id = %event.id,
            failed = report.failures.len(),
            "Listeners rejected the event, acknowledging without retry"
        );
    }

    Ok(StatusCode::OK)
}
