//! # checkout-payments
//!
//! Stripe hosted checkout, billing portal and verified webhook handling.
//!
//! ## Flow
//!
//! ```text
//! ┌─────────────┐  303  ┌─────────────────┐       ┌─────────────┐
//! │  Your Site  │──────▶│  Stripe Hosted  │──────▶│  Your Site  │
//! │  (pricing)  │       │  Checkout Page  │       │  (success)  │
//! └─────────────┘       └────────┬────────┘       └─────────────┘
//!                                │ webhook
//!                                ▼
//!                 ┌──────────────────────────────┐
//!                 │ WebhookVerifier ─▶ Delegator │
//!                 │        ─▶ FulfillOrder       │
//!                 └──────────────────────────────┘
//! ```
//!
//! The success page must not be used to fulfill orders: customers can close
//! the tab before the redirect. Fulfillment runs from the webhook.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use checkout_payments::{CheckoutMode, CheckoutRequest, StripeClient};
//!
//! let client = StripeClient::new("sk_test_xxx", "whsec_xxx");
//!
//! let session = client.create_checkout_session(CheckoutRequest {
//!     price: "price_123".into(),
//!     quantity: 1,
//!     mode: CheckoutMode::Payment,
//!     customer_email: None,
//!     success_url: "https://yoursite.com/success".into(),
//!     cancel_url: "https://yoursite.com/cancel".into(),
//!     client_reference_id: None,
//! }).await?;
//!
//! // Redirect (303) to: session.url
//! ```

mod checkout;
mod error;
mod fulfillment;
mod order;
mod redelivery;
mod webhook;

pub use checkout::{
    CheckoutMode, CheckoutRequest, CheckoutSession, PortalRequest, PortalSession,
    SESSION_ID_PARAM, SESSION_ID_PLACEHOLDER, SessionSummary, StripeClient, with_session_id,
};
pub use error::{PaymentError, Result};
pub use fulfillment::{FulfillOrder, NotifyPaymentFailed, register_checkout_listeners};
pub use order::{Fulfillment, MemoryOrderStore, Order, OrderStatus, OrderStore};
pub use redelivery::{Claim, RedeliveryGuard};
pub use webhook::{
    DEFAULT_TOLERANCE_SECS, SIGNATURE_HEADER, SignatureHeader, WebhookVerifier, sign_payload,
    signature_header,
};
