//! Application State

use std::sync::Arc;

use checkout_core::Delegator;
use checkout_payments::{MemoryOrderStore, RedeliveryGuard, StripeClient, WebhookVerifier};

use crate::config::Config;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,

    /// Stripe client (optional - None if not configured)
    pub stripe: Option<Arc<StripeClient>>,

    /// Webhook signature verifier, present whenever Stripe is configured
    pub verifier: Option<WebhookVerifier>,

    /// Listener registry, frozen after startup
    pub delegator: Arc<Delegator>,

    pub orders: Arc<MemoryOrderStore>,

    /// Event IDs already dispatched
    pub redelivery: Arc<RedeliveryGuard>,
}

impl AppState {
    pub fn new(
        config: Config,
        stripe: Option<StripeClient>,
        delegator: Delegator,
        orders: Arc<MemoryOrderStore>,
    ) -> Self {
        let verifier = stripe.as_ref().map(|s| {
            WebhookVerifier::new(s.webhook_secret()).with_tolerance(config.webhook_tolerance_secs)
        });

        Self {
            config: Arc::new(config),
            stripe: stripe.map(Arc::new),
            verifier,
            delegator: Arc::new(delegator),
            orders,
            redelivery: Arc::new(RedeliveryGuard::default()),
        }
    }
}
