//! Checkout Fulfillment Listeners
//!
//! `checkout.session.completed` can fire before funds clear for delayed
//! payment methods, so fulfillment only happens when `payment_status` is
//! `paid`. The late settlement arrives as
//! `checkout.session.async_payment_succeeded` and goes through the same
//! listener.

use async_trait::async_trait;
use std::sync::Arc;

use checkout_core::{Delegator, Event, HookError, Listener, names};

use crate::order::{Fulfillment, Order, OrderStatus, OrderStore};

fn order_from_event(event: &Event, status: OrderStatus) -> Result<Order, HookError> {
    let session_id = event
        .object_id()
        .ok_or_else(|| HookError::Parse(format!("{} has no data.object.id", event.name)))?;

    let mut order = Order::new(session_id, status);
    order.customer = event.object_str("customer").map(str::to_string);
    order.client_reference_id = event.object_str("client_reference_id").map(str::to_string);
    Ok(order)
}

/// Fulfills paid checkout sessions
pub struct FulfillOrder<S: OrderStore> {
    store: Arc<S>,
}

impl<S: OrderStore> FulfillOrder<S> {
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: OrderStore + 'static> Listener for FulfillOrder<S> {
    fn name(&self) -> &str {
        "fulfill_order"
    }

    async fn handle(&self, event: &Event) -> checkout_core::Result<()> {
        if !event.is_paid() {
            tracing::info!(
                event_id = %event.id,
                session_id = ?event.object_id(),
                payment_status = ?event.payment_status(),
                "Payment not settled yet, skipping fulfillment"
            );
            return Ok(());
        }

        let order = order_from_event(event, OrderStatus::Fulfilled)?;
        let session_id = order.session_id.clone();

        match self.store.fulfill(order)? {
            Fulfillment::Fulfilled => {
                tracing::info!(event_id = %event.id, session_id = %session_id, "Fulfilled order");
            }
            Fulfillment::AlreadyFulfilled => {
                tracing::debug!(session_id = %session_id, "Order already fulfilled");
            }
        }

        Ok(())
    }
}

/// Records failed delayed payments
pub struct NotifyPaymentFailed<S: OrderStore> {
    store: Arc<S>,
}

impl<S: OrderStore> NotifyPaymentFailed<S> {
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: OrderStore + 'static> Listener for NotifyPaymentFailed<S> {
    fn name(&self) -> &str {
        "notify_payment_failed"
    }

    async fn handle(&self, event: &Event) -> checkout_core::Result<()> {
        let order = order_from_event(event, OrderStatus::PaymentFailed)?;

        tracing::warn!(
            event_id = %event.id,
            session_id = %order.session_id,
            customer = ?order.customer,
            "Delayed payment failed - customer may need to retry"
        );

        self.store.mark_failed(order)?;
        Ok(())
    }
}

/// Wire the checkout listeners into a delegator
///
/// Completed and async-succeeded sessions share one fulfillment listener.
pub fn register_checkout_listeners<S: OrderStore + 'static>(
    delegator: &mut Delegator,
    store: Arc<S>,
) {
    delegator.subscribe_many(
        [
            names::CHECKOUT_SESSION_COMPLETED,
            names::CHECKOUT_SESSION_ASYNC_PAYMENT_SUCCEEDED,
        ],
        Arc::new(FulfillOrder::new(store.clone())),
    );
    delegator.subscribe(
        names::CHECKOUT_SESSION_ASYNC_PAYMENT_FAILED,
        NotifyPaymentFailed::new(store),
    );
}
