//! Order Records
//!
//! Tracks what happened to each checkout session so fulfillment runs once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::error::{PaymentError, Result};

/// Order state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Fulfilled,
    PaymentFailed,
}

/// An order, keyed by checkout session ID
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Order {
    /// Checkout session ID
    pub session_id: String,

    /// Stripe customer ID, when the session had one
    pub customer: Option<String>,

    /// Our own reference passed at checkout
    pub client_reference_id: Option<String>,

    pub status: OrderStatus,

    /// Last status change
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new(session_id: impl Into<String>, status: OrderStatus) -> Self {
        Self {
            session_id: session_id.into(),
            customer: None,
            client_reference_id: None,
            status,
            updated_at: Utc::now(),
        }
    }

    pub fn is_fulfilled(&self) -> bool {
        self.status == OrderStatus::Fulfilled
    }
}

/// Outcome of a fulfill call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fulfillment {
    /// The order was fulfilled by this call
    Fulfilled,
    /// The order had already been fulfilled; nothing changed
    AlreadyFulfilled,
}

/// Order storage trait
pub trait OrderStore: Send + Sync {
    /// Mark an order fulfilled (idempotent)
    fn fulfill(&self, order: Order) -> Result<Fulfillment>;

    /// Record a failed asynchronous payment
    ///
    /// A fulfilled order is never downgraded.
    fn mark_failed(&self, order: Order) -> Result<()>;

    /// Get order by session ID
    fn get(&self, session_id: &str) -> Result<Option<Order>>;

    /// Whether the session has been fulfilled
    fn is_fulfilled(&self, session_id: &str) -> Result<bool> {
        Ok(self.get(session_id)?.is_some_and(|o| o.is_fulfilled()))
    }
}

/// In-memory order store (for development)
#[derive(Default)]
pub struct MemoryOrderStore {
    orders: RwLock<HashMap<String, Order>>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored orders
    pub fn len(&self) -> usize {
        self.orders.read().map_or(0, |o| o.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: PoisonError<T>) -> PaymentError {
    PaymentError::Storage("order store lock poisoned".into())
}

impl OrderStore for MemoryOrderStore {
    fn fulfill(&self, mut order: Order) -> Result<Fulfillment> {
        let mut orders = self.orders.write().map_err(poisoned)?;

        if orders.get(&order.session_id).is_some_and(Order::is_fulfilled) {
            return Ok(Fulfillment::AlreadyFulfilled);
        }

        order.status = OrderStatus::Fulfilled;
        order.updated_at = Utc::now();
        orders.insert(order.session_id.clone(), order);
        Ok(Fulfillment::Fulfilled)
    }

    fn mark_failed(&self, mut order: Order) -> Result<()> {
        let mut orders = self.orders.write().map_err(poisoned)?;

        if orders.get(&order.session_id).is_some_and(Order::is_fulfilled) {
            return Ok(());
        }

        order.status = OrderStatus::PaymentFailed;
        order.updated_at = Utc::now();
        orders.insert(order.session_id.clone(), order);
        Ok(())
    }

    fn get(&self, session_id: &str) -> Result<Option<Order>> {
        let orders = self.orders.read().map_err(poisoned)?;
        Ok(orders.get(session_id).cloned())
    }
}
