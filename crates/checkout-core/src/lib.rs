//! # checkout-core
//!
//! Webhook event model and the subscribe/dispatch delegator.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────────────────────────────────┐
//! │   verified   │     │                Delegator                 │
//! │    Event     │────▶│  checkout.session.completed ─▶ [L1, L2]  │
//! │              │     │  checkout.session.expired   ─▶ [L3]      │
//! └──────────────┘     └──────────────────────────────────────────┘
//! ```
//!
//! Listeners run in registration order. Unknown event names are ignored.
//!
//! ```rust,ignore
//! use checkout_core::{Delegator, Event, FnListener};
//!
//! let mut delegator = Delegator::new();
//! delegator.subscribe("checkout.session.completed", FnListener::new("log", |event: &Event| {
//!     tracing::info!(id = %event.id, "completed");
//!     Ok(())
//! }));
//!
//! let report = delegator.dispatch(&event).await;
//! ```

pub mod delegator;
pub mod error;
pub mod event;

pub use delegator::{Delegator, DispatchReport, FnListener, Listener, ListenerFailure};
pub use error::{HookError, Result};
pub use event::{Event, EventData, PAYMENT_STATUS_PAID, names};
