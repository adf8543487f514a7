//! Webhook Delegator
//!
//! Registry mapping an event name to an ordered list of listeners.
//! The registry is filled at startup and then only read: `dispatch` looks up
//! the event name and awaits each listener in registration order.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{HookError, Result};
use crate::event::Event;

/// Listener trait - implement to react to a webhook event
#[async_trait]
pub trait Listener: Send + Sync {
    /// Name used in logs and dispatch reports
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Handle one event
    async fn handle(&self, event: &Event) -> Result<()>;
}

/// Adapter turning a plain closure into a [`Listener`]
pub struct FnListener<F> {
    name: String,
    f: F,
}

impl<F> FnListener<F>
where
    F: Fn(&Event) -> Result<()> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

#[async_trait]
impl<F> Listener for FnListener<F>
where
    F: Fn(&Event) -> Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, event: &Event) -> Result<()> {
        (self.f)(event)
    }
}

/// A listener that returned an error during dispatch
#[derive(Debug)]
pub struct ListenerFailure {
    pub listener: String,
    pub error: HookError,
}

/// Outcome of dispatching one event
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Name of the dispatched event
    pub event_name: String,

    /// Number of listener invocations
    pub invoked: usize,

    /// Listeners that failed, in invocation order
    pub failures: Vec<ListenerFailure>,
}

impl DispatchReport {
    /// No listener failed
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Nothing was registered for the event
    pub const fn is_noop(&self) -> bool {
        self.invoked == 0
    }

    /// Some listener failed in a way a redelivery could fix
    pub fn needs_redelivery(&self) -> bool {
        self.failures.iter().any(|f| f.error.is_retryable())
    }
}

/// Event-name keyed listener registry
#[derive(Default)]
pub struct Delegator {
    listeners: HashMap<String, Vec<Arc<dyn Listener>>>,
}

impl Delegator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a listener for `event_name`
    pub fn subscribe<L: Listener + 'static>(
        &mut self,
        event_name: impl Into<String>,
        listener: L,
    ) {
        self.subscribe_shared(event_name, Arc::new(listener));
    }

    /// Append an already shared listener for `event_name`
    ///
    /// The same listener may be subscribed more than once; it is then
    /// invoked once per subscription.
    pub fn subscribe_shared(
        &mut self,
        event_name: impl Into<String>,
        listener: Arc<dyn Listener>,
    ) {
        let event_name = event_name.into();
        tracing::debug!(event_type = %event_name, listener = listener.name(), "Subscribed listener");
        self.listeners.entry(event_name).or_default().push(listener);
    }

    /// Subscribe one listener to several event names
    pub fn subscribe_many<I, S>(&mut self, event_names: I, listener: Arc<dyn Listener>)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in event_names {
            self.subscribe_shared(name, listener.clone());
        }
    }

    /// Invoke every listener registered for `event.name`, in order
    ///
    /// Unknown event names are ignored. A failing listener is logged and
    /// recorded in the report; the remaining listeners still run.
    pub async fn dispatch(&self, event: &Event) -> DispatchReport {
        let mut report = DispatchReport {
            event_name: event.name.clone(),
            ..Default::default()
        };

        let Some(listeners) = self.listeners.get(&event.name) else {
            tracing::debug!(event_id = %event.id, event_type = %event.name, "No listeners for event");
            return report;
        };

        for listener in listeners {
            report.invoked += 1;

            if let Err(error) = listener.handle(event).await {
                tracing::error!(
                    event_id = %event.id,
                    event_type = %event.name,
                    listener = listener.name(),
                    error = %error,
                    "Listener failed"
                );
                report.failures.push(ListenerFailure {
                    listener: listener.name().to_string(),
                    error,
                });
            }
        }

        tracing::info!(
            event_id = %event.id,
            event_type = %event.name,
            invoked = report.invoked,
            failed = report.failures.len(),
            "Dispatched webhook event"
        );

        report
    }

    /// Number of listener registrations for an event name
    pub fn listener_count(&self, event_name: &str) -> usize {
        self.listeners.get(event_name).map_or(0, Vec::len)
    }

    /// Whether anything listens to `event_name`
    pub fn has_listeners(&self, event_name: &str) -> bool {
        self.listener_count(event_name) > 0
    }

    /// Event names with at least one listener
    pub fn event_names(&self) -> Vec<&str> {
        self.listeners.keys().map(String::as_str).collect()
    }

    /// Total number of registrations across all event names
    pub fn len(&self) -> usize {
        self.listeners.values().map(Vec::len).sum()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::names;
    use serde_json::json;
    use std::sync::Mutex;

    struct Recorder {
        label: &'static str,
        calls: Arc<Mutex<Vec<(String, String)>>>,
    }

    #[async_trait]
    impl Listener for Recorder {
        fn name(&self) -> &str {
            self.label
        }

        async fn handle(&self, event: &Event) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push((self.label.to_string(), event.id.clone()));
            Ok(())
        }
    }

    fn paid_event() -> Event {
        Event::new(
            names::CHECKOUT_SESSION_COMPLETED,
            json!({"id": "cs_1", "payment_status": "paid"}),
        )
        .with_id("evt_1")
    }

    #[tokio::test]
    async fn test_dispatch_in_registration_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut delegator = Delegator::new();
        for label in ["first", "second", "third"] {
            delegator.subscribe(
                names::CHECKOUT_SESSION_COMPLETED,
                Recorder { label, calls: calls.clone() },
            );
        }

        let report = delegator.dispatch(&paid_event()).await;

        assert!(report.is_success());
        assert_eq!(report.invoked, 3);
        let labels: Vec<String> = calls.lock().unwrap().iter().map(|(l, _)| l.clone()).collect();
        assert_eq!(labels, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_listener_receives_the_event() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut delegator = Delegator::new();
        delegator.subscribe(
            names::CHECKOUT_SESSION_COMPLETED,
            FnListener::new("capture", move |event: &Event| {
                sink.lock().unwrap().push(event.clone());
                Ok(())
            }),
        );

        let event = paid_event();
        delegator.dispatch(&event).await;

        assert_eq!(*seen.lock().unwrap(), vec![event]);
    }

    #[tokio::test]
    async fn test_unknown_event_is_noop() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut delegator = Delegator::new();
        delegator.subscribe(
            names::CHECKOUT_SESSION_COMPLETED,
            Recorder { label: "only", calls: calls.clone() },
        );

        let event = Event::new("invoice.paid", json!({}));
        let report = delegator.dispatch(&event).await;

        assert!(report.is_noop());
        assert!(report.is_success());
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_subscription_runs_twice() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let listener: Arc<dyn Listener> = Arc::new(Recorder { label: "dup", calls: calls.clone() });
        let mut delegator = Delegator::new();
        delegator.subscribe_shared(names::CHECKOUT_SESSION_COMPLETED, listener.clone());
        delegator.subscribe_shared(names::CHECKOUT_SESSION_COMPLETED, listener);

        let report = delegator.dispatch(&paid_event()).await;

        assert_eq!(report.invoked, 2);
        assert_eq!(calls.lock().unwrap().len(), 2);
        assert_eq!(delegator.listener_count(names::CHECKOUT_SESSION_COMPLETED), 2);
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_dispatch() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut delegator = Delegator::new();
        delegator.subscribe(
            names::CHECKOUT_SESSION_COMPLETED,
            FnListener::new("broken", |_: &Event| Err(HookError::Other("boom".into()))),
        );
        delegator.subscribe(
            names::CHECKOUT_SESSION_COMPLETED,
            Recorder { label: "after", calls: calls.clone() },
        );

        let report = delegator.dispatch(&paid_event()).await;

        assert!(!report.is_success());
        assert!(report.needs_redelivery());
        assert_eq!(report.invoked, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].listener, "broken");
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_payload_failure_is_not_redelivered() {
        let mut delegator = Delegator::new();
        delegator.subscribe(
            names::CHECKOUT_SESSION_COMPLETED,
            FnListener::new("strict", |_: &Event| Err(HookError::Parse("no id".into()))),
        );

        let report = delegator.dispatch(&paid_event()).await;

        assert!(!report.is_success());
        assert!(!report.needs_redelivery());
    }

    #[test]
    fn test_subscribe_many() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut delegator = Delegator::new();
        delegator.subscribe_many(
            [
                names::CHECKOUT_SESSION_COMPLETED,
                names::CHECKOUT_SESSION_ASYNC_PAYMENT_SUCCEEDED,
            ],
            Arc::new(Recorder { label: "fulfil", calls }),
        );

        assert_eq!(delegator.len(), 2);
        assert!(delegator.has_listeners(names::CHECKOUT_SESSION_ASYNC_PAYMENT_SUCCEEDED));
        assert!(!delegator.has_listeners(names::CHECKOUT_SESSION_ASYNC_PAYMENT_FAILED));
        assert_eq!(delegator.event_names().len(), 2);
    }
}
