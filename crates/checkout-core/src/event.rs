//! Webhook Events
//!
//! The event envelope delivered by the payment processor. The payload under
//! `data.object` is kept as opaque JSON; listeners pick out the fields they
//! care about.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{HookError, Result};

/// Event names used by the hosted checkout flow
pub mod names {
    pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";
    pub const CHECKOUT_SESSION_ASYNC_PAYMENT_SUCCEEDED: &str =
        "checkout.session.async_payment_succeeded";
    pub const CHECKOUT_SESSION_ASYNC_PAYMENT_FAILED: &str =
        "checkout.session.async_payment_failed";
}

/// Payment status value that marks a session as settled
pub const PAYMENT_STATUS_PAID: &str = "paid";

/// An inbound webhook event
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Processor event ID (`evt_...`)
    #[serde(default)]
    pub id: String,

    /// Event name, e.g. `checkout.session.completed`
    #[serde(rename = "type")]
    pub name: String,

    /// Creation time in unix seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,

    /// Whether the event came from live mode
    #[serde(default)]
    pub livemode: bool,

    /// Event payload
    pub data: EventData,
}

/// Payload wrapper (`data` in the envelope)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventData {
    /// The object the event is about (a checkout session, an invoice, ...)
    pub object: serde_json::Value,

    /// Fields that changed, for `*.updated` events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_attributes: Option<serde_json::Value>,
}

impl Event {
    /// Create an event with the given name and payload object
    pub fn new(name: impl Into<String>, object: serde_json::Value) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            created: None,
            livemode: false,
            data: EventData {
                object,
                previous_attributes: None,
            },
        }
    }

    /// Set the event ID
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Parse an event from the raw webhook body
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        let event: Self = serde_json::from_slice(body)?;
        if event.name.is_empty() {
            return Err(HookError::Parse("event has no type".into()));
        }
        Ok(event)
    }

    /// Read a string field of `data.object`
    pub fn object_str(&self, field: &str) -> Option<&str> {
        self.data.object.get(field).and_then(serde_json::Value::as_str)
    }

    /// ID of the object the event is about
    pub fn object_id(&self) -> Option<&str> {
        self.object_str("id")
    }

    /// `data.object.payment_status`, present on checkout session events
    pub fn payment_status(&self) -> Option<&str> {
        self.object_str("payment_status")
    }

    /// Whether the payload reports a settled payment
    pub fn is_paid(&self) -> bool {
        self.payment_status() == Some(PAYMENT_STATUS_PAID)
    }

    /// Creation time, if the processor sent one
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created.and_then(|secs| Utc.timestamp_opt(secs, 0).single())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_processor_payload() {
        let body = json!({
            "id": "evt_1",
            "object": "event",
            "type": "checkout.session.completed",
            "created": 1_700_000_000,
            "livemode": false,
            "data": {
                "object": {
                    "id": "cs_test_1",
                    "object": "checkout.session",
                    "payment_status": "paid"
                }
            }
        });

        let event = Event::from_slice(body.to_string().as_bytes()).unwrap();
        assert_eq!(event.id, "evt_1");
        assert_eq!(event.name, names::CHECKOUT_SESSION_COMPLETED);
        assert_eq!(event.object_id(), Some("cs_test_1"));
        assert!(event.is_paid());
        assert_eq!(event.created_at().unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_missing_type_is_rejected() {
        let body = br#"{"id":"evt_1","type":"","data":{"object":{}}}"#;
        assert!(matches!(Event::from_slice(body), Err(HookError::Parse(_))));

        let body = br#"{"id":"evt_1","data":{"object":{}}}"#;
        assert!(matches!(Event::from_slice(body), Err(HookError::Json(_))));
    }

    #[test]
    fn test_unpaid_session() {
        let event = Event::new(
            names::CHECKOUT_SESSION_COMPLETED,
            json!({"payment_status": "unpaid"}),
        );
        assert_eq!(event.payment_status(), Some("unpaid"));
        assert!(!event.is_paid());
    }
}
