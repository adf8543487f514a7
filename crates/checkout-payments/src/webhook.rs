//! Stripe Webhook Verification
//!
//! Checks the `Stripe-Signature` header against the raw request body and
//! turns the body into a [`checkout_core::Event`].
//!
//! Header format: `t=<unix seconds>,v1=<hex>[,v1=<hex>...]`. The signed
//! message is `"{t}.{body}"`, keyed with the endpoint's webhook secret.

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use checkout_core::Event;

use crate::error::{PaymentError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Name of the header carrying the signature
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Default allowed clock difference, in seconds
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Parsed `Stripe-Signature` header
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    /// Parse the header value
    ///
    /// Only `v1` entries are kept; `v0` and unknown schemes are skipped.
    pub fn parse(header: &str) -> Result<Self> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for part in header.split(',') {
            let Some((key, value)) = part.trim().split_once('=') else {
                continue;
            };
            match key {
                "t" => {
                    let t = value.parse::<i64>().map_err(|_| {
                        PaymentError::WebhookSignature(format!("bad timestamp '{value}'"))
                    })?;
                    timestamp = Some(t);
                }
                "v1" => {
                    let sig = hex::decode(value).map_err(|e| {
                        PaymentError::WebhookSignature(format!("bad v1 signature: {e}"))
                    })?;
                    signatures.push(sig);
                }
                _ => {}
            }
        }

        let timestamp = timestamp
            .ok_or_else(|| PaymentError::WebhookSignature("missing timestamp".into()))?;
        if signatures.is_empty() {
            return Err(PaymentError::WebhookSignature("missing v1 signature".into()));
        }

        Ok(Self {
            timestamp,
            signatures,
        })
    }
}

/// Compute the hex `v1` signature for a payload
pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String> {
    let mac = signed_mac(secret, timestamp, payload)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Build a complete header value, as Stripe would send it
pub fn signature_header(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String> {
    Ok(format!("t={timestamp},v1={}", sign_payload(secret, timestamp, payload)?))
}

fn signed_mac(secret: &str, timestamp: i64, payload: &[u8]) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| PaymentError::Config(format!("invalid webhook secret: {e}")))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Verifies webhook deliveries for one endpoint secret
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
    tolerance_secs: i64,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }

    /// Override the allowed clock difference
    #[must_use]
    pub fn with_tolerance(mut self, tolerance_secs: i64) -> Self {
        self.tolerance_secs = tolerance_secs;
        self
    }

    /// Check the signature header against the body at time `now`
    pub fn verify_at(&self, payload: &[u8], header: &str, now: i64) -> Result<()> {
        let header = SignatureHeader::parse(header)?;

        if now.abs_diff(header.timestamp) > self.tolerance_secs.unsigned_abs() {
            return Err(PaymentError::WebhookSignature(format!(
                "timestamp {} outside tolerance of {}s",
                header.timestamp, self.tolerance_secs
            )));
        }

        for expected in &header.signatures {
            let mac = signed_mac(&self.secret, header.timestamp, payload)?;
            if mac.verify_slice(expected).is_ok() {
                return Ok(());
            }
        }

        Err(PaymentError::WebhookSignature(
            "no signature matches the payload".into(),
        ))
    }

    /// Verify the delivery and parse the event
    pub fn construct_event(&self, payload: &[u8], header: &str) -> Result<Event> {
        self.construct_event_at(payload, header, Utc::now().timestamp())
    }

    /// [`Self::construct_event`] with an explicit clock
    pub fn construct_event_at(&self, payload: &[u8], header: &str, now: i64) -> Result<Event> {
        self.verify_at(payload, header, now)?;

        let event =
            Event::from_slice(payload).map_err(|e| PaymentError::WebhookParse(e.to_string()))?;

        tracing::debug!(event_id = %event.id, event_type = %event.name, "Verified webhook event");
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";
    const NOW: i64 = 1_700_000_000;
    const BODY: &[u8] = br#"{"id":"evt_1","type":"checkout.session.completed","data":{"object":{"id":"cs_1","payment_status":"paid"}}}"#;

    #[test]
    fn test_valid_signature() {
        let header = signature_header(SECRET, NOW, BODY).unwrap();
        let event = WebhookVerifier::new(SECRET)
            .construct_event_at(BODY, &header, NOW + 10)
            .unwrap();
        assert_eq!(event.id, "evt_1");
        assert!(event.is_paid());
    }

    #[test]
    fn test_any_v1_may_match() {
        let good = sign_payload(SECRET, NOW, BODY).unwrap();
        let header = format!("t={NOW},v1={},v1={good},v0=abc", "00".repeat(32));
        assert!(WebhookVerifier::new(SECRET).verify_at(BODY, &header, NOW).is_ok());
    }

    #[test]
    fn test_tampered_body() {
        let header = signature_header(SECRET, NOW, BODY).unwrap();
        let tampered = String::from_utf8_lossy(BODY).replace("paid", "unpaid");
        let err = WebhookVerifier::new(SECRET)
            .verify_at(tampered.as_bytes(), &header, NOW)
            .unwrap_err();
        assert!(matches!(err, PaymentError::WebhookSignature(_)));
    }

    #[test]
    fn test_wrong_secret() {
        let header = signature_header("whsec_other", NOW, BODY).unwrap();
        assert!(WebhookVerifier::new(SECRET).verify_at(BODY, &header, NOW).is_err());
    }

    #[test]
    fn test_stale_timestamp() {
        let header = signature_header(SECRET, NOW, BODY).unwrap();
        let verifier = WebhookVerifier::new(SECRET);
        assert!(verifier.verify_at(BODY, &header, NOW + DEFAULT_TOLERANCE_SECS + 1).is_err());
        assert!(verifier.verify_at(BODY, &header, NOW - DEFAULT_TOLERANCE_SECS - 1).is_err());
        assert!(verifier.with_tolerance(3600).verify_at(BODY, &header, NOW + 1000).is_ok());
    }

    #[test]
    fn test_tolerance_boundary_accepted() {
        let header = signature_header(SECRET, NOW, BODY).unwrap();
        let verifier = WebhookVerifier::new(SECRET);
        assert!(verifier.verify_at(BODY, &header, NOW + DEFAULT_TOLERANCE_SECS).is_ok());
        assert!(verifier.verify_at(BODY, &header, NOW - DEFAULT_TOLERANCE_SECS).is_ok());
    }

    #[test]
    fn test_extreme_timestamps_rejected() {
        let verifier = WebhookVerifier::new(SECRET);
        for t in [i64::MIN, i64::MAX] {
            let header = format!("t={t},v1={}", "00".repeat(32));
            let err = verifier.verify_at(BODY, &header, NOW).unwrap_err();
            assert!(matches!(err, PaymentError::WebhookSignature(_)));
        }
        // A clock at the far end of the range must not overflow either
        let header = signature_header(SECRET, NOW, BODY).unwrap();
        assert!(verifier.verify_at(BODY, &header, i64::MIN).is_err());
        assert!(verifier.verify_at(BODY, &header, i64::MAX).is_err());
    }

    #[test]
    fn test_malformed_headers() {
        for header in ["", "t=abc,v1=00", "v1=00", "t=1700000000", "t=1700000000,v1=zz"] {
            assert!(
                SignatureHeader::parse(header).is_err(),
                "header should be rejected: {header}"
            );
        }
    }

    #[test]
    fn test_bad_payload_after_valid_signature() {
        let body = b"not json";
        let header = signature_header(SECRET, NOW, body).unwrap();
        let err = WebhookVerifier::new(SECRET)
            .construct_event_at(body, &header, NOW)
            .unwrap_err();
        assert!(matches!(err, PaymentError::WebhookParse(_)));
    }
}
