//! Stripe Checkout and Billing Portal
//!
//! Creates processor-hosted sessions. The caller redirects the browser to
//! the returned `url` (303 See Other from a server handler).

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use stripe::{
    BillingPortalSession, CheckoutSession as StripeCheckoutSession, CheckoutSessionId,
    CheckoutSessionMode, Client, CreateBillingPortalSession, CreateCheckoutSession,
    CreateCheckoutSessionLineItems, CustomerId,
};

use crate::error::{PaymentError, Result};

/// Placeholder Stripe replaces with the real session ID on redirect
pub const SESSION_ID_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

/// Query parameter carrying the session ID back to our pages
pub const SESSION_ID_PARAM: &str = "session_id";

/// Stripe client wrapper
pub struct StripeClient {
    client: Client,
    webhook_secret: String,
}

impl StripeClient {
    /// Create a new Stripe client
    pub fn new(secret_key: &str, webhook_secret: &str) -> Self {
        Self {
            client: Client::new(secret_key),
            webhook_secret: webhook_secret.to_string(),
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let secret_key = std::env::var("STRIPE_SECRET_KEY")
            .map_err(|_| PaymentError::Config("STRIPE_SECRET_KEY not set".into()))?;
        let webhook_secret = std::env::var("STRIPE_WEBHOOK_SECRET")
            .map_err(|_| PaymentError::Config("STRIPE_WEBHOOK_SECRET not set".into()))?;

        Ok(Self::new(&secret_key, &webhook_secret))
    }

    /// Get the webhook secret
    pub fn webhook_secret(&self) -> &str {
        &self.webhook_secret
    }

    /// Create a hosted Checkout session
    ///
    /// Success and cancel URLs get a `session_id` placeholder appended so the
    /// landing page can look the session up.
    pub async fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession> {
        let success_url = with_session_id(&request.success_url);
        let cancel_url = with_session_id(&request.cancel_url);

        let mut params = CreateCheckoutSession::new();
        params.success_url = Some(&success_url);
        params.cancel_url = Some(&cancel_url);
        params.mode = Some(request.mode.into());
        params.customer_email = request.customer_email.as_deref();
        params.client_reference_id = request.client_reference_id.as_deref();
        params.line_items = Some(vec![CreateCheckoutSessionLineItems {
            price: Some(request.price.clone()),
            quantity: Some(request.quantity),
            ..Default::default()
        }]);

        let session = StripeCheckoutSession::create(&self.client, params)
            .await
            .map_err(|e| PaymentError::Stripe(e.to_string()))?;

        let url = session
            .url
            .ok_or_else(|| PaymentError::Stripe("No checkout URL returned".into()))?;

        tracing::info!(
            session_id = %session.id,
            mode = request.mode.as_str(),
            "Created checkout session"
        );

        Ok(CheckoutSession {
            id: session.id.to_string(),
            url,
        })
    }

    /// Look up a checkout session (used by the success page)
    pub async fn retrieve_checkout_session(&self, session_id: &str) -> Result<SessionSummary> {
        let id = session_id
            .parse::<CheckoutSessionId>()
            .map_err(|e| PaymentError::InvalidId(format!("session '{session_id}': {e}")))?;

        let session = StripeCheckoutSession::retrieve(&self.client, &id, &[])
            .await
            .map_err(|e| PaymentError::Stripe(e.to_string()))?;

        Ok(SessionSummary {
            session_id: session.id.to_string(),
            payment_status: session.payment_status.to_string(),
            customer: session.customer.as_ref().map(|c| c.id().to_string()),
        })
    }

    /// Create a Billing Portal session
    ///
    /// The customer is taken from the request, or resolved from a completed
    /// checkout session.
    pub async fn create_portal_session(&self, request: PortalRequest) -> Result<PortalSession> {
        let customer = match (request.customer, request.session_id) {
            (Some(customer), _) => customer,
            (None, Some(session_id)) => {
                let summary = self.retrieve_checkout_session(&session_id).await?;
                summary
                    .customer
                    .ok_or(PaymentError::MissingCustomer(session_id))?
            }
            (None, None) => {
                return Err(PaymentError::MissingCustomer(
                    "neither customer nor session_id given".into(),
                ));
            }
        };

        let customer_id = customer
            .parse::<CustomerId>()
            .map_err(|e| PaymentError::InvalidId(format!("customer '{customer}': {e}")))?;

        let mut params = CreateBillingPortalSession::new(customer_id);
        params.return_url = Some(&request.return_url);

        let session = BillingPortalSession::create(&self.client, params)
            .await
            .map_err(|e| PaymentError::Stripe(e.to_string()))?;

        tracing::info!(customer = %customer, "Created billing portal session");

        Ok(PortalSession {
            id: session.id.to_string(),
            url: session.url,
        })
    }
}

/// Append `session_id={CHECKOUT_SESSION_ID}` to a redirect target
///
/// URLs that already carry the placeholder are returned unchanged. The
/// placeholder is inserted before any fragment.
pub fn with_session_id(url: &str) -> String {
    if url.contains(SESSION_ID_PLACEHOLDER) {
        return url.to_string();
    }

    let (base, fragment) = match url.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (url, None),
    };

    let separator = if !base.contains('?') {
        "?"
    } else if base.ends_with('?') || base.ends_with('&') {
        ""
    } else {
        "&"
    };

    let mut out = format!("{base}{separator}{SESSION_ID_PARAM}={SESSION_ID_PLACEHOLDER}");
    if let Some(fragment) = fragment {
        out.push('#');
        out.push_str(fragment);
    }
    out
}

/// Checkout mode
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckoutMode {
    /// One-off payment
    #[default]
    Payment,
    /// Recurring subscription
    Subscription,
}

impl CheckoutMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Payment => "payment",
            Self::Subscription => "subscription",
        }
    }
}

impl FromStr for CheckoutMode {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "payment" => Ok(Self::Payment),
            "subscription" => Ok(Self::Subscription),
            other => Err(PaymentError::Config(format!("unknown checkout mode: {other}"))),
        }
    }
}

impl From<CheckoutMode> for CheckoutSessionMode {
    fn from(mode: CheckoutMode) -> Self {
        match mode {
            CheckoutMode::Payment => Self::Payment,
            CheckoutMode::Subscription => Self::Subscription,
        }
    }
}

/// Request to create a checkout session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutRequest {
    /// Stripe price ID (`price_...`)
    pub price: String,

    /// Quantity of the price
    #[serde(default = "default_quantity")]
    pub quantity: u64,

    /// Payment or subscription
    #[serde(default)]
    pub mode: CheckoutMode,

    /// Prefill the customer's email
    #[serde(default)]
    pub customer_email: Option<String>,

    /// URL to redirect after successful payment
    pub success_url: String,

    /// URL to redirect if checkout is cancelled
    pub cancel_url: String,

    /// Our own reference (order/user ID) echoed back in webhooks
    #[serde(default)]
    pub client_reference_id: Option<String>,
}

const fn default_quantity() -> u64 {
    1
}

/// Result of creating a checkout session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Stripe session ID
    pub id: String,

    /// URL to redirect user to
    pub url: String,
}

/// What the success page needs to know about a session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub payment_status: String,
    pub customer: Option<String>,
}

/// Request to create a billing portal session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PortalRequest {
    /// Stripe customer ID (`cus_...`)
    #[serde(default)]
    pub customer: Option<String>,

    /// Completed checkout session to take the customer from
    #[serde(default)]
    pub session_id: Option<String>,

    /// Where the portal sends the customer back to
    pub return_url: String,
}

/// Result of creating a billing portal session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PortalSession {
    pub id: String,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_appended() {
        assert_eq!(
            with_session_id("https://shop.example/success"),
            "https://shop.example/success?session_id={CHECKOUT_SESSION_ID}"
        );
        assert_eq!(
            with_session_id("https://shop.example/success?ref=mail"),
            "https://shop.example/success?ref=mail&session_id={CHECKOUT_SESSION_ID}"
        );
        assert_eq!(
            with_session_id("https://shop.example/success?"),
            "https://shop.example/success?session_id={CHECKOUT_SESSION_ID}"
        );
    }

    #[test]
    fn test_session_id_not_duplicated() {
        let url = "https://shop.example/success?session_id={CHECKOUT_SESSION_ID}";
        assert_eq!(with_session_id(url), url);
    }

    #[test]
    fn test_session_id_before_fragment() {
        assert_eq!(
            with_session_id("https://shop.example/cancel#cart"),
            "https://shop.example/cancel?session_id={CHECKOUT_SESSION_ID}#cart"
        );
    }

    #[test]
    fn test_checkout_mode() {
        assert_eq!("Subscription".parse::<CheckoutMode>().unwrap(), CheckoutMode::Subscription);
        assert_eq!(CheckoutMode::default(), CheckoutMode::Payment);
        assert!("setup".parse::<CheckoutMode>().is_err());
        assert_eq!(CheckoutMode::Payment.as_str(), "payment");
    }

    #[tokio::test]
    async fn test_malformed_ids_rejected_before_any_request() {
        let client = StripeClient::new("sk_test_dummy", "whsec_test");

        let err = client.retrieve_checkout_session("bogus").await.unwrap_err();
        assert!(matches!(err, PaymentError::InvalidId(_)));

        let err = client
            .create_portal_session(PortalRequest {
                customer: Some("bogus".into()),
                session_id: None,
                return_url: "https://shop.example/".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::InvalidId(_)));
    }

    #[test]
    fn test_checkout_request_defaults() {
        let request: CheckoutRequest = serde_json::from_str(
            r#"{"price":"price_123","success_url":"https://a/s","cancel_url":"https://a/c"}"#,
        )
        .unwrap();
        assert_eq!(request.quantity, 1);
        assert_eq!(request.mode, CheckoutMode::Payment);
        assert!(request.customer_email.is_none());
    }
}
