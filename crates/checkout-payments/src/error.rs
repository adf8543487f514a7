//! Payment Error Types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Stripe API error
    #[error("Stripe error: {0}")]
    Stripe(String),

    /// Webhook signature verification failed
    #[error("Webhook signature invalid: {0}")]
    WebhookSignature(String),

    /// Webhook payload parsing failed
    #[error("Webhook parse error: {0}")]
    WebhookParse(String),

    /// Malformed Stripe object ID (session or customer)
    #[error("Invalid ID: {0}")]
    InvalidId(String),

    /// Checkout session has no customer attached
    #[error("No customer for session: {0}")]
    MissingCustomer(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),
}

impl PaymentError {
    /// Check if this error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Stripe(_) | Self::Storage(_))
    }

    /// Get user-friendly message
    pub const fn user_message(&self) -> &str {
        match self {
            Self::Stripe(_) => "Payment processing failed. Please try again.",
            Self::WebhookSignature(_) => "Invalid webhook signature.",
            Self::WebhookParse(_) => "Invalid webhook payload.",
            Self::InvalidId(_) => "Invalid session or customer ID.",
            Self::MissingCustomer(_) => "No customer is associated with this checkout.",
            Self::Config(_) => "Service configuration error.",
            Self::Storage(_) => "An error occurred processing your request.",
        }
    }
}

impl From<PaymentError> for checkout_core::HookError {
    fn from(err: PaymentError) -> Self {
        if err.is_retryable() {
            Self::Other(err.to_string())
        } else {
            Self::Parse(err.to_string())
        }
    }
}
