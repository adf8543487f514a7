//! Server Configuration
//!
//! Read from the environment (after `.env` is loaded). Stripe credentials
//! are handled separately by `StripeClient::from_env` so the server can run
//! with payments disabled.

use anyhow::Context;

use checkout_payments::DEFAULT_TOLERANCE_SECS;

#[derive(Clone, Debug)]
pub struct Config {
    /// Socket address to listen on
    pub bind_addr: String,

    /// Public base URL of this site, used for redirect targets
    pub app_url: String,

    /// Price used when a checkout request names none
    pub default_price: Option<String>,

    /// Allowed webhook timestamp skew
    pub webhook_tolerance_secs: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".into(),
            app_url: "http://localhost:3000".into(),
            default_price: None,
            webhook_tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let webhook_tolerance_secs = match std::env::var("WEBHOOK_TOLERANCE_SECS") {
            Ok(v) => v
                .parse()
                .with_context(|| format!("WEBHOOK_TOLERANCE_SECS is not a number: {v}"))?,
            Err(_) => defaults.webhook_tolerance_secs,
        };

        Ok(Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            app_url: std::env::var("APP_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.app_url),
            default_price: std::env::var("STRIPE_PRICE_ID").ok().filter(|p| !p.is_empty()),
            webhook_tolerance_secs,
        })
    }

    /// Absolute URL for a path on this site
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.app_url, path)
    }
}
