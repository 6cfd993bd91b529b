use {
    crate::{
        domain::money::Currency,
        services::{checkout::CheckoutConfig, sweeper::SweeperSettings},
    },
    std::{env, net::SocketAddr, time::Duration},
    thiserror::Error,
};

/// Stripe keeps a Checkout Session open for at most a day.
pub const MAX_SESSION_TTL_HOURS: i64 = 24;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} is invalid: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Process settings, read from the environment (and `.env` via dotenvy in
/// `main`).
#[derive(Debug, Clone)]
pub struct Settings {
    /// `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub listen_addr: SocketAddr,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub currency: Currency,
    /// Externally reachable base of this service, used in gateway redirects.
    pub public_base_url: String,
    pub success_redirect_url: String,
    pub failure_redirect_url: String,
    pub session_ttl_hours: i64,
    pub sweep_interval: Duration,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &'static str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let listen_addr = match get("LISTEN_ADDR") {
            Some(raw) => raw.parse().map_err(|e| ConfigError::Invalid {
                key: "LISTEN_ADDR",
                message: format!("{e}"),
            })?,
            None => SocketAddr::from(([0, 0, 0, 0], 3000)),
        };

        let currency = match get("CURRENCY") {
            Some(raw) => {
                Currency::try_from(raw.to_lowercase().as_str()).map_err(|e| {
                    ConfigError::Invalid {
                        key: "CURRENCY",
                        message: e.to_string(),
                    }
                })?
            }
            None => Currency::Usd,
        };

        let public_base_url = require("PUBLIC_BASE_URL")?.trim_end_matches('/').to_string();

        Ok(Self {
            database_url: get("DATABASE_URL"),
            listen_addr,
            stripe_secret_key: require("STRIPE_SECRET_KEY")?,
            stripe_webhook_secret: require("STRIPE_WEBHOOK_SECRET")?,
            currency,
            success_redirect_url: get("SUCCESS_REDIRECT_URL")
                .unwrap_or_else(|| format!("{public_base_url}/payment/success")),
            failure_redirect_url: get("FAILURE_REDIRECT_URL")
                .unwrap_or_else(|| format!("{public_base_url}/payment/failure")),
            public_base_url,
            session_ttl_hours: bounded(
                get("SESSION_TTL_HOURS"),
                "SESSION_TTL_HOURS",
                24,
                MAX_SESSION_TTL_HOURS,
            )?,
            sweep_interval: Duration::from_secs(
                bounded(get("SWEEP_INTERVAL_SECS"), "SWEEP_INTERVAL_SECS", 300, i64::MAX)?
                    .unsigned_abs(),
            ),
        })
    }

    pub fn checkout_config(&self) -> CheckoutConfig {
        CheckoutConfig {
            currency: self.currency,
            // Stripe substitutes the placeholder with the real session id.
            success_url: format!(
                "{}/payment/confirm-payment?session_id={{CHECKOUT_SESSION_ID}}",
                self.public_base_url
            ),
            cancel_url: format!("{}/payment/cancel", self.public_base_url),
            session_ttl: chrono::Duration::hours(self.session_ttl_hours),
        }
    }

    pub fn sweeper_settings(&self) -> SweeperSettings {
        SweeperSettings {
            interval: self.sweep_interval,
            session_ttl: chrono::Duration::hours(self.session_ttl_hours),
        }
    }
}

fn bounded(
    raw: Option<String>,
    key: &'static str,
    default: i64,
    max: i64,
) -> Result<i64, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().parse::<i64>() {
        Ok(v) if (1..=max).contains(&v) => Ok(v),
        Ok(v) => Err(ConfigError::Invalid {
            key,
            message: format!("must be between 1 and {max}, got {v}"),
        }),
        Err(e) => Err(ConfigError::Invalid {
            key,
            message: e.to_string(),
        }),
    }
}
