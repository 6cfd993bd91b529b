use thiserror::Error;

#[derive(Debug, Error)]
pub enum MarketError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid coupon: {0}")]
    InvalidCoupon(String),

    #[error("coupon usage limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("minimum spend not met: {0}")]
    MinimumSpendNotMet(String),

    #[error("payment gateway: {0}")]
    Gateway(String),

    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("webhook signature: {0}")]
    WebhookSignature(String),
}

impl MarketError {
    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{entity} {id}"))
    }
}
