use crate::domain::error::MarketError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Newtype over the domain error so axum can render it.
#[derive(Debug)]
pub struct ApiError(pub MarketError);

impl From<MarketError> for ApiError {
    fn from(err: MarketError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            MarketError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            MarketError::Forbidden(_) => StatusCode::FORBIDDEN,
            MarketError::NotFound(_) => StatusCode::NOT_FOUND,
            MarketError::InvalidTransition(_)
            | MarketError::Conflict(_)
            | MarketError::LimitExceeded(_) => StatusCode::CONFLICT,
            MarketError::InvalidCoupon(_)
            | MarketError::MinimumSpendNotMet(_)
            | MarketError::WebhookSignature(_) => StatusCode::BAD_REQUEST,
            MarketError::Gateway(_) => StatusCode::BAD_GATEWAY,
            MarketError::Database(_)
            | MarketError::Migration(_)
            | MarketError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match &self.0 {
            MarketError::Validation(_) => "validation_error",
            MarketError::Forbidden(_) => "forbidden",
            MarketError::NotFound(_) => "not_found",
            MarketError::InvalidTransition(_) => "invalid_transition",
            MarketError::Conflict(_) => "conflict",
            MarketError::InvalidCoupon(_) => "invalid_coupon",
            MarketError::LimitExceeded(_) => "coupon_limit_exceeded",
            MarketError::MinimumSpendNotMet(_) => "minimum_spend_not_met",
            MarketError::WebhookSignature(_) => "webhook_error",
            MarketError::Gateway(_) => "gateway_error",
            MarketError::Database(_)
            | MarketError::Migration(_)
            | MarketError::Serialization(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self.0 {
            MarketError::Validation(msg)
            | MarketError::Forbidden(msg)
            | MarketError::NotFound(msg)
            | MarketError::InvalidTransition(msg)
            | MarketError::Conflict(msg)
            | MarketError::InvalidCoupon(msg)
            | MarketError::LimitExceeded(msg)
            | MarketError::MinimumSpendNotMet(msg) => msg.clone(),
            MarketError::WebhookSignature(msg) => {
                tracing::warn!("webhook rejected: {msg}");
                "invalid webhook signature".to_string()
            }
            MarketError::Gateway(msg) => {
                tracing::error!("payment gateway error: {msg}");
                "payment gateway unavailable".to_string()
            }
            MarketError::Database(err) => {
                tracing::error!("database error: {err}");
                "internal error".to_string()
            }
            MarketError::Migration(err) => {
                tracing::error!("migration error: {err}");
                "internal error".to_string()
            }
            MarketError::Serialization(err) => {
                tracing::error!("serialization error: {err}");
                "internal error".to_string()
            }
        };

        let body = serde_json::json!({
            "error_code": self.error_code(),
            "message": message,
        });

        (self.status(), Json(body)).into_response()
    }
}
