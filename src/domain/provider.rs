use {
    super::error::MarketError,
    super::id::SessionId,
    super::money::{Currency, MoneyAmount},
    super::payment::GatewayStatus,
    chrono::{DateTime, Utc},
    std::{future::Future, pin::Pin},
    uuid::Uuid,
};

/// Everything the gateway needs to open a hosted checkout page. The whole
/// checkout is charged as a single aggregate line item.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub payment_id: Uuid,
    pub payer_id: Uuid,
    pub description: String,
    pub amount: MoneyAmount,
    pub currency: Currency,
    pub success_url: String,
    pub cancel_url: String,
    /// The hosted page stops accepting payment after this.
    pub expires_at: DateTime<Utc>,
}

/// What the service layer gets back after opening a session.
#[derive(Debug, Clone)]
pub struct HostedSession {
    pub id: SessionId,
    pub url: String,
}

pub trait PaymentProvider: Send + Sync {
    fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HostedSession, MarketError>> + Send + '_>>;

    fn payment_status(
        &self,
        id: &SessionId,
    ) -> Pin<Box<dyn Future<Output = Result<GatewayStatus, MarketError>> + Send + '_>>;

    /// Closes an open session so it can no longer be paid. Returns the
    /// session's final status: `Failed` once closed, `Succeeded` if the payer
    /// got there first.
    fn expire_checkout_session(
        &self,
        id: &SessionId,
    ) -> Pin<Box<dyn Future<Output = Result<GatewayStatus, MarketError>> + Send + '_>>;
}
