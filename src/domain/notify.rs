use {
    super::error::MarketError,
    serde::Serialize,
    std::{future::Future, pin::Pin},
    uuid::Uuid,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    OrderCreated,
    OrderStatusChanged,
    ExtensionRequested,
    ExtensionAnswered,
    PaymentCompleted,
    PaymentFailed,
    WorkshopRegistered,
    SubscriptionRenewed,
    /// Sent to operators: a discount was granted past the coupon's limit.
    CouponLimitExceeded,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub actor_id: Uuid,
    pub target_id: Uuid,
    pub context: serde_json::Value,
}

impl Notification {
    pub fn new(
        kind: NotificationKind,
        actor_id: Uuid,
        target_id: Uuid,
        context: serde_json::Value,
    ) -> Self {
        Self {
            kind,
            actor_id,
            target_id,
            context,
        }
    }
}

/// Delivery channel owned by another service (email, push, chat).
pub trait Notifier: Send + Sync {
    fn notify(
        &self,
        notification: Notification,
    ) -> Pin<Box<dyn Future<Output = Result<(), MarketError>> + Send + '_>>;
}
