use {
    crate::domain::{
        error::MarketError,
        store::Store,
        subscription::{Subscription, SubscriptionFlags},
    },
    serde::Serialize,
    uuid::Uuid,
};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionView {
    #[serde(flatten)]
    pub flags: SubscriptionFlags,
    pub active: Option<Subscription>,
}

pub async fn current(store: &dyn Store, owner_id: Uuid) -> Result<SubscriptionView, MarketError> {
    let mut uow = store.begin().await?;
    let flags = uow.subscription_flags(owner_id).await?;
    let active = uow.active_subscription(owner_id).await?;
    Ok(SubscriptionView { flags, active })
}
