//! Event order, gear order and workshop participant operations outside of
//! settlement. Every operation loads, mutates and persists inside one unit
//! of work; notifications go out after commit.

use {
    super::notifications,
    crate::domain::{
        actor::Actor,
        error::MarketError,
        event_order::{EventOrder, EventOrderStatus, StatusChange},
        gear_order::{GearOrder, GearOrderStatus},
        notify::{Notification, NotificationKind, Notifier},
        store::{Store, UnitOfWork},
        workshop::{ParticipantStatus, WorkshopParticipant},
    },
    chrono::{DateTime, Utc},
    serde::Deserialize,
    serde_json::json,
    std::sync::Arc,
    uuid::Uuid,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum NewEventOrder {
    Direct {
        package_id: Uuid,
    },
    Custom {
        provider_id: Uuid,
        description: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CancelAction {
    Request,
    Accept,
    Decline,
}

impl CancelAction {
    pub fn target(self) -> EventOrderStatus {
        match self {
            Self::Request => EventOrderStatus::CancelRequest,
            Self::Accept => EventOrderStatus::Cancelled,
            Self::Decline => EventOrderStatus::CancelRequestDeclined,
        }
    }
}

/// Visible event order: present and not soft-deleted.
async fn load_event_order(uow: &mut dyn UnitOfWork, id: Uuid) -> Result<EventOrder, MarketError> {
    uow.event_order(id)
        .await?
        .filter(|o| !o.is_deleted)
        .ok_or_else(|| MarketError::not_found("event order", id))
}

fn counterpart(order: &EventOrder, actor: &Actor) -> Uuid {
    if actor.is(order.requester_id) {
        order.provider_id
    } else {
        order.requester_id
    }
}

#[tracing::instrument(skip_all, fields(actor = %actor))]
pub async fn create_event_order(
    store: &dyn Store,
    notifier: &Arc<dyn Notifier>,
    actor: &Actor,
    request: NewEventOrder,
) -> Result<EventOrder, MarketError> {
    let now = Utc::now();
    let mut uow = store.begin().await?;

    let order = match request {
        NewEventOrder::Direct { package_id } => {
            let package = uow
                .service_package(package_id)
                .await?
                .ok_or_else(|| MarketError::not_found("service package", package_id))?;
            EventOrder::direct(actor.user_id, &package, now)?
        }
        NewEventOrder::Custom {
            provider_id,
            description,
        } => EventOrder::custom(actor.user_id, provider_id, description, now)?,
    };
    uow.insert_event_order(&order).await?;
    uow.commit().await?;

    tracing::info!(order_id = %order.id, kind = order.kind.as_str(), "event order created");
    notifications::dispatch(
        notifier,
        vec![Notification::new(
            NotificationKind::OrderCreated,
            actor.user_id,
            order.provider_id,
            json!({ "orderId": order.id, "kind": order.kind }),
        )],
    );
    Ok(order)
}

/// Parties and admins only.
pub async fn get_event_order(
    store: &dyn Store,
    actor: &Actor,
    id: Uuid,
) -> Result<EventOrder, MarketError> {
    let mut uow = store.begin().await?;
    let order = load_event_order(&mut *uow, id).await?;
    if !(order.is_party(actor) || actor.is_admin()) {
        return Err(MarketError::Forbidden(format!("{actor} is not a party to order {id}")));
    }
    Ok(order)
}

#[tracing::instrument(skip_all, fields(actor = %actor, order_id = %id))]
pub async fn change_event_order_status(
    store: &dyn Store,
    notifier: &Arc<dyn Notifier>,
    actor: &Actor,
    id: Uuid,
    target: EventOrderStatus,
    change: StatusChange,
) -> Result<EventOrder, MarketError> {
    let now = Utc::now();
    let mut uow = store.begin().await?;
    let mut order = load_event_order(&mut *uow, id).await?;
    let from = order.status();

    order.transition(actor, target, change, now)?;
    uow.update_event_order(&order).await?;
    uow.commit().await?;

    tracing::info!(order_id = %id, %from, to = %target, "event order status changed");
    notifications::dispatch(
        notifier,
        vec![Notification::new(
            NotificationKind::OrderStatusChanged,
            actor.user_id,
            counterpart(&order, actor),
            json!({ "orderId": id, "from": from, "to": target }),
        )],
    );
    Ok(order)
}

pub async fn cancel_event_order(
    store: &dyn Store,
    notifier: &Arc<dyn Notifier>,
    actor: &Actor,
    id: Uuid,
    action: CancelAction,
    reason: Option<String>,
) -> Result<EventOrder, MarketError> {
    let change = StatusChange {
        reason,
        acceptance: None,
    };
    change_event_order_status(store, notifier, actor, id, action.target(), change).await
}

#[tracing::instrument(skip_all, fields(actor = %actor, order_id = %id))]
pub async fn request_extension(
    store: &dyn Store,
    notifier: &Arc<dyn Notifier>,
    actor: &Actor,
    id: Uuid,
    new_delivery_date: DateTime<Utc>,
    reason: String,
) -> Result<EventOrder, MarketError> {
    let now = Utc::now();
    let mut uow = store.begin().await?;
    let mut order = load_event_order(&mut *uow, id).await?;

    let extension_id = order.request_extension(actor, new_delivery_date, reason, now)?;
    uow.update_event_order(&order).await?;
    uow.commit().await?;

    tracing::info!(order_id = %id, %extension_id, "extension requested");
    notifications::dispatch(
        notifier,
        vec![Notification::new(
            NotificationKind::ExtensionRequested,
            actor.user_id,
            order.requester_id,
            json!({ "orderId": id, "extensionId": extension_id, "newDeliveryDate": new_delivery_date }),
        )],
    );
    Ok(order)
}

#[tracing::instrument(skip_all, fields(actor = %actor, order_id = %id))]
pub async fn respond_extension(
    store: &dyn Store,
    notifier: &Arc<dyn Notifier>,
    actor: &Actor,
    id: Uuid,
    extension_id: Uuid,
    accept: bool,
) -> Result<EventOrder, MarketError> {
    let now = Utc::now();
    let mut uow = store.begin().await?;
    let mut order = load_event_order(&mut *uow, id).await?;

    order.respond_extension(actor, extension_id, accept, now)?;
    uow.update_event_order(&order).await?;
    uow.commit().await?;

    tracing::info!(order_id = %id, %extension_id, accept, "extension answered");
    notifications::dispatch(
        notifier,
        vec![Notification::new(
            NotificationKind::ExtensionAnswered,
            actor.user_id,
            order.provider_id,
            json!({ "orderId": id, "extensionId": extension_id, "accepted": accept }),
        )],
    );
    Ok(order)
}

pub async fn delete_event_order(
    store: &dyn Store,
    actor: &Actor,
    id: Uuid,
) -> Result<(), MarketError> {
    let mut uow = store.begin().await?;
    let mut order = load_event_order(&mut *uow, id).await?;
    order.soft_delete(actor)?;
    uow.update_event_order(&order).await?;
    uow.commit().await?;
    tracing::info!(order_id = %id, actor = %actor, "event order deleted");
    Ok(())
}

#[tracing::instrument(skip_all, fields(actor = %actor, order_id = %id))]
pub async fn change_gear_order_status(
    store: &dyn Store,
    notifier: &Arc<dyn Notifier>,
    actor: &Actor,
    id: Uuid,
    target: GearOrderStatus,
    reason: Option<String>,
) -> Result<GearOrder, MarketError> {
    let now = Utc::now();
    let mut uow = store.begin().await?;
    let mut order = uow
        .gear_order(id)
        .await?
        .filter(|o| !o.is_deleted)
        .ok_or_else(|| MarketError::not_found("gear order", id))?;
    let from = order.status();

    order.transition(actor, target, reason, now)?;
    uow.update_gear_order(&order).await?;
    uow.commit().await?;

    let notify = if actor.is(order.buyer_id) {
        order.seller_id
    } else {
        order.buyer_id
    };
    tracing::info!(gear_order_id = %id, %from, to = %target, "gear order status changed");
    notifications::dispatch(
        notifier,
        vec![Notification::new(
            NotificationKind::OrderStatusChanged,
            actor.user_id,
            notify,
            json!({ "gearOrderId": id, "from": from, "to": target }),
        )],
    );
    Ok(order)
}

#[tracing::instrument(skip_all, fields(actor = %actor, order_id = %id))]
pub async fn change_participant_status(
    store: &dyn Store,
    notifier: &Arc<dyn Notifier>,
    actor: &Actor,
    id: Uuid,
    target: ParticipantStatus,
    reason: Option<String>,
) -> Result<WorkshopParticipant, MarketError> {
    let now = Utc::now();
    let mut uow = store.begin().await?;
    let mut participant = uow
        .participant(id)
        .await?
        .filter(|p| !p.is_deleted)
        .ok_or_else(|| MarketError::not_found("workshop participant", id))?;
    let from = participant.status();

    participant.transition(actor, target, reason, now)?;
    uow.update_participant(&participant).await?;
    uow.commit().await?;

    let notify = if actor.is(participant.client_id) {
        participant.author_id
    } else {
        participant.client_id
    };
    tracing::info!(
        order_code = %participant.order_code,
        %from,
        to = %target,
        "participant status changed"
    );
    notifications::dispatch(
        notifier,
        vec![Notification::new(
            NotificationKind::OrderStatusChanged,
            actor.user_id,
            notify,
            json!({ "participantId": id, "orderCode": participant.order_code, "from": from, "to": target }),
        )],
    );
    Ok(participant)
}
