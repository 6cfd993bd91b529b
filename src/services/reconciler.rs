use {
    super::{coupons, notifications},
    crate::domain::{
        actor::Actor,
        error::MarketError,
        event_order::{EventOrderStatus, StatusChange},
        gear_order::GearOrderStatus,
        id::SessionId,
        lifecycle::StatusLog,
        notify::{Notification, NotificationKind, Notifier},
        payment::{GatewayStatus, Payment, PaymentRefs, PaymentStatus, SettlementResult},
        provider::PaymentProvider,
        store::{Store, UnitOfWork},
        subscription::{Subscription, SubscriptionFlags, SubscriptionStatus},
        workshop::{
            ParticipantStatus, Payout, PayoutStatus, WORKSHOP_SEQUENCE, WorkshopParticipant,
            workshop_order_code,
        },
    },
    chrono::{DateTime, Utc},
    serde_json::json,
    std::sync::Arc,
    uuid::Uuid,
};

/// Failure reason recorded when the sweeper gives up on a session.
pub const EXPIRED_REASON: &str = "expired";

/// Settles a checkout session from the gateway's authoritative status.
/// Safe to call any number of times for the same session.
#[tracing::instrument(skip_all, fields(session_id = %session_id))]
pub async fn confirm(
    store: &dyn Store,
    provider: &dyn PaymentProvider,
    notifier: &Arc<dyn Notifier>,
    session_id: &SessionId,
) -> Result<SettlementResult, MarketError> {
    reconcile(store, provider, notifier, session_id, false).await
}

/// Like [`confirm`], but a session the gateway still reports as open is
/// expired at the gateway and then marked failed with [`EXPIRED_REASON`].
#[tracing::instrument(skip_all, fields(session_id = %session_id))]
pub async fn expire(
    store: &dyn Store,
    provider: &dyn PaymentProvider,
    notifier: &Arc<dyn Notifier>,
    session_id: &SessionId,
) -> Result<SettlementResult, MarketError> {
    reconcile(store, provider, notifier, session_id, true).await
}

async fn load_payment(
    uow: &mut dyn UnitOfWork,
    session_id: &SessionId,
) -> Result<Payment, MarketError> {
    uow.payment_by_session(session_id)
        .await?
        .ok_or_else(|| MarketError::not_found("payment for session", session_id))
}

async fn reconcile(
    store: &dyn Store,
    provider: &dyn PaymentProvider,
    notifier: &Arc<dyn Notifier>,
    session_id: &SessionId,
    expire_pending: bool,
) -> Result<SettlementResult, MarketError> {
    let payment = {
        let mut uow = store.begin().await?;
        load_payment(&mut *uow, session_id).await?
    };
    if payment.status.is_terminal() {
        return Ok(SettlementResult::AlreadySettled(payment));
    }

    let (target, reason) = match provider.payment_status(session_id).await? {
        GatewayStatus::Succeeded => (PaymentStatus::Completed, None),
        GatewayStatus::Failed => (PaymentStatus::Failed, Some("payment failed at gateway")),
        // Close the hosted page first so it cannot take money for a payment
        // recorded as failed.
        GatewayStatus::Pending if expire_pending => {
            match provider.expire_checkout_session(session_id).await? {
                GatewayStatus::Succeeded => (PaymentStatus::Completed, None),
                GatewayStatus::Failed => (PaymentStatus::Failed, Some(EXPIRED_REASON)),
                GatewayStatus::Pending => {
                    tracing::warn!("gateway kept the session open after expiry");
                    return Ok(SettlementResult::AwaitingPayment(payment));
                }
            }
        }
        GatewayStatus::Pending => {
            tracing::debug!("gateway has not settled the session yet");
            return Ok(SettlementResult::AwaitingPayment(payment));
        }
    };

    let now = Utc::now();
    match settle(store, session_id, target, reason, now).await {
        Ok((result, outgoing)) => {
            notifications::dispatch(notifier, outgoing);
            Ok(result)
        }
        Err(e) if target == PaymentStatus::Completed && is_settlement_conflict(&e) => {
            // The money moved but the order can no longer be fulfilled.
            tracing::error!(error = %e, "paid session could not be settled, marking payment failed");
            let reason = format!("settlement failed: {e}");
            let (_, outgoing) =
                settle(store, session_id, PaymentStatus::Failed, Some(reason.as_str()), now)
                    .await?;
            notifications::dispatch(notifier, outgoing);
            Err(e)
        }
        Err(e) => Err(e),
    }
}

fn is_settlement_conflict(e: &MarketError) -> bool {
    matches!(
        e,
        MarketError::Conflict(_)
            | MarketError::InvalidTransition(_)
            | MarketError::NotFound(_)
            | MarketError::Validation(_)
    )
}

/// One unit of work: lock the session, compare-and-set the payment out of
/// pending, then apply the order effects. Any error rolls everything back.
async fn settle(
    store: &dyn Store,
    session_id: &SessionId,
    target: PaymentStatus,
    reason: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(SettlementResult, Vec<Notification>), MarketError> {
    let mut uow = store.begin().await?;
    uow.lock_session(session_id).await?;

    let current = load_payment(&mut *uow, session_id).await?;
    if current.status.is_terminal() {
        return Ok((SettlementResult::AlreadySettled(current), Vec::new()));
    }

    let mut payment = current;
    payment.transition_status(target, now)?;
    payment.failure_reason = reason.map(str::to_owned);

    if !uow.update_payment_if(&payment, PaymentStatus::Pending).await? {
        let existing = load_payment(&mut *uow, session_id).await?;
        tracing::info!(status = %existing.status, "lost settlement race, returning stored payment");
        return Ok((SettlementResult::AlreadySettled(existing), Vec::new()));
    }

    let result = if target == PaymentStatus::Completed {
        let mut outgoing = apply_effects(&mut *uow, &payment, now).await?;
        outgoing.push(Notification::new(
            NotificationKind::PaymentCompleted,
            Uuid::nil(),
            payment.payer_id,
            json!({ "paymentId": payment.id, "amount": payment.gross, "type": payment.payment_type }),
        ));
        uow.commit().await?;
        tracing::info!(payment_id = %payment.id, gross = %payment.gross, "payment settled");
        (SettlementResult::Settled(payment), outgoing)
    } else {
        uow.commit().await?;
        tracing::info!(
            payment_id = %payment.id,
            reason = payment.failure_reason.as_deref().unwrap_or_default(),
            "payment failed"
        );
        let outgoing = vec![Notification::new(
            NotificationKind::PaymentFailed,
            Uuid::nil(),
            payment.payer_id,
            json!({ "paymentId": payment.id, "reason": payment.failure_reason }),
        )];
        (SettlementResult::Failed(payment), outgoing)
    };
    Ok(result)
}

async fn apply_effects(
    uow: &mut dyn UnitOfWork,
    payment: &Payment,
    now: DateTime<Utc>,
) -> Result<Vec<Notification>, MarketError> {
    let system = Actor::system();
    let paid = format!("paid via {}", payment.session_id);
    let mut outgoing = Vec::new();

    if let Some(coupon_id) = payment.coupon_id {
        if !coupons::consume(uow, coupon_id, payment.discount).await? {
            outgoing.push(Notification::new(
                NotificationKind::CouponLimitExceeded,
                payment.payer_id,
                Uuid::nil(),
                json!({ "couponId": coupon_id, "paymentId": payment.id, "discount": payment.discount }),
            ));
        }
    }

    match &payment.refs {
        PaymentRefs::Event { order_id } => {
            let mut order = uow
                .event_order(*order_id)
                .await?
                .filter(|o| !o.is_deleted)
                .ok_or_else(|| MarketError::not_found("event order", order_id))?;
            order.transition(
                &system,
                EventOrderStatus::InProgress,
                StatusChange::reason(paid),
                now,
            )?;
            order.payment_id = Some(payment.id);
            uow.update_event_order(&order).await?;
            outgoing.push(Notification::new(
                NotificationKind::OrderStatusChanged,
                payment.payer_id,
                order.provider_id,
                json!({ "orderId": order.id, "to": EventOrderStatus::InProgress }),
            ));
        }
        PaymentRefs::Gear {
            order_ids,
            listing_ids,
        } => {
            for order_id in order_ids {
                let mut order = uow
                    .gear_order(*order_id)
                    .await?
                    .ok_or_else(|| MarketError::not_found("gear order", order_id))?;
                order.transition(&system, GearOrderStatus::InProgress, Some(paid.clone()), now)?;
                order.payment_id = Some(payment.id);
                uow.update_gear_order(&order).await?;
                outgoing.push(Notification::new(
                    NotificationKind::OrderStatusChanged,
                    payment.payer_id,
                    order.seller_id,
                    json!({ "gearOrderId": order.id, "to": GearOrderStatus::InProgress }),
                ));
            }
            for listing_id in listing_ids {
                if !uow.mark_sold_out(*listing_id).await? {
                    return Err(MarketError::Conflict(format!(
                        "gear listing {listing_id} was sold before settlement"
                    )));
                }
            }
        }
        PaymentRefs::Workshop { workshop_id } => {
            let workshop = uow
                .workshop(*workshop_id)
                .await?
                .ok_or_else(|| MarketError::not_found("workshop", workshop_id))?;
            if uow
                .participant_for(workshop.id, payment.payer_id)
                .await?
                .is_some()
            {
                return Err(MarketError::Conflict(format!(
                    "payer already registered for workshop {workshop_id}"
                )));
            }
            if !uow.reserve_seat(workshop.id).await? {
                return Err(MarketError::Conflict(format!(
                    "workshop {workshop_id} is full"
                )));
            }
            let seq = uow
                .next_sequence(WORKSHOP_SEQUENCE, now.date_naive())
                .await?;
            let participant = WorkshopParticipant {
                id: Uuid::now_v7(),
                order_code: workshop_order_code(now.date_naive(), seq),
                workshop_id: workshop.id,
                client_id: payment.payer_id,
                author_id: workshop.author_id,
                payment_id: payment.id,
                total_price: payment.gross,
                payout: Payout {
                    provider_id: workshop.author_id,
                    amount: payment.net,
                    status: PayoutStatus::Pending,
                },
                is_deleted: false,
                log: StatusLog::start(ParticipantStatus::InProgress, Some(paid), now),
                created_at: now,
            };
            uow.insert_participant(&participant).await?;
            tracing::info!(order_code = %participant.order_code, "workshop seat registered");
            outgoing.push(Notification::new(
                NotificationKind::WorkshopRegistered,
                payment.payer_id,
                workshop.author_id,
                json!({ "workshopId": workshop.id, "orderCode": participant.order_code }),
            ));
        }
        PaymentRefs::Subscription { days } => {
            let owner_id = payment.payer_id;
            let current = uow.active_subscription(owner_id).await?;
            let renewed = Subscription::renew(owner_id, payment.id, *days, current.as_ref(), now)?;
            if let Some(mut previous) = current {
                previous.close(
                    SubscriptionStatus::Superseded,
                    Some(format!("renewed by {}", renewed.id)),
                    now,
                )?;
                uow.update_subscription(&previous).await?;
            }
            uow.insert_subscription(&renewed).await?;
            uow.set_subscription_flags(owner_id, &SubscriptionFlags::from_active(&renewed))
                .await?;
            tracing::info!(
                subscription_id = %renewed.id,
                expires_at = %renewed.expires_at,
                "subscription renewed"
            );
            outgoing.push(Notification::new(
                NotificationKind::SubscriptionRenewed,
                Uuid::nil(),
                owner_id,
                json!({ "subscriptionId": renewed.id, "expiresAt": renewed.expires_at }),
            ));
        }
    }
    Ok(outgoing)
}

/// Operator retry: `failed → pending`. Admins only.
#[tracing::instrument(skip_all, fields(session_id = %session_id, actor = %actor))]
pub async fn reset(
    store: &dyn Store,
    actor: &Actor,
    session_id: &SessionId,
) -> Result<Payment, MarketError> {
    if !actor.is_admin() {
        return Err(MarketError::Forbidden("only admins may reset a payment".into()));
    }
    let now = Utc::now();
    let mut uow = store.begin().await?;
    uow.lock_session(session_id).await?;

    let mut payment = load_payment(&mut *uow, session_id).await?;
    let previous = payment.status;
    payment.transition_status(PaymentStatus::Pending, now)?;
    if !uow.update_payment_if(&payment, previous).await? {
        return Err(MarketError::Conflict(format!(
            "payment for session {session_id} changed concurrently"
        )));
    }
    uow.commit().await?;

    tracing::info!(payment_id = %payment.id, "payment reset to pending");
    Ok(payment)
}
