mod common;

use {
    chrono::{Duration, Utc},
    common::*,
    market_sync::{
        domain::{
            catalog::GearStock,
            error::MarketError,
            event_order::EventOrderStatus,
            gear_order::GearOrderStatus,
            id::SessionId,
            notify::NotificationKind,
            payment::{GatewayStatus, PaymentRefs, PaymentStatus, SettlementResult},
            store::Store,
            subscription::{MAX_SUBSCRIPTION_DAYS, Subscription, SubscriptionStatus},
            workshop::{ParticipantStatus, PayoutStatus},
        },
        services::{
            orders::{self, CancelAction},
            reconciler, subscriptions,
        },
    },
    uuid::Uuid,
};

// ── 1. event_payment_moves_order_into_progress ─────────────────────────────

#[tokio::test]
async fn event_payment_moves_order_into_progress() {
    let h = Harness::new();
    let c = client();
    let (order, _) = h.accepted_event_order(&c).await;

    let session = h.checkout(&c, event_payload(order.id)).await.unwrap();
    h.gateway.set_status(&session.session_id, GatewayStatus::Succeeded);
    let result = h.confirm(&session.session_id).await.unwrap();

    let SettlementResult::Settled(payment) = result else {
        panic!("expected Settled, got {result:?}");
    };
    assert_eq!(payment.status, PaymentStatus::Completed);
    assert!(payment.settled_at.is_some());

    let stored = h.event_order(order.id).await;
    assert_eq!(stored.status(), EventOrderStatus::InProgress);
    assert_eq!(stored.payment_id, Some(payment.id));
    assert!(h.recorder.wait_for(NotificationKind::PaymentCompleted).await);
}

// ── 2. confirmation_is_idempotent ──────────────────────────────────────────

#[tokio::test]
async fn confirmation_is_idempotent() {
    let h = Harness::new();
    let c = client();
    let (order, _) = h.accepted_event_order(&c).await;
    let session = h.checkout(&c, event_payload(order.id)).await.unwrap();
    h.gateway.set_status(&session.session_id, GatewayStatus::Succeeded);

    assert!(matches!(
        h.confirm(&session.session_id).await.unwrap(),
        SettlementResult::Settled(_)
    ));
    let calls = h.gateway.status_calls();
    for _ in 0..3 {
        let again = h.confirm(&session.session_id).await.unwrap();
        assert!(matches!(again, SettlementResult::AlreadySettled(_)));
        assert!(again.is_success());
    }
    assert_eq!(h.gateway.status_calls(), calls, "terminal payments skip the gateway");

    let stored = h.event_order(order.id).await;
    let entries = stored
        .log
        .history()
        .iter()
        .filter(|e| e.status == EventOrderStatus::InProgress)
        .count();
    assert_eq!(entries, 1);
}

// ── 3. pending_gateway_changes_nothing ─────────────────────────────────────

#[tokio::test]
async fn pending_gateway_changes_nothing() {
    let h = Harness::new();
    let c = client();
    let (order, _) = h.accepted_event_order(&c).await;
    let session = h.checkout(&c, event_payload(order.id)).await.unwrap();

    let result = h.confirm(&session.session_id).await.unwrap();
    assert!(matches!(result, SettlementResult::AwaitingPayment(_)));
    assert!(!result.is_success());
    assert_eq!(h.payment(&session.session_id).await.status, PaymentStatus::Pending);
    assert_eq!(h.event_order(order.id).await.status(), EventOrderStatus::Accepted);
}

// ── 4. failed_payment_leaves_order_alone ───────────────────────────────────

#[tokio::test]
async fn failed_payment_leaves_order_alone() {
    let h = Harness::new();
    let c = client();
    let (order, _) = h.accepted_event_order(&c).await;
    let session = h.checkout(&c, event_payload(order.id)).await.unwrap();
    h.gateway.set_status(&session.session_id, GatewayStatus::Failed);

    let result = h.confirm(&session.session_id).await.unwrap();
    let SettlementResult::Failed(payment) = result else {
        panic!("expected Failed, got {result:?}");
    };
    assert_eq!(payment.status, PaymentStatus::Failed);
    assert!(payment.failure_reason.is_some());
    assert_eq!(h.event_order(order.id).await.status(), EventOrderStatus::Accepted);
    assert!(h.recorder.wait_for(NotificationKind::PaymentFailed).await);
}

// ── 5. unknown_session_is_not_found ────────────────────────────────────────

#[tokio::test]
async fn unknown_session_is_not_found() {
    let h = Harness::new();
    let err = h
        .confirm(&SessionId::new("cs_test_missing").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::NotFound(_)));
}

// ── 6. gear_payment_marks_listings_sold ────────────────────────────────────

#[tokio::test]
async fn gear_payment_marks_listings_sold() {
    let h = Harness::new();
    let buyer = client();
    let (a, b) = (gear_listing(Uuid::now_v7()), gear_listing(Uuid::now_v7()));
    h.store.put_gear_listing(a.clone()).await;
    h.store.put_gear_listing(b.clone()).await;

    let payment = h.pay(&buyer, gear_payload(vec![a.id, b.id])).await;
    assert_eq!(payment.status, PaymentStatus::Completed);
    assert_eq!(h.gear(a.id).await.stock, GearStock::SoldOut);
    assert_eq!(h.gear(b.id).await.stock, GearStock::SoldOut);

    let PaymentRefs::Gear { order_ids, .. } = &payment.refs else {
        panic!("unexpected refs");
    };
    let mut uow = h.store.begin().await.unwrap();
    for id in order_ids {
        let order = uow.gear_order(*id).await.unwrap().unwrap();
        assert_eq!(order.status(), GearOrderStatus::InProgress);
        assert_eq!(order.payment_id, Some(payment.id));
    }
}

// ── 7. gear_sold_between_checkout_and_payment ──────────────────────────────
// Two buyers check out the same listing. The second settlement cannot take
// the listing; its payment is failed with a reason and the error surfaces.

#[tokio::test]
async fn gear_sold_between_checkout_and_payment() {
    let h = Harness::new();
    let listing = gear_listing(Uuid::now_v7());
    h.store.put_gear_listing(listing.clone()).await;

    let first = h.checkout(&client(), gear_payload(vec![listing.id])).await.unwrap();
    let second = h.checkout(&client(), gear_payload(vec![listing.id])).await.unwrap();
    for s in [&first, &second] {
        h.gateway.set_status(&s.session_id, GatewayStatus::Succeeded);
    }

    assert!(h.confirm(&first.session_id).await.unwrap().is_success());
    let err = h.confirm(&second.session_id).await.unwrap_err();
    assert!(matches!(err, MarketError::Conflict(_)));

    let lost = h.payment(&second.session_id).await;
    assert_eq!(lost.status, PaymentStatus::Failed);
    assert!(
        lost.failure_reason
            .as_deref()
            .unwrap_or_default()
            .starts_with("settlement failed"),
        "{:?}",
        lost.failure_reason
    );

    let PaymentRefs::Gear { order_ids, .. } = &lost.refs else {
        panic!("unexpected refs");
    };
    let mut uow = h.store.begin().await.unwrap();
    let order = uow.gear_order(order_ids[0]).await.unwrap().unwrap();
    assert_eq!(order.status(), GearOrderStatus::Pending, "rolled back");
}

// ── 8. workshop_registration_numbers_daily ─────────────────────────────────

#[tokio::test]
async fn workshop_registration_numbers_daily() {
    let h = Harness::new();
    let author = provider();
    let ws = workshop(author.user_id, 3);
    h.store.put_workshop(ws.clone()).await;

    let (alice, bob) = (client(), client());
    let first = h.pay(&alice, workshop_payload(ws.id)).await;
    h.pay(&bob, workshop_payload(ws.id)).await;

    let mut participants = h.store.participants_of(ws.id).await;
    participants.sort_by(|a, b| a.order_code.cmp(&b.order_code));
    let today = Utc::now().format("%Y%m%d").to_string();
    assert_eq!(participants[0].order_code, format!("WORKSHOP-{today}-0001"));
    assert_eq!(participants[1].order_code, format!("WORKSHOP-{today}-0002"));

    let alices = participants
        .iter()
        .find(|p| p.client_id == alice.user_id)
        .unwrap();
    assert_eq!(alices.status(), ParticipantStatus::InProgress);
    assert_eq!(alices.payment_id, first.id);
    assert_eq!(alices.total_price, cents(2_500));
    assert_eq!(alices.payout.amount, cents(2_200));
    assert_eq!(alices.payout.status, PayoutStatus::Pending);
    assert_eq!(alices.payout.provider_id, author.user_id);
    assert_eq!(h.workshop(ws.id).await.participant_count, 2);
    assert!(h.recorder.wait_for(NotificationKind::WorkshopRegistered).await);
}

// ── 9. duplicate_registration_is_rejected ──────────────────────────────────

#[tokio::test]
async fn duplicate_registration_is_rejected() {
    let h = Harness::new();
    let ws = workshop(Uuid::now_v7(), 5);
    h.store.put_workshop(ws.clone()).await;
    let c = client();

    // Two sessions opened before either was paid.
    let first = h.checkout(&c, workshop_payload(ws.id)).await.unwrap();
    let second = h.checkout(&c, workshop_payload(ws.id)).await.unwrap();
    for s in [&first, &second] {
        h.gateway.set_status(&s.session_id, GatewayStatus::Succeeded);
    }
    h.confirm(&first.session_id).await.unwrap();
    let err = h.confirm(&second.session_id).await.unwrap_err();
    assert!(matches!(err, MarketError::Conflict(_)));

    assert_eq!(h.store.participants_of(ws.id).await.len(), 1);
    assert_eq!(h.workshop(ws.id).await.participant_count, 1);

    let err = h.checkout(&c, workshop_payload(ws.id)).await.unwrap_err();
    assert!(matches!(err, MarketError::Conflict(_)));
}

// ── 10. last_seat_goes_to_first_settlement ─────────────────────────────────

#[tokio::test]
async fn last_seat_goes_to_first_settlement() {
    let h = Harness::new();
    let ws = workshop(Uuid::now_v7(), 1);
    h.store.put_workshop(ws.clone()).await;

    let first = h.checkout(&client(), workshop_payload(ws.id)).await.unwrap();
    let second = h.checkout(&client(), workshop_payload(ws.id)).await.unwrap();
    for s in [&first, &second] {
        h.gateway.set_status(&s.session_id, GatewayStatus::Succeeded);
    }
    h.confirm(&first.session_id).await.unwrap();
    assert!(h.confirm(&second.session_id).await.is_err());

    let ws = h.workshop(ws.id).await;
    assert_eq!(ws.participant_count, ws.capacity);
}

// ── 11. subscription_purchase_and_renewal ──────────────────────────────────

#[tokio::test]
async fn subscription_purchase_and_renewal() {
    let h = Harness::new();
    let c = client();

    let first = h.pay(&c, subscription_payload(30, 1_000)).await;
    let view = subscriptions::current(&h.store, c.user_id).await.unwrap();
    let active = view.active.clone().unwrap();
    assert!(view.flags.has_active_subscription);
    assert_eq!(view.flags.subscription_days, 30);
    assert_eq!(view.flags.subscription_expires_at, Some(active.expires_at));
    assert_eq!(active.payment_id, first.id);

    h.pay(&c, subscription_payload(10, 400)).await;
    let subs = h.store.subscriptions_of(c.user_id).await;
    assert_eq!(subs.len(), 2);
    assert_eq!(subs[0].log.status(), SubscriptionStatus::Superseded);
    assert_eq!(subs[1].log.status(), SubscriptionStatus::Active);
    assert_eq!(subs[1].starts_at, active.expires_at);
    assert_eq!(subs[1].expires_at, active.expires_at + Duration::days(10));

    let view = subscriptions::current(&h.store, c.user_id).await.unwrap();
    assert_eq!(view.flags.subscription_expires_at, Some(subs[1].expires_at));
}

// ── 12. renewal_continues_from_current_expiry ──────────────────────────────

#[test]
fn renewal_continues_from_current_expiry() {
    use chrono::TimeZone;
    let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let owner = Uuid::now_v7();
    let mut current =
        Subscription::renew(owner, Uuid::now_v7(), 9, None, now).unwrap();
    assert_eq!(current.expires_at, Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap());

    let renewed = Subscription::renew(owner, Uuid::now_v7(), 30, Some(&current), now).unwrap();
    assert_eq!(renewed.expires_at, Utc.with_ymd_and_hms(2025, 2, 9, 0, 0, 0).unwrap());

    current.close(SubscriptionStatus::Expired, None, now).unwrap();
    let fresh = Subscription::renew(owner, Uuid::now_v7(), 30, Some(&current), now).unwrap();
    assert_eq!(fresh.starts_at, now);
}

// ── 13. coupon_consumed_once_at_settlement ─────────────────────────────────

#[tokio::test]
async fn coupon_consumed_once_at_settlement() {
    let h = Harness::new();
    let c = client();
    let (order, _) = h.accepted_event_order(&c).await;
    h.store.put_coupon(coupon("ONCE", 300, 0, 5)).await;

    let mut payload = event_payload(order.id);
    payload.coupon_code = Some("ONCE".into());
    let session = h.checkout(&c, payload).await.unwrap();
    h.gateway.set_status(&session.session_id, GatewayStatus::Succeeded);

    h.confirm(&session.session_id).await.unwrap();
    h.confirm(&session.session_id).await.unwrap();
    assert_eq!(h.coupon("ONCE").await.used_count, 1);
}

// ── 14. failed_payment_does_not_consume_coupon ─────────────────────────────

#[tokio::test]
async fn failed_payment_does_not_consume_coupon() {
    let h = Harness::new();
    let c = client();
    let (order, _) = h.accepted_event_order(&c).await;
    h.store.put_coupon(coupon("KEEP", 300, 0, 5)).await;

    let mut payload = event_payload(order.id);
    payload.coupon_code = Some("KEEP".into());
    let session = h.checkout(&c, payload).await.unwrap();
    h.gateway.set_status(&session.session_id, GatewayStatus::Failed);

    h.confirm(&session.session_id).await.unwrap();
    assert_eq!(h.coupon("KEEP").await.used_count, 0);
}

// ── 15. exhausted_coupon_still_settles ─────────────────────────────────────
// Both sessions priced the last use; both settle, usage never passes the limit.

#[tokio::test]
async fn exhausted_coupon_still_settles() {
    let h = Harness::new();
    h.store.put_coupon(coupon("LAST", 100, 0, 1)).await;

    let mut sessions = Vec::new();
    for _ in 0..2 {
        let c = client();
        let (order, _) = h.accepted_event_order(&c).await;
        let mut payload = event_payload(order.id);
        payload.coupon_code = Some("LAST".into());
        sessions.push(h.checkout(&c, payload).await.unwrap());
    }
    for s in &sessions {
        h.gateway.set_status(&s.session_id, GatewayStatus::Succeeded);
        assert!(h.confirm(&s.session_id).await.unwrap().is_success());
    }
    assert_eq!(h.coupon("LAST").await.used_count, 1);
    assert!(h.recorder.wait_for(NotificationKind::CouponLimitExceeded).await);
    let overruns = h
        .recorder
        .kinds()
        .into_iter()
        .filter(|k| *k == NotificationKind::CouponLimitExceeded)
        .count();
    assert_eq!(overruns, 1);
}

// ── 16. reset_is_admin_only ────────────────────────────────────────────────

#[tokio::test]
async fn reset_is_admin_only() {
    let h = Harness::new();
    let c = client();
    let (order, _) = h.accepted_event_order(&c).await;
    let session = h.checkout(&c, event_payload(order.id)).await.unwrap();
    h.gateway.set_status(&session.session_id, GatewayStatus::Failed);
    h.confirm(&session.session_id).await.unwrap();

    let err = reconciler::reset(&h.store, &c, &session.session_id)
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::Forbidden(_)));

    let payment = reconciler::reset(&h.store, &admin(), &session.session_id)
        .await
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert!(payment.failure_reason.is_none());
    assert!(payment.settled_at.is_none());

    // Second attempt at the gateway goes through.
    h.gateway.set_status(&session.session_id, GatewayStatus::Succeeded);
    assert!(h.confirm(&session.session_id).await.unwrap().is_success());
    assert_eq!(h.event_order(order.id).await.status(), EventOrderStatus::InProgress);
}

// ── 17. completed_payment_cannot_be_reset ──────────────────────────────────

#[tokio::test]
async fn completed_payment_cannot_be_reset() {
    let h = Harness::new();
    let c = client();
    let payment = h.pay(&c, subscription_payload(7, 700)).await;

    let err = reconciler::reset(&h.store, &admin(), &payment.session_id)
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::InvalidTransition(_)));
}

// ── 18. declined_cancellation_then_payment ─────────────────────────────────

#[tokio::test]
async fn declined_cancellation_then_payment() {
    let h = Harness::new();
    let c = client();
    let (order, seller) = h.accepted_event_order(&c).await;

    orders::cancel_event_order(&h.store, &h.notifier, &c, order.id, CancelAction::Request, None)
        .await
        .unwrap();
    let err = h.checkout(&c, event_payload(order.id)).await.unwrap_err();
    assert!(matches!(err, MarketError::InvalidTransition(_)));

    orders::cancel_event_order(
        &h.store,
        &h.notifier,
        &seller,
        order.id,
        CancelAction::Decline,
        Some("already booked the venue".into()),
    )
    .await
    .unwrap();

    let payment = h.pay(&c, event_payload(order.id)).await;
    assert_eq!(payment.status, PaymentStatus::Completed);
    let stored = h.event_order(order.id).await;
    assert_eq!(stored.status(), EventOrderStatus::InProgress);
    assert_eq!(stored.payment_id, Some(payment.id));

    let err = h.checkout(&c, event_payload(order.id)).await.unwrap_err();
    assert!(matches!(err, MarketError::InvalidTransition(_)));
}

// ── 19. renewal_past_the_calendar_fails_the_payment ────────────────────────
// The charge went through but the window cannot be represented: the payment
// ends failed instead of settlement panicking on every retry.

#[tokio::test]
async fn renewal_past_the_calendar_fails_the_payment() {
    let h = Harness::new();
    let c = client();
    let mut far = Subscription::renew(c.user_id, Uuid::now_v7(), 30, None, Utc::now()).unwrap();
    far.expires_at = chrono::DateTime::<Utc>::MAX_UTC - Duration::days(1);
    h.store.put_subscription(far).await;

    let session = h.checkout(&c, subscription_payload(30, 900)).await.unwrap();
    h.gateway.set_status(&session.session_id, GatewayStatus::Succeeded);
    let err = h.confirm(&session.session_id).await.unwrap_err();
    assert!(matches!(err, MarketError::Validation(_)));

    let payment = h.payment(&session.session_id).await;
    assert_eq!(payment.status, PaymentStatus::Failed);
    assert!(payment.failure_reason.unwrap().starts_with("settlement failed"));
    assert_eq!(h.store.subscriptions_of(c.user_id).await.len(), 1);

    let again = h.confirm(&session.session_id).await.unwrap();
    assert!(matches!(again, SettlementResult::AlreadySettled(_)));
}

#[test]
fn renewal_rejects_out_of_range_days() {
    let now = Utc::now();
    for days in [0, MAX_SUBSCRIPTION_DAYS + 1, u32::MAX] {
        let err = Subscription::renew(Uuid::now_v7(), Uuid::now_v7(), days, None, now).unwrap_err();
        assert!(matches!(err, MarketError::Validation(_)), "{days} days");
    }
}
