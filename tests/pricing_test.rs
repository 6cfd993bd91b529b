mod common;

use {
    chrono::{Duration, Utc},
    common::*,
    market_sync::{
        domain::{
            catalog::ListingPrice,
            error::MarketError,
            money::{MoneyAmount, Percent},
            pricing::{event_quote, gear_quote, subscription_quote, workshop_quote},
            store::Store,
        },
        services::pricing::{Priceable, calculate},
    },
    uuid::Uuid,
};

// ── 1. event_quote_splits_service_fee ──────────────────────────────────────

#[tokio::test]
async fn event_quote_splits_service_fee() {
    let h = Harness::new();
    let (order, seller) = h.accepted_event_order(&client()).await;

    let quote = event_quote(&order).unwrap();
    assert_eq!(quote.gross, cents(11_000));
    assert_eq!(quote.commission, cents(1_000));
    assert_eq!(quote.net, cents(10_000));
    assert_eq!(quote.shares.len(), 1);
    assert_eq!(quote.shares[0].provider_id, seller.user_id);
}

// ── 2. unpriced_custom_order_cannot_be_quoted ──────────────────────────────

#[test]
fn unpriced_custom_order_cannot_be_quoted() {
    let order = market_sync::domain::event_order::EventOrder::custom(
        Uuid::now_v7(),
        Uuid::now_v7(),
        "Studio session".into(),
        Utc::now(),
    )
    .unwrap();
    assert!(matches!(event_quote(&order), Err(MarketError::Validation(_))));
}

// ── 3. listing_commission_uses_explicit_vat_or_percent ─────────────────────

#[test]
fn listing_commission_uses_explicit_vat_or_percent() {
    let seller = Uuid::now_v7();
    let gear = gear_listing(seller);
    let quote = gear_quote(std::slice::from_ref(&gear)).unwrap();
    assert_eq!(quote.commission, cents(600));
    assert_eq!(quote.net, cents(6_000));

    let ws = workshop(seller, 10);
    let quote = workshop_quote(&ws);
    assert_eq!(quote.gross, cents(2_500));
    assert_eq!(quote.commission, cents(300));
    assert_eq!(quote.net, cents(2_200));
}

// ── 4. commission_never_negative ───────────────────────────────────────────

#[test]
fn commission_never_negative() {
    let mut ws = workshop(Uuid::now_v7(), 1);
    ws.price = ListingPrice {
        price: cents(2_000),
        vat_amount: None,
        vat_percent: Some(Percent::whole(50)),
        main_price: cents(2_500),
    };
    let quote = workshop_quote(&ws);
    assert_eq!(quote.commission, MoneyAmount::ZERO);
    assert_eq!(quote.net, cents(2_500));
}

// ── 5. multi_seller_gear_quote_sums_shares ─────────────────────────────────

#[test]
fn multi_seller_gear_quote_sums_shares() {
    let a = gear_listing(Uuid::now_v7());
    let b = gear_listing(Uuid::now_v7());
    let quote = gear_quote(&[a.clone(), b.clone()]).unwrap();
    assert_eq!(quote.gross, cents(13_200));
    assert_eq!(quote.commission, cents(1_200));
    assert_eq!(quote.shares.len(), 2);
    assert_eq!(quote.shares[1].provider_id, b.seller_id);

    assert!(matches!(gear_quote(&[]), Err(MarketError::Validation(_))));
}

// ── 6. subscription_has_no_commission ──────────────────────────────────────

#[test]
fn subscription_has_no_commission() {
    let quote = subscription_quote(cents(999)).unwrap();
    assert_eq!(quote.gross, cents(999));
    assert_eq!(quote.commission, MoneyAmount::ZERO);
    assert!(quote.shares.is_empty());
    assert!(subscription_quote(MoneyAmount::ZERO).is_err());
}

// ── 7. coupon_discounts_commission_only ────────────────────────────────────

#[tokio::test]
async fn coupon_discounts_commission_only() {
    let h = Harness::new();
    h.store.put_coupon(coupon("SAVE5", 500, 1_000, 10)).await;
    let gear = gear_listing(Uuid::now_v7());

    let mut uow = h.store.begin().await.unwrap();
    let quote = calculate(
        &mut *uow,
        Priceable::Gear(std::slice::from_ref(&gear)),
        Some(" save5 "),
        Utc::now(),
    )
    .await
    .unwrap();

    assert_eq!(quote.discount, cents(500));
    assert_eq!(quote.commission, cents(100));
    assert_eq!(quote.gross, cents(6_100));
    assert_eq!(quote.net, cents(6_000), "provider net untouched");
    assert!(quote.coupon_id.is_some());
}

// ── 8. coupon_capped_at_commission ─────────────────────────────────────────

#[tokio::test]
async fn coupon_capped_at_commission() {
    let h = Harness::new();
    h.store.put_coupon(coupon("BIG", 5_000, 0, 10)).await;
    let ws = workshop(Uuid::now_v7(), 5);

    let mut uow = h.store.begin().await.unwrap();
    let quote = calculate(&mut *uow, Priceable::Workshop(&ws), Some("BIG"), Utc::now())
        .await
        .unwrap();

    assert_eq!(quote.discount, cents(300));
    assert_eq!(quote.commission, MoneyAmount::ZERO);
    assert_eq!(quote.gross, cents(2_200));
}

// ── 9. coupon_rejections ───────────────────────────────────────────────────

#[tokio::test]
async fn coupon_rejections() {
    let h = Harness::new();
    let mut expired = coupon("OLD", 100, 0, 10);
    expired.expires_at = Utc::now() - Duration::days(1);
    let mut used_up = coupon("USED", 100, 0, 1);
    used_up.used_count = 1;
    let mut inactive = coupon("OFF", 100, 0, 10);
    inactive.is_active = false;
    for c in [expired, used_up, inactive, coupon("RICH", 100, 100_000, 10)] {
        h.store.put_coupon(c).await;
    }
    let gear = gear_listing(Uuid::now_v7());
    let item = Priceable::Gear(std::slice::from_ref(&gear));
    let now = Utc::now();

    let mut uow = h.store.begin().await.unwrap();
    let cases: [(&str, fn(&MarketError) -> bool); 5] = [
        ("NOPE", |e| matches!(e, MarketError::InvalidCoupon(_))),
        ("OLD", |e| matches!(e, MarketError::InvalidCoupon(_))),
        ("OFF", |e| matches!(e, MarketError::InvalidCoupon(_))),
        ("USED", |e| matches!(e, MarketError::LimitExceeded(_))),
        ("RICH", |e| matches!(e, MarketError::MinimumSpendNotMet(_))),
    ];
    for (code, expected) in cases {
        let err = calculate(&mut *uow, item, Some(code), now).await.unwrap_err();
        assert!(expected(&err), "{code}: unexpected {err:?}");
    }
}

// ── 10. coupon_ignored_without_commission ──────────────────────────────────

#[tokio::test]
async fn coupon_ignored_without_commission() {
    let h = Harness::new();
    let mut uow = h.store.begin().await.unwrap();

    // Unknown code, but subscriptions carry no commission so it is never looked up.
    let quote = calculate(
        &mut *uow,
        Priceable::Subscription { amount: cents(1_500) },
        Some("DOES-NOT-EXIST"),
        Utc::now(),
    )
    .await
    .unwrap();
    assert_eq!(quote.gross, cents(1_500));
    assert!(quote.coupon_id.is_none());

    let quote = calculate(
        &mut *uow,
        Priceable::Subscription { amount: cents(1_500) },
        Some("   "),
        Utc::now(),
    )
    .await
    .unwrap();
    assert_eq!(quote.discount, MoneyAmount::ZERO);
}
