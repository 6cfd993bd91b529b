mod common;

use {
    chrono::{Duration, TimeZone, Utc},
    common::{cents, coupon},
    market_sync::domain::{
        actor::{Actor, Role},
        catalog::{GearListing, GearStock, ListingPrice},
        event_order::{EventOrder, EventOrderStatus, OrderPricing, StatusChange},
        lifecycle::{Lifecycle, StatusLog},
        money::{MoneyAmount, Percent},
        payment::PaymentStatus,
        pricing::gear_quote,
        subscription::Subscription,
        workshop::workshop_order_code,
    },
    proptest::prelude::*,
    uuid::Uuid,
};

const EVENT_STATUSES: [EventOrderStatus; 10] = [
    EventOrderStatus::Pending,
    EventOrderStatus::Accepted,
    EventOrderStatus::Declined,
    EventOrderStatus::InProgress,
    EventOrderStatus::DeliveryRequest,
    EventOrderStatus::DeliveryRequestDeclined,
    EventOrderStatus::Delivered,
    EventOrderStatus::CancelRequest,
    EventOrderStatus::CancelRequestDeclined,
    EventOrderStatus::Cancelled,
];

fn arb_event_status() -> impl Strategy<Value = EventOrderStatus> {
    (0..EVENT_STATUSES.len()).prop_map(|i| EVENT_STATUSES[i])
}

fn arb_role() -> impl Strategy<Value = Role> {
    prop_oneof![
        Just(Role::Client),
        Just(Role::Provider),
        Just(Role::Admin),
        Just(Role::System),
    ]
}

fn arb_listing() -> impl Strategy<Value = GearListing> {
    (0i64..100_000, 0i64..20_000, 0u32..5_000, any::<bool>(), 0i64..150_000).prop_map(
        |(price, vat, bp, explicit, main)| GearListing {
            id: Uuid::now_v7(),
            seller_id: Uuid::now_v7(),
            title: "item".into(),
            price: ListingPrice {
                price: cents(price),
                vat_amount: explicit.then(|| cents(vat)),
                vat_percent: (!explicit).then(|| Percent::from_basis_points(bp)),
                main_price: cents(main),
            },
            stock: GearStock::Available,
        },
    )
}

fn sample_order(requester: Uuid, provider: Uuid) -> EventOrder {
    let package = market_sync::domain::catalog::ServicePackage {
        id: Uuid::now_v7(),
        provider_id: provider,
        title: "pkg".into(),
        pricing: OrderPricing {
            price: cents(100),
            vat_amount: cents(0),
            price_with_service_fee: cents(110),
            total_price: cents(110),
        },
        delivery_days: 3,
    };
    let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    EventOrder::direct(requester, &package, start).unwrap()
}

/// Moves currently open to people, plus settlement when the order is
/// waiting on payment.
fn permitted_moves(order: &EventOrder, people: &[Actor]) -> Vec<(Actor, EventOrderStatus)> {
    let at = Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap();
    let mut moves: Vec<(Actor, EventOrderStatus)> = people
        .iter()
        .flat_map(|actor| EVENT_STATUSES.into_iter().map(move |next| (*actor, next)))
        .filter(|(actor, next)| {
            order
                .clone()
                .transition(actor, *next, StatusChange::default(), at)
                .is_ok()
        })
        .collect();
    if order.awaits_payment() {
        moves.push((Actor::system(), EventOrderStatus::InProgress));
    }
    moves
}

proptest! {
    /// Whatever sequence of requests arrives, history and timestamps stay in
    /// lockstep and the last history entry is the current status.
    #[test]
    fn status_log_stays_consistent(
        steps in prop::collection::vec((arb_event_status(), arb_role()), 1..30)
    ) {
        let requester = Uuid::now_v7();
        let provider = Uuid::now_v7();
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let mut order = sample_order(requester, provider);

        for (i, (target, role)) in steps.into_iter().enumerate() {
            let user = match role {
                Role::Provider => provider,
                Role::Client => requester,
                _ => Uuid::now_v7(),
            };
            let actor = if role == Role::System { Actor::system() } else { Actor::new(user, role) };
            let before = order.clone();
            let at = start + Duration::minutes(i as i64 + 1);
            if order.transition(&actor, target, StatusChange::default(), at).is_err() {
                prop_assert_eq!(&order, &before);
            }
            prop_assert_eq!(order.log.history().len(), order.log.timestamps().len());
            prop_assert_eq!(order.log.history().last().map(|e| e.status), Some(order.status()));
        }
    }

    /// Walking only permitted moves, an open order always has a next step
    /// for one of its parties, an admin, or settlement.
    #[test]
    fn open_orders_always_have_a_next_step(
        picks in prop::collection::vec(any::<prop::sample::Index>(), 0..12)
    ) {
        let (requester, provider) = (Uuid::now_v7(), Uuid::now_v7());
        let people = [
            Actor::new(requester, Role::Client),
            Actor::new(provider, Role::Provider),
            Actor::new(Uuid::now_v7(), Role::Admin),
        ];
        let mut order = sample_order(requester, provider);
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

        for (i, pick) in picks.into_iter().enumerate() {
            if order.status().is_terminal() {
                break;
            }
            let moves = permitted_moves(&order, &people);
            let path: Vec<_> = order.log.history().iter().map(|e| e.status).collect();
            prop_assert!(!moves.is_empty(), "stuck at {} after {:?}", order.status(), path);

            let (actor, next) = *pick.get(&moves);
            let at = start + Duration::minutes(i as i64 + 1);
            order.transition(&actor, next, StatusChange::default(), at).unwrap();
            if next == EventOrderStatus::InProgress {
                order.payment_id = Some(Uuid::now_v7());
            }
        }
    }

    /// Terminal statuses have no way out.
    #[test]
    fn terminal_statuses_reject_everything(from in arb_event_status(), to in arb_event_status()) {
        if from.is_terminal() {
            prop_assert!(!from.can_transition_to(to));
        }
    }

    /// A random walk never revisits a status.
    #[test]
    fn walk_never_revisits(steps in prop::collection::vec(arb_event_status(), 1..40)) {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let mut log = StatusLog::start(EventOrderStatus::Pending, None, start);
        let mut seen = vec![EventOrderStatus::Pending];
        for next in steps {
            if log.advance(next, None, start).is_ok() {
                prop_assert!(!seen.contains(&next), "{next} entered twice");
                seen.push(next);
            }
        }
    }

    /// Commission and net never go negative and always add back up to the
    /// listing price.
    #[test]
    fn listing_quote_is_balanced(listings in prop::collection::vec(arb_listing(), 1..6)) {
        let quote = gear_quote(&listings).unwrap();
        prop_assert_eq!(quote.commission.cents() + quote.net.cents(), quote.gross.cents());
        for share in &quote.shares {
            prop_assert!(share.commission <= share.amount);
        }
    }

    /// A coupon never takes more than the commission and never touches net.
    #[test]
    fn discount_bounded_by_commission(
        listings in prop::collection::vec(arb_listing(), 1..6),
        amount in 0i64..50_000,
    ) {
        let mut quote = gear_quote(&listings).unwrap();
        let (commission, net, gross) = (quote.commission, quote.net, quote.gross);
        let discount = quote.apply_coupon(&coupon("ANY", amount, 0, 1));

        prop_assert!(discount <= commission);
        prop_assert_eq!(quote.net, net);
        prop_assert_eq!(quote.commission, commission.saturating_sub(discount));
        prop_assert_eq!(quote.gross, gross.saturating_sub(discount));
        let share_commission: MoneyAmount = quote.shares.iter().map(|s| s.commission).sum();
        prop_assert_eq!(share_commission, quote.commission);
    }

    /// Only the operator reset leaves a terminal payment status.
    #[test]
    fn completed_payments_are_final(to in prop_oneof![
        Just(PaymentStatus::Pending),
        Just(PaymentStatus::Completed),
        Just(PaymentStatus::Failed),
    ]) {
        prop_assert!(!PaymentStatus::Completed.can_transition_to(&to));
        prop_assert_eq!(
            PaymentStatus::Failed.can_transition_to(&to),
            to == PaymentStatus::Pending
        );
    }

    /// Renewal never shortens and never starts in the past.
    #[test]
    fn renewal_extends_from_later_of_expiry_and_now(
        offset_days in -60i64..60,
        days in 1u32..400,
    ) {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let owner = Uuid::now_v7();
        let mut current = Subscription::renew(owner, Uuid::now_v7(), 30, None, now - Duration::days(90)).unwrap();
        current.expires_at = now + Duration::days(offset_days);

        let renewed = Subscription::renew(owner, Uuid::now_v7(), days, Some(&current), now).unwrap();
        prop_assert_eq!(renewed.starts_at, current.expires_at.max(now));
        prop_assert_eq!(renewed.expires_at - renewed.starts_at, Duration::days(i64::from(days)));
    }

    /// Order codes are zero-padded to four digits and sort by sequence.
    #[test]
    fn order_codes_sort_by_sequence(a in 1u32..10_000, b in 1u32..10_000) {
        let day = chrono::NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
        let (ca, cb) = (workshop_order_code(day, a), workshop_order_code(day, b));
        prop_assert!(ca.starts_with("WORKSHOP-20250309-"));
        prop_assert_eq!(ca.cmp(&cb), a.cmp(&b));
    }

    /// Half-up rounding stays within half a cent of the exact value.
    #[test]
    fn percent_rounds_half_up(cents_in in 0i64..10_000_000, bp in 0u32..10_000) {
        let got = MoneyAmount::new(cents_in).unwrap().percent(Percent::from_basis_points(bp)).cents();
        let exact = i128::from(cents_in) * i128::from(bp);
        let diff = i128::from(got) * 10_000 - exact;
        prop_assert!(diff > -5_000 && diff <= 5_000, "diff {diff}");
    }
}
