#![allow(dead_code)]

use {
    chrono::{Duration, Utc},
    market_sync::{
        domain::{
            actor::{Actor, Role},
            catalog::{GearListing, GearStock, ListingPrice, ServicePackage, Workshop},
            coupon::Coupon,
            error::MarketError,
            event_order::{EventOrder, EventOrderStatus, OrderPricing, StatusChange},
            id::SessionId,
            money::{Currency, MoneyAmount, Percent},
            notify::{Notification, NotificationKind, Notifier},
            payment::{GatewayStatus, Payment},
            provider::{CheckoutRequest, HostedSession, PaymentProvider},
            store::Store,
        },
        infra::memory::MemoryStore,
        services::{
            checkout::{self, CheckoutConfig, CheckoutPayload, CheckoutSession},
            orders::{self, NewEventOrder},
            reconciler,
        },
    },
    std::{
        collections::{HashMap, HashSet},
        future::Future,
        pin::Pin,
        sync::{
            Arc, Mutex,
            atomic::{AtomicU32, Ordering},
        },
    },
    uuid::Uuid,
};

pub fn cents(v: i64) -> MoneyAmount {
    MoneyAmount::new(v).unwrap()
}

pub fn client() -> Actor {
    Actor::new(Uuid::now_v7(), Role::Client)
}

pub fn provider() -> Actor {
    Actor::new(Uuid::now_v7(), Role::Provider)
}

pub fn admin() -> Actor {
    Actor::new(Uuid::now_v7(), Role::Admin)
}

// ── Gateway ────────────────────────────────────────────────────────────────

/// Hosted checkout stand-in. Sessions are numbered `cs_test_N`; statuses
/// default to pending until scripted.
#[derive(Default)]
pub struct FakeGateway {
    counter: AtomicU32,
    statuses: Mutex<HashMap<String, GatewayStatus>>,
    requests: Mutex<Vec<CheckoutRequest>>,
    status_calls: AtomicU32,
    fail_create: Mutex<bool>,
    expired: Mutex<HashSet<String>>,
    paid_during_expiry: Mutex<HashSet<String>>,
    unreachable: Mutex<HashSet<String>>,
}

impl FakeGateway {
    pub fn set_status(&self, session_id: &SessionId, status: GatewayStatus) {
        self.statuses
            .lock()
            .unwrap()
            .insert(session_id.as_str().to_string(), status);
    }

    pub fn fail_next_create(&self) {
        *self.fail_create.lock().unwrap() = true;
    }

    pub fn requests(&self) -> Vec<CheckoutRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn status_calls(&self) -> u32 {
        self.status_calls.load(Ordering::SeqCst)
    }

    /// The payer submits the hosted page. Refused once the session expired.
    pub fn complete(&self, session_id: &SessionId) -> bool {
        if self.expired.lock().unwrap().contains(session_id.as_str()) {
            return false;
        }
        self.set_status(session_id, GatewayStatus::Succeeded);
        true
    }

    /// The payer completes the page while the expiry request is in flight.
    pub fn pay_during_expiry(&self, session_id: &SessionId) {
        self.paid_during_expiry
            .lock()
            .unwrap()
            .insert(session_id.as_str().to_string());
    }

    /// Every call about this session fails, as for a session the gateway
    /// does not know.
    pub fn make_unreachable(&self, session_id: &SessionId) {
        self.unreachable
            .lock()
            .unwrap()
            .insert(session_id.as_str().to_string());
    }

    pub fn expired_sessions(&self) -> HashSet<String> {
        self.expired.lock().unwrap().clone()
    }

    fn check_reachable(&self, key: &str) -> Result<(), MarketError> {
        if self.unreachable.lock().unwrap().contains(key) {
            return Err(MarketError::Gateway(format!("no such checkout session: {key}")));
        }
        Ok(())
    }
}

impl PaymentProvider for FakeGateway {
    fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HostedSession, MarketError>> + Send + '_>> {
        Box::pin(async move {
            if std::mem::take(&mut *self.fail_create.lock().unwrap()) {
                return Err(MarketError::Gateway("gateway unavailable".into()));
            }
            let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
            let id = SessionId::new(format!("cs_test_{n}"))?;
            self.requests.lock().unwrap().push(request);
            Ok(HostedSession {
                url: format!("https://checkout.test/{id}"),
                id,
            })
        })
    }

    fn payment_status(
        &self,
        id: &SessionId,
    ) -> Pin<Box<dyn Future<Output = Result<GatewayStatus, MarketError>> + Send + '_>> {
        let key = id.as_str().to_string();
        Box::pin(async move {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            self.check_reachable(&key)?;
            Ok(self
                .statuses
                .lock()
                .unwrap()
                .get(&key)
                .copied()
                .unwrap_or(GatewayStatus::Pending))
        })
    }

    fn expire_checkout_session(
        &self,
        id: &SessionId,
    ) -> Pin<Box<dyn Future<Output = Result<GatewayStatus, MarketError>> + Send + '_>> {
        let key = id.as_str().to_string();
        Box::pin(async move {
            self.check_reachable(&key)?;
            let mut statuses = self.statuses.lock().unwrap();
            if self.paid_during_expiry.lock().unwrap().contains(&key) {
                statuses.insert(key, GatewayStatus::Succeeded);
                return Ok(GatewayStatus::Succeeded);
            }
            match statuses.get(&key) {
                Some(GatewayStatus::Succeeded) => Ok(GatewayStatus::Succeeded),
                _ => {
                    statuses.insert(key.clone(), GatewayStatus::Failed);
                    self.expired.lock().unwrap().insert(key);
                    Ok(GatewayStatus::Failed)
                }
            }
        })
    }
}

// ── Notifier ───────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn kinds(&self) -> Vec<NotificationKind> {
        self.sent.lock().unwrap().iter().map(|n| n.kind).collect()
    }

    /// Delivery is spawned; polls until `kind` shows up or the wait runs out.
    pub async fn wait_for(&self, kind: NotificationKind) -> bool {
        for _ in 0..50 {
            if self.kinds().contains(&kind) {
                return true;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        false
    }
}

impl Notifier for RecordingNotifier {
    fn notify(
        &self,
        notification: Notification,
    ) -> Pin<Box<dyn Future<Output = Result<(), MarketError>> + Send + '_>> {
        Box::pin(async move {
            self.sent.lock().unwrap().push(notification);
            Ok(())
        })
    }
}

// ── Fixtures ───────────────────────────────────────────────────────────────

/// price 100.00, service fee 10.00: commission 1000, net 10000.
pub fn package(provider_id: Uuid) -> ServicePackage {
    ServicePackage {
        id: Uuid::now_v7(),
        provider_id,
        title: "Wedding photography".into(),
        pricing: OrderPricing {
            price: cents(10_000),
            vat_amount: cents(0),
            price_with_service_fee: cents(11_000),
            total_price: cents(11_000),
        },
        delivery_days: 14,
    }
}

/// main 66.00 over price 50.00 + VAT 10.00: commission 600, net 6000.
pub fn gear_listing(seller_id: Uuid) -> GearListing {
    GearListing {
        id: Uuid::now_v7(),
        seller_id,
        title: "Used tripod".into(),
        price: ListingPrice {
            price: cents(5_000),
            vat_amount: Some(cents(1_000)),
            vat_percent: None,
            main_price: cents(6_600),
        },
        stock: GearStock::Available,
    }
}

/// main 25.00 over price 20.00 + 10% VAT: commission 300, net 2200.
pub fn workshop(author_id: Uuid, capacity: u32) -> Workshop {
    Workshop {
        id: Uuid::now_v7(),
        author_id,
        title: "Lighting basics".into(),
        price: ListingPrice {
            price: cents(2_000),
            vat_amount: None,
            vat_percent: Some(Percent::whole(10)),
            main_price: cents(2_500),
        },
        starts_at: Utc::now() + Duration::days(7),
        capacity,
        participant_count: 0,
    }
}

pub fn coupon(code: &str, amount: i64, minimum_spend: i64, usage_limit: u32) -> Coupon {
    Coupon {
        id: Uuid::now_v7(),
        code: code.into(),
        minimum_spend: cents(minimum_spend),
        amount: cents(amount),
        usage_limit,
        used_count: 0,
        expires_at: Utc::now() + Duration::days(30),
        is_active: true,
    }
}

pub fn event_payload(order_id: Uuid) -> CheckoutPayload {
    CheckoutPayload {
        payment_type: market_sync::domain::payment::PaymentType::Event,
        ref_id: Some(order_id),
        listing_ids: Vec::new(),
        days: None,
        amount: None,
        coupon_code: None,
    }
}

pub fn gear_payload(listing_ids: Vec<Uuid>) -> CheckoutPayload {
    CheckoutPayload {
        payment_type: market_sync::domain::payment::PaymentType::Gear,
        ref_id: None,
        listing_ids,
        days: None,
        amount: None,
        coupon_code: None,
    }
}

pub fn workshop_payload(workshop_id: Uuid) -> CheckoutPayload {
    CheckoutPayload {
        payment_type: market_sync::domain::payment::PaymentType::Workshop,
        ref_id: Some(workshop_id),
        listing_ids: Vec::new(),
        days: None,
        amount: None,
        coupon_code: None,
    }
}

pub fn subscription_payload(days: u32, amount: i64) -> CheckoutPayload {
    CheckoutPayload {
        payment_type: market_sync::domain::payment::PaymentType::Subscription,
        ref_id: None,
        listing_ids: Vec::new(),
        days: Some(days),
        amount: Some(cents(amount)),
        coupon_code: None,
    }
}

// ── Harness ────────────────────────────────────────────────────────────────

pub struct Harness {
    pub store: MemoryStore,
    pub gateway: Arc<FakeGateway>,
    pub recorder: Arc<RecordingNotifier>,
    pub notifier: Arc<dyn Notifier>,
    pub config: CheckoutConfig,
}

impl Harness {
    pub fn new() -> Self {
        let recorder = Arc::new(RecordingNotifier::default());
        Self {
            store: MemoryStore::new(),
            gateway: Arc::new(FakeGateway::default()),
            notifier: recorder.clone(),
            recorder,
            config: CheckoutConfig {
                currency: Currency::Usd,
                success_url: "https://market.test/payment/confirm-payment".into(),
                cancel_url: "https://market.test/payment/cancel".into(),
                session_ttl: Duration::hours(24),
            },
        }
    }

    pub async fn checkout(
        &self,
        payer: &Actor,
        payload: CheckoutPayload,
    ) -> Result<CheckoutSession, MarketError> {
        checkout::create_session(&self.store, &*self.gateway, &self.config, payer, payload).await
    }

    pub async fn confirm(
        &self,
        session_id: &SessionId,
    ) -> Result<market_sync::domain::payment::SettlementResult, MarketError> {
        reconciler::confirm(&self.store, &*self.gateway, &self.notifier, session_id).await
    }

    /// Checkout, script the gateway to succeeded and confirm.
    pub async fn pay(&self, payer: &Actor, payload: CheckoutPayload) -> Payment {
        let session = self.checkout(payer, payload).await.unwrap();
        self.gateway
            .set_status(&session.session_id, GatewayStatus::Succeeded);
        self.confirm(&session.session_id)
            .await
            .unwrap()
            .payment()
            .clone()
    }

    pub async fn payment(&self, session_id: &SessionId) -> Payment {
        let mut uow = self.store.begin().await.unwrap();
        uow.payment_by_session(session_id).await.unwrap().unwrap()
    }

    pub async fn event_order(&self, id: Uuid) -> EventOrder {
        let mut uow = self.store.begin().await.unwrap();
        uow.event_order(id).await.unwrap().unwrap()
    }

    pub async fn gear(&self, id: Uuid) -> GearListing {
        let mut uow = self.store.begin().await.unwrap();
        uow.gear_listing(id).await.unwrap().unwrap()
    }

    pub async fn workshop(&self, id: Uuid) -> Workshop {
        let mut uow = self.store.begin().await.unwrap();
        uow.workshop(id).await.unwrap().unwrap()
    }

    pub async fn coupon(&self, code: &str) -> Coupon {
        let mut uow = self.store.begin().await.unwrap();
        uow.coupon_by_code(code).await.unwrap().unwrap()
    }

    /// A direct order for a fresh package, accepted by its provider.
    pub async fn accepted_event_order(&self, client: &Actor) -> (EventOrder, Actor) {
        let seller = provider();
        let pkg = package(seller.user_id);
        self.store.put_package(pkg.clone()).await;
        let order = orders::create_event_order(
            &self.store,
            &self.notifier,
            client,
            NewEventOrder::Direct { package_id: pkg.id },
        )
        .await
        .unwrap();
        let order = orders::change_event_order_status(
            &self.store,
            &self.notifier,
            &seller,
            order.id,
            EventOrderStatus::Accepted,
            StatusChange::default(),
        )
        .await
        .unwrap();
        (order, seller)
    }
}
