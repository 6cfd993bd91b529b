use {
    crate::domain::{
        catalog::{GearListing, GearStock, ServicePackage, Workshop},
        coupon::{Coupon, normalize_code},
        error::MarketError,
        event_order::EventOrder,
        gear_order::GearOrder,
        id::SessionId,
        payment::{Payment, PaymentStatus},
        store::{StaleSession, Store, UnitOfWork},
        subscription::{Subscription, SubscriptionFlags},
        workshop::WorkshopParticipant,
    },
    async_trait::async_trait,
    chrono::{DateTime, NaiveDate, Utc},
    std::{collections::HashMap, sync::Arc},
    tokio::sync::{Mutex, OwnedMutexGuard},
    uuid::Uuid,
};

#[derive(Default, Clone)]
struct MemoryData {
    payments: HashMap<SessionId, Payment>,
    packages: HashMap<Uuid, ServicePackage>,
    gear: HashMap<Uuid, GearListing>,
    workshops: HashMap<Uuid, Workshop>,
    coupons: HashMap<Uuid, Coupon>,
    event_orders: HashMap<Uuid, EventOrder>,
    gear_orders: HashMap<Uuid, GearOrder>,
    participants: HashMap<Uuid, WorkshopParticipant>,
    subscriptions: HashMap<Uuid, Subscription>,
    flags: HashMap<Uuid, SubscriptionFlags>,
    sequences: HashMap<(String, NaiveDate), u32>,
    /// Failed sweep count and hold-back time per pending session.
    sweeps: HashMap<SessionId, (u32, DateTime<Utc>)>,
}

/// In-memory store. Units of work run one at a time and stage their writes
/// on a copy that replaces the live data on commit.
#[derive(Clone, Default)]
pub struct MemoryStore {
    data: Arc<Mutex<MemoryData>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_package(&self, package: ServicePackage) {
        self.data.lock().await.packages.insert(package.id, package);
    }

    pub async fn put_gear_listing(&self, listing: GearListing) {
        self.data.lock().await.gear.insert(listing.id, listing);
    }

    pub async fn put_workshop(&self, workshop: Workshop) {
        self.data.lock().await.workshops.insert(workshop.id, workshop);
    }

    pub async fn put_coupon(&self, coupon: Coupon) {
        self.data.lock().await.coupons.insert(coupon.id, coupon);
    }

    pub async fn put_subscription(&self, sub: Subscription) {
        let mut data = self.data.lock().await;
        if sub.is_active() {
            data.flags
                .insert(sub.owner_id, SubscriptionFlags::from_active(&sub));
        }
        data.subscriptions.insert(sub.id, sub);
    }

    /// Participants of one workshop, for inspection.
    pub async fn participants_of(&self, workshop_id: Uuid) -> Vec<WorkshopParticipant> {
        self.data
            .lock()
            .await
            .participants
            .values()
            .filter(|p| p.workshop_id == workshop_id)
            .cloned()
            .collect()
    }

    /// All subscriptions of one owner, oldest first.
    pub async fn subscriptions_of(&self, owner_id: Uuid) -> Vec<Subscription> {
        let mut subs: Vec<Subscription> = self
            .data
            .lock()
            .await
            .subscriptions
            .values()
            .filter(|s| s.owner_id == owner_id)
            .cloned()
            .collect();
        subs.sort_by_key(|s| s.starts_at);
        subs
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, MarketError> {
        let guard = Arc::clone(&self.data).lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryUnitOfWork { guard, staged }))
    }
}

struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<MemoryData>,
    staged: MemoryData,
}

fn missing(entity: &str, id: impl std::fmt::Display) -> MarketError {
    MarketError::not_found(entity, id)
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn lock_session(&mut self, _session_id: &SessionId) -> Result<(), MarketError> {
        // The whole store is already held by this unit of work.
        Ok(())
    }

    async fn payment_by_session(
        &mut self,
        session_id: &SessionId,
    ) -> Result<Option<Payment>, MarketError> {
        Ok(self.staged.payments.get(session_id).cloned())
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), MarketError> {
        if self.staged.payments.contains_key(&payment.session_id) {
            return Err(MarketError::Conflict(format!(
                "payment for session {} already exists",
                payment.session_id
            )));
        }
        self.staged
            .payments
            .insert(payment.session_id.clone(), payment.clone());
        Ok(())
    }

    async fn update_payment_if(
        &mut self,
        payment: &Payment,
        expected: PaymentStatus,
    ) -> Result<bool, MarketError> {
        match self.staged.payments.get_mut(&payment.session_id) {
            Some(stored) if stored.status == expected => {
                *stored = payment.clone();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(missing("payment", &payment.session_id)),
        }
    }

    async fn stale_pending_payments(
        &mut self,
        created_before: DateTime<Utc>,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<StaleSession>, MarketError> {
        let sweeps = &self.staged.sweeps;
        let mut stale: Vec<(u32, &Payment)> = self
            .staged
            .payments
            .values()
            .filter(|p| p.status == PaymentStatus::Pending && p.created_at < created_before)
            .filter_map(|p| match sweeps.get(&p.session_id) {
                Some((_, until)) if *until > now => None,
                Some((attempts, _)) => Some((*attempts, p)),
                None => Some((0, p)),
            })
            .collect();
        stale.sort_by_key(|(attempts, p)| (*attempts, p.created_at));
        Ok(stale
            .into_iter()
            .take(usize::try_from(limit).unwrap_or(0))
            .map(|(sweep_attempts, p)| StaleSession {
                session_id: p.session_id.clone(),
                sweep_attempts,
            })
            .collect())
    }

    async fn defer_sweep(
        &mut self,
        session_id: &SessionId,
        until: DateTime<Utc>,
    ) -> Result<(), MarketError> {
        let pending = self
            .staged
            .payments
            .get(session_id)
            .is_some_and(|p| p.status == PaymentStatus::Pending);
        if pending {
            let entry = self
                .staged
                .sweeps
                .entry(session_id.clone())
                .or_insert((0, until));
            *entry = (entry.0 + 1, until);
        }
        Ok(())
    }

    async fn service_package(&mut self, id: Uuid) -> Result<Option<ServicePackage>, MarketError> {
        Ok(self.staged.packages.get(&id).cloned())
    }

    async fn gear_listing(&mut self, id: Uuid) -> Result<Option<GearListing>, MarketError> {
        Ok(self.staged.gear.get(&id).cloned())
    }

    async fn mark_sold_out(&mut self, listing_id: Uuid) -> Result<bool, MarketError> {
        let listing = self
            .staged
            .gear
            .get_mut(&listing_id)
            .ok_or_else(|| missing("gear listing", listing_id))?;
        if listing.stock == GearStock::SoldOut {
            return Ok(false);
        }
        listing.stock = GearStock::SoldOut;
        Ok(true)
    }

    async fn workshop(&mut self, id: Uuid) -> Result<Option<Workshop>, MarketError> {
        Ok(self.staged.workshops.get(&id).cloned())
    }

    async fn reserve_seat(&mut self, workshop_id: Uuid) -> Result<bool, MarketError> {
        let workshop = self
            .staged
            .workshops
            .get_mut(&workshop_id)
            .ok_or_else(|| missing("workshop", workshop_id))?;
        if !workshop.has_seat() {
            return Ok(false);
        }
        workshop.participant_count += 1;
        Ok(true)
    }

    async fn next_sequence(&mut self, scope: &str, day: NaiveDate) -> Result<u32, MarketError> {
        let value = self
            .staged
            .sequences
            .entry((scope.to_string(), day))
            .or_insert(0);
        *value += 1;
        Ok(*value)
    }

    async fn coupon_by_code(&mut self, code: &str) -> Result<Option<Coupon>, MarketError> {
        let code = normalize_code(code);
        Ok(self
            .staged
            .coupons
            .values()
            .find(|c| normalize_code(&c.code) == code)
            .cloned())
    }

    async fn consume_coupon(&mut self, coupon_id: Uuid) -> Result<bool, MarketError> {
        let coupon = self
            .staged
            .coupons
            .get_mut(&coupon_id)
            .ok_or_else(|| missing("coupon", coupon_id))?;
        if coupon.used_count >= coupon.usage_limit {
            return Ok(false);
        }
        coupon.used_count += 1;
        Ok(true)
    }

    async fn event_order(&mut self, id: Uuid) -> Result<Option<EventOrder>, MarketError> {
        Ok(self.staged.event_orders.get(&id).cloned())
    }

    async fn insert_event_order(&mut self, order: &EventOrder) -> Result<(), MarketError> {
        self.staged.event_orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn update_event_order(&mut self, order: &EventOrder) -> Result<(), MarketError> {
        let stored = self
            .staged
            .event_orders
            .get_mut(&order.id)
            .ok_or_else(|| missing("event order", order.id))?;
        *stored = order.clone();
        Ok(())
    }

    async fn gear_order(&mut self, id: Uuid) -> Result<Option<GearOrder>, MarketError> {
        Ok(self.staged.gear_orders.get(&id).cloned())
    }

    async fn insert_gear_order(&mut self, order: &GearOrder) -> Result<(), MarketError> {
        self.staged.gear_orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn update_gear_order(&mut self, order: &GearOrder) -> Result<(), MarketError> {
        let stored = self
            .staged
            .gear_orders
            .get_mut(&order.id)
            .ok_or_else(|| missing("gear order", order.id))?;
        *stored = order.clone();
        Ok(())
    }

    async fn participant(&mut self, id: Uuid) -> Result<Option<WorkshopParticipant>, MarketError> {
        Ok(self.staged.participants.get(&id).cloned())
    }

    async fn participant_for(
        &mut self,
        workshop_id: Uuid,
        client_id: Uuid,
    ) -> Result<Option<WorkshopParticipant>, MarketError> {
        Ok(self
            .staged
            .participants
            .values()
            .find(|p| p.workshop_id == workshop_id && p.client_id == client_id && !p.is_deleted)
            .cloned())
    }

    async fn insert_participant(&mut self, p: &WorkshopParticipant) -> Result<(), MarketError> {
        let duplicate = self
            .staged
            .participants
            .values()
            .any(|existing| existing.order_code == p.order_code);
        if duplicate {
            return Err(MarketError::Conflict(format!(
                "participant order {} already exists",
                p.order_code
            )));
        }
        self.staged.participants.insert(p.id, p.clone());
        Ok(())
    }

    async fn update_participant(&mut self, p: &WorkshopParticipant) -> Result<(), MarketError> {
        let stored = self
            .staged
            .participants
            .get_mut(&p.id)
            .ok_or_else(|| missing("workshop participant", p.id))?;
        *stored = p.clone();
        Ok(())
    }

    async fn active_subscription(
        &mut self,
        owner_id: Uuid,
    ) -> Result<Option<Subscription>, MarketError> {
        Ok(self
            .staged
            .subscriptions
            .values()
            .find(|s| s.owner_id == owner_id && s.is_active())
            .cloned())
    }

    async fn lapsed_subscriptions(
        &mut self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Subscription>, MarketError> {
        Ok(self
            .staged
            .subscriptions
            .values()
            .filter(|s| s.is_active() && s.expires_at <= now)
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }

    async fn insert_subscription(&mut self, sub: &Subscription) -> Result<(), MarketError> {
        if sub.is_active()
            && self
                .staged
                .subscriptions
                .values()
                .any(|s| s.owner_id == sub.owner_id && s.is_active())
        {
            return Err(MarketError::Conflict(format!(
                "owner {} already has an active subscription",
                sub.owner_id
            )));
        }
        self.staged.subscriptions.insert(sub.id, sub.clone());
        Ok(())
    }

    async fn update_subscription(&mut self, sub: &Subscription) -> Result<(), MarketError> {
        let stored = self
            .staged
            .subscriptions
            .get_mut(&sub.id)
            .ok_or_else(|| missing("subscription", sub.id))?;
        *stored = sub.clone();
        Ok(())
    }

    async fn subscription_flags(
        &mut self,
        owner_id: Uuid,
    ) -> Result<SubscriptionFlags, MarketError> {
        Ok(self
            .staged
            .flags
            .get(&owner_id)
            .copied()
            .unwrap_or_default())
    }

    async fn set_subscription_flags(
        &mut self,
        owner_id: Uuid,
        flags: &SubscriptionFlags,
    ) -> Result<(), MarketError> {
        self.staged.flags.insert(owner_id, *flags);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), MarketError> {
        let MemoryUnitOfWork { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}
