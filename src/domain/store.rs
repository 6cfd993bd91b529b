use {
    super::{
        catalog::{GearListing, ServicePackage, Workshop},
        coupon::Coupon,
        error::MarketError,
        event_order::EventOrder,
        gear_order::GearOrder,
        id::SessionId,
        payment::{Payment, PaymentStatus},
        subscription::{Subscription, SubscriptionFlags},
        workshop::WorkshopParticipant,
    },
    async_trait::async_trait,
    chrono::{DateTime, NaiveDate, Utc},
    uuid::Uuid,
};

/// A pending payment picked up by the sweeper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleSession {
    pub session_id: SessionId,
    /// Sweeps of this session that ended in an error so far.
    pub sweep_attempts: u32,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Opens a unit of work. Dropping it without `commit` discards every
    /// write made through it.
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, MarketError>;
}

/// Transactional view over all collections touched by ordering and
/// settlement. Loads of mutable records lock them until the unit of work
/// ends.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Serializes settlement of one checkout session.
    async fn lock_session(&mut self, session_id: &SessionId) -> Result<(), MarketError>;

    async fn payment_by_session(
        &mut self,
        session_id: &SessionId,
    ) -> Result<Option<Payment>, MarketError>;

    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), MarketError>;

    /// Compare-and-set: writes `payment` only if the stored status is still
    /// `expected`. Returns whether the write happened.
    async fn update_payment_if(
        &mut self,
        payment: &Payment,
        expected: PaymentStatus,
    ) -> Result<bool, MarketError>;

    /// Pending payments created before `created_before` that are not held
    /// back past `now`. Fewest failed sweeps first, then oldest.
    async fn stale_pending_payments(
        &mut self,
        created_before: DateTime<Utc>,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<StaleSession>, MarketError>;

    /// Counts a failed sweep of `session_id` and holds it back until `until`.
    async fn defer_sweep(
        &mut self,
        session_id: &SessionId,
        until: DateTime<Utc>,
    ) -> Result<(), MarketError>;

    async fn service_package(&mut self, id: Uuid) -> Result<Option<ServicePackage>, MarketError>;

    async fn gear_listing(&mut self, id: Uuid) -> Result<Option<GearListing>, MarketError>;

    /// Flips the stock flag to sold out. `false` if it already was.
    async fn mark_sold_out(&mut self, listing_id: Uuid) -> Result<bool, MarketError>;

    async fn workshop(&mut self, id: Uuid) -> Result<Option<Workshop>, MarketError>;

    /// Takes one seat if any is left.
    async fn reserve_seat(&mut self, workshop_id: Uuid) -> Result<bool, MarketError>;

    /// Next value of a per-day counter, starting at 1.
    async fn next_sequence(&mut self, scope: &str, day: NaiveDate) -> Result<u32, MarketError>;

    async fn coupon_by_code(&mut self, code: &str) -> Result<Option<Coupon>, MarketError>;

    /// Increments usage if still below the limit.
    async fn consume_coupon(&mut self, coupon_id: Uuid) -> Result<bool, MarketError>;

    async fn event_order(&mut self, id: Uuid) -> Result<Option<EventOrder>, MarketError>;

    async fn insert_event_order(&mut self, order: &EventOrder) -> Result<(), MarketError>;

    async fn update_event_order(&mut self, order: &EventOrder) -> Result<(), MarketError>;

    async fn gear_order(&mut self, id: Uuid) -> Result<Option<GearOrder>, MarketError>;

    async fn insert_gear_order(&mut self, order: &GearOrder) -> Result<(), MarketError>;

    async fn update_gear_order(&mut self, order: &GearOrder) -> Result<(), MarketError>;

    async fn participant(&mut self, id: Uuid) -> Result<Option<WorkshopParticipant>, MarketError>;

    async fn participant_for(
        &mut self,
        workshop_id: Uuid,
        client_id: Uuid,
    ) -> Result<Option<WorkshopParticipant>, MarketError>;

    async fn insert_participant(&mut self, p: &WorkshopParticipant) -> Result<(), MarketError>;

    async fn update_participant(&mut self, p: &WorkshopParticipant) -> Result<(), MarketError>;

    async fn active_subscription(
        &mut self,
        owner_id: Uuid,
    ) -> Result<Option<Subscription>, MarketError>;

    async fn lapsed_subscriptions(
        &mut self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Subscription>, MarketError>;

    async fn insert_subscription(&mut self, sub: &Subscription) -> Result<(), MarketError>;

    async fn update_subscription(&mut self, sub: &Subscription) -> Result<(), MarketError>;

    async fn subscription_flags(&mut self, owner_id: Uuid)
    -> Result<SubscriptionFlags, MarketError>;

    async fn set_subscription_flags(
        &mut self,
        owner_id: Uuid,
        flags: &SubscriptionFlags,
    ) -> Result<(), MarketError>;

    async fn commit(self: Box<Self>) -> Result<(), MarketError>;
}
