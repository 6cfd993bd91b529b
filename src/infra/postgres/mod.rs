pub mod catalog_repo;
pub mod order_repo;
pub mod payment_repo;
pub mod subscription_repo;

use {
    crate::domain::{
        catalog::{GearListing, ServicePackage, Workshop},
        coupon::Coupon,
        error::MarketError,
        event_order::EventOrder,
        gear_order::GearOrder,
        id::SessionId,
        money::MoneyAmount,
        payment::{Payment, PaymentStatus},
        store::{StaleSession, Store, UnitOfWork},
        subscription::{Subscription, SubscriptionFlags},
        workshop::WorkshopParticipant,
    },
    async_trait::async_trait,
    chrono::{DateTime, NaiveDate, Utc},
    sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow},
    uuid::Uuid,
};

pub(crate) type Tx = Transaction<'static, Postgres>;

pub(crate) fn amount(row: &PgRow, column: &str) -> Result<MoneyAmount, MarketError> {
    MoneyAmount::new(row.try_get::<i64, _>(column)?)
}

pub(crate) fn count(row: &PgRow, column: &str) -> Result<u32, MarketError> {
    let value: i32 = row.try_get(column)?;
    u32::try_from(value)
        .map_err(|_| MarketError::Validation(format!("{column} cannot be negative: {value}")))
}

/// Maps a unique-constraint violation to `Conflict`; everything else stays a
/// database error.
pub(crate) fn unique_violation(err: sqlx::Error, message: String) -> MarketError {
    match err.as_database_error() {
        Some(db) if db.is_unique_violation() => MarketError::Conflict(message),
        _ => MarketError::Database(err),
    }
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), MarketError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, MarketError> {
        let mut tx = self.pool.begin().await?;
        // Fail fast instead of queueing behind a long settlement.
        sqlx::query("SET LOCAL lock_timeout = '5s'")
            .execute(&mut *tx)
            .await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }
}

/// One Postgres transaction. Dropped without `commit`, sqlx rolls it back.
pub struct PgUnitOfWork {
    tx: Tx,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn lock_session(&mut self, session_id: &SessionId) -> Result<(), MarketError> {
        payment_repo::lock_session(&mut self.tx, session_id).await
    }

    async fn payment_by_session(
        &mut self,
        session_id: &SessionId,
    ) -> Result<Option<Payment>, MarketError> {
        payment_repo::find_by_session(&mut self.tx, session_id).await
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), MarketError> {
        payment_repo::insert_payment(&mut self.tx, payment)
            .await
            .map_err(|e| match e {
                MarketError::Database(err) => unique_violation(
                    err,
                    format!("payment for session {} already exists", payment.session_id),
                ),
                other => other,
            })
    }

    async fn update_payment_if(
        &mut self,
        payment: &Payment,
        expected: PaymentStatus,
    ) -> Result<bool, MarketError> {
        payment_repo::update_status_if(&mut self.tx, payment, expected).await
    }

    async fn stale_pending_payments(
        &mut self,
        created_before: DateTime<Utc>,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<StaleSession>, MarketError> {
        payment_repo::stale_pending(&mut self.tx, created_before, now, limit).await
    }

    async fn defer_sweep(
        &mut self,
        session_id: &SessionId,
        until: DateTime<Utc>,
    ) -> Result<(), MarketError> {
        payment_repo::defer_sweep(&mut self.tx, session_id, until).await
    }

    async fn service_package(&mut self, id: Uuid) -> Result<Option<ServicePackage>, MarketError> {
        catalog_repo::find_package(&mut self.tx, id).await
    }

    async fn gear_listing(&mut self, id: Uuid) -> Result<Option<GearListing>, MarketError> {
        catalog_repo::find_gear_listing(&mut self.tx, id).await
    }

    async fn mark_sold_out(&mut self, listing_id: Uuid) -> Result<bool, MarketError> {
        catalog_repo::mark_sold_out(&mut self.tx, listing_id).await
    }

    async fn workshop(&mut self, id: Uuid) -> Result<Option<Workshop>, MarketError> {
        catalog_repo::find_workshop(&mut self.tx, id).await
    }

    async fn reserve_seat(&mut self, workshop_id: Uuid) -> Result<bool, MarketError> {
        catalog_repo::reserve_seat(&mut self.tx, workshop_id).await
    }

    async fn next_sequence(&mut self, scope: &str, day: NaiveDate) -> Result<u32, MarketError> {
        catalog_repo::next_sequence(&mut self.tx, scope, day).await
    }

    async fn coupon_by_code(&mut self, code: &str) -> Result<Option<Coupon>, MarketError> {
        catalog_repo::find_coupon(&mut self.tx, code).await
    }

    async fn consume_coupon(&mut self, coupon_id: Uuid) -> Result<bool, MarketError> {
        catalog_repo::consume_coupon(&mut self.tx, coupon_id).await
    }

    async fn event_order(&mut self, id: Uuid) -> Result<Option<EventOrder>, MarketError> {
        order_repo::find_event_order(&mut self.tx, id).await
    }

    async fn insert_event_order(&mut self, order: &EventOrder) -> Result<(), MarketError> {
        order_repo::insert_event_order(&mut self.tx, order).await
    }

    async fn update_event_order(&mut self, order: &EventOrder) -> Result<(), MarketError> {
        order_repo::update_event_order(&mut self.tx, order).await
    }

    async fn gear_order(&mut self, id: Uuid) -> Result<Option<GearOrder>, MarketError> {
        order_repo::find_gear_order(&mut self.tx, id).await
    }

    async fn insert_gear_order(&mut self, order: &GearOrder) -> Result<(), MarketError> {
        order_repo::insert_gear_order(&mut self.tx, order).await
    }

    async fn update_gear_order(&mut self, order: &GearOrder) -> Result<(), MarketError> {
        order_repo::update_gear_order(&mut self.tx, order).await
    }

    async fn participant(&mut self, id: Uuid) -> Result<Option<WorkshopParticipant>, MarketError> {
        order_repo::find_participant(&mut self.tx, id).await
    }

    async fn participant_for(
        &mut self,
        workshop_id: Uuid,
        client_id: Uuid,
    ) -> Result<Option<WorkshopParticipant>, MarketError> {
        order_repo::find_participant_for(&mut self.tx, workshop_id, client_id).await
    }

    async fn insert_participant(&mut self, p: &WorkshopParticipant) -> Result<(), MarketError> {
        order_repo::insert_participant(&mut self.tx, p).await
    }

    async fn update_participant(&mut self, p: &WorkshopParticipant) -> Result<(), MarketError> {
        order_repo::update_participant(&mut self.tx, p).await
    }

    async fn active_subscription(
        &mut self,
        owner_id: Uuid,
    ) -> Result<Option<Subscription>, MarketError> {
        subscription_repo::find_active(&mut self.tx, owner_id).await
    }

    async fn lapsed_subscriptions(
        &mut self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Subscription>, MarketError> {
        subscription_repo::find_lapsed(&mut self.tx, now, limit).await
    }

    async fn insert_subscription(&mut self, sub: &Subscription) -> Result<(), MarketError> {
        subscription_repo::insert(&mut self.tx, sub).await
    }

    async fn update_subscription(&mut self, sub: &Subscription) -> Result<(), MarketError> {
        subscription_repo::update(&mut self.tx, sub).await
    }

    async fn subscription_flags(
        &mut self,
        owner_id: Uuid,
    ) -> Result<SubscriptionFlags, MarketError> {
        subscription_repo::find_flags(&mut self.tx, owner_id).await
    }

    async fn set_subscription_flags(
        &mut self,
        owner_id: Uuid,
        flags: &SubscriptionFlags,
    ) -> Result<(), MarketError> {
        subscription_repo::upsert_flags(&mut self.tx, owner_id, flags).await
    }

    async fn commit(self: Box<Self>) -> Result<(), MarketError> {
        self.tx.commit().await?;
        Ok(())
    }
}
