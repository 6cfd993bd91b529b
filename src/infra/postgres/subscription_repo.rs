use {
    super::{Tx, count, unique_violation},
    crate::domain::{
        error::MarketError,
        lifecycle::Lifecycle,
        subscription::{Subscription, SubscriptionFlags},
    },
    chrono::{DateTime, Utc},
    sqlx::{Row, postgres::PgRow, types::Json},
    uuid::Uuid,
};

const SUBSCRIPTION_COLUMNS: &str =
    "id, owner_id, payment_id, days, starts_at, expires_at, status_log";

fn subscription_from_row(row: &PgRow) -> Result<Subscription, MarketError> {
    Ok(Subscription {
        id: row.try_get("id")?,
        owner_id: row.try_get("owner_id")?,
        payment_id: row.try_get("payment_id")?,
        days: count(row, "days")?,
        starts_at: row.try_get("starts_at")?,
        expires_at: row.try_get("expires_at")?,
        log: row.try_get::<Json<_>, _>("status_log")?.0,
    })
}

pub async fn find_active(tx: &mut Tx, owner_id: Uuid) -> Result<Option<Subscription>, MarketError> {
    let row = sqlx::query(&format!(
        "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions \
         WHERE owner_id = $1 AND status = 'active' FOR UPDATE"
    ))
    .bind(owner_id)
    .fetch_optional(&mut **tx)
    .await?;

    row.as_ref().map(subscription_from_row).transpose()
}

/// Active windows that ended at or before `now`. Skips rows another
/// sweeper already holds.
pub async fn find_lapsed(
    tx: &mut Tx,
    now: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<Subscription>, MarketError> {
    let rows = sqlx::query(&format!(
        "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions \
         WHERE status = 'active' AND expires_at <= $1 \
         ORDER BY expires_at LIMIT $2 FOR UPDATE SKIP LOCKED"
    ))
    .bind(now)
    .bind(limit)
    .fetch_all(&mut **tx)
    .await?;

    rows.iter().map(subscription_from_row).collect()
}

pub async fn insert(tx: &mut Tx, sub: &Subscription) -> Result<(), MarketError> {
    sqlx::query(
        r#"
        INSERT INTO subscriptions
            (id, owner_id, payment_id, days, starts_at, expires_at, status, status_log)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(sub.id)
    .bind(sub.owner_id)
    .bind(sub.payment_id)
    .bind(i32::try_from(sub.days).map_err(|_| {
        MarketError::Validation(format!("subscription days out of range: {}", sub.days))
    })?)
    .bind(sub.starts_at)
    .bind(sub.expires_at)
    .bind(sub.log.status().as_str())
    .bind(Json(&sub.log))
    .execute(&mut **tx)
    .await
    .map_err(|e| {
        unique_violation(
            e,
            format!("owner {} already has an active subscription", sub.owner_id),
        )
    })?;
    Ok(())
}

pub async fn update(tx: &mut Tx, sub: &Subscription) -> Result<(), MarketError> {
    let result = sqlx::query(
        "UPDATE subscriptions SET status = $2, status_log = $3, updated_at = now() WHERE id = $1",
    )
    .bind(sub.id)
    .bind(sub.log.status().as_str())
    .bind(Json(&sub.log))
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(MarketError::not_found("subscription", sub.id));
    }
    Ok(())
}

pub async fn find_flags(tx: &mut Tx, owner_id: Uuid) -> Result<SubscriptionFlags, MarketError> {
    let row = sqlx::query(
        r#"
        SELECT has_active_subscription, subscription_expires_at, subscription_days
        FROM user_subscription_flags WHERE owner_id = $1
        "#,
    )
    .bind(owner_id)
    .fetch_optional(&mut **tx)
    .await?;

    match row {
        Some(row) => Ok(SubscriptionFlags {
            has_active_subscription: row.try_get("has_active_subscription")?,
            subscription_expires_at: row.try_get("subscription_expires_at")?,
            subscription_days: count(&row, "subscription_days")?,
        }),
        None => Ok(SubscriptionFlags::default()),
    }
}

pub async fn upsert_flags(
    tx: &mut Tx,
    owner_id: Uuid,
    flags: &SubscriptionFlags,
) -> Result<(), MarketError> {
    sqlx::query(
        r#"
        INSERT INTO user_subscription_flags
            (owner_id, has_active_subscription, subscription_expires_at, subscription_days)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (owner_id) DO UPDATE
        SET has_active_subscription = EXCLUDED.has_active_subscription,
            subscription_expires_at = EXCLUDED.subscription_expires_at,
            subscription_days = EXCLUDED.subscription_days,
            updated_at = now()
        "#,
    )
    .bind(owner_id)
    .bind(flags.has_active_subscription)
    .bind(flags.subscription_expires_at)
    .bind(i32::try_from(flags.subscription_days).unwrap_or(i32::MAX))
    .execute(&mut **tx)
    .await?;
    Ok(())
}
