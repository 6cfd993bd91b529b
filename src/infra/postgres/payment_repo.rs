use {
    super::{Tx, amount, count},
    crate::domain::{
        error::MarketError,
        id::SessionId,
        money::Currency,
        payment::{Payment, PaymentRefs, PaymentStatus, PaymentType},
        pricing::ProviderShare,
        store::StaleSession,
    },
    chrono::{DateTime, Utc},
    sqlx::{Row, postgres::PgRow, types::Json},
};

const PAYMENT_COLUMNS: &str = "id, session_id, payer_id, payment_type, status, currency, \
     gross, commission, net, discount, coupon_id, shares, refs, failure_reason, \
     created_at, settled_at";

fn payment_from_row(row: &PgRow) -> Result<Payment, MarketError> {
    Ok(Payment {
        id: row.try_get("id")?,
        session_id: SessionId::new(row.try_get::<String, _>("session_id")?)?,
        payer_id: row.try_get("payer_id")?,
        payment_type: PaymentType::try_from(row.try_get::<&str, _>("payment_type")?)?,
        status: PaymentStatus::try_from(row.try_get::<&str, _>("status")?)?,
        currency: Currency::try_from(row.try_get::<&str, _>("currency")?)?,
        gross: amount(row, "gross")?,
        commission: amount(row, "commission")?,
        net: amount(row, "net")?,
        discount: amount(row, "discount")?,
        coupon_id: row.try_get("coupon_id")?,
        shares: row.try_get::<Json<Vec<ProviderShare>>, _>("shares")?.0,
        refs: row.try_get::<Json<PaymentRefs>, _>("refs")?.0,
        failure_reason: row.try_get("failure_reason")?,
        created_at: row.try_get("created_at")?,
        settled_at: row.try_get("settled_at")?,
    })
}

/// Transaction-scoped advisory lock keyed by the session id.
pub async fn lock_session(tx: &mut Tx, session_id: &SessionId) -> Result<(), MarketError> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(session_id.as_str())
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn find_by_session(
    tx: &mut Tx,
    session_id: &SessionId,
) -> Result<Option<Payment>, MarketError> {
    let row = sqlx::query(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE session_id = $1"
    ))
    .bind(session_id.as_str())
    .fetch_optional(&mut **tx)
    .await?;

    row.as_ref().map(payment_from_row).transpose()
}

pub async fn insert_payment(tx: &mut Tx, payment: &Payment) -> Result<(), MarketError> {
    sqlx::query(
        r#"
        INSERT INTO payments
            (id, session_id, payer_id, payment_type, status, currency,
             gross, commission, net, discount, coupon_id, shares, refs,
             failure_reason, created_at, settled_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        "#,
    )
    .bind(payment.id)
    .bind(payment.session_id.as_str())
    .bind(payment.payer_id)
    .bind(payment.payment_type.as_str())
    .bind(payment.status.as_str())
    .bind(payment.currency.as_str())
    .bind(payment.gross.cents())
    .bind(payment.commission.cents())
    .bind(payment.net.cents())
    .bind(payment.discount.cents())
    .bind(payment.coupon_id)
    .bind(Json(&payment.shares))
    .bind(Json(&payment.refs))
    .bind(payment.failure_reason.as_deref())
    .bind(payment.created_at)
    .bind(payment.settled_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Single-statement compare-and-set on the status column.
pub async fn update_status_if(
    tx: &mut Tx,
    payment: &Payment,
    expected: PaymentStatus,
) -> Result<bool, MarketError> {
    let result = sqlx::query(
        r#"
        UPDATE payments
        SET status = $1, failure_reason = $2, settled_at = $3, updated_at = now()
        WHERE id = $4 AND status = $5
        "#,
    )
    .bind(payment.status.as_str())
    .bind(payment.failure_reason.as_deref())
    .bind(payment.settled_at)
    .bind(payment.id)
    .bind(expected.as_str())
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn stale_pending(
    tx: &mut Tx,
    created_before: DateTime<Utc>,
    now: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<StaleSession>, MarketError> {
    let rows = sqlx::query(
        r#"
        SELECT session_id, sweep_attempts FROM payments
        WHERE status = 'pending'
          AND created_at < $1
          AND (sweep_after IS NULL OR sweep_after <= $2)
        ORDER BY sweep_attempts, created_at
        LIMIT $3
        "#,
    )
    .bind(created_before)
    .bind(now)
    .bind(limit)
    .fetch_all(&mut **tx)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(StaleSession {
                session_id: SessionId::new(row.try_get::<String, _>("session_id")?)?,
                sweep_attempts: count(row, "sweep_attempts")?,
            })
        })
        .collect()
}

pub async fn defer_sweep(
    tx: &mut Tx,
    session_id: &SessionId,
    until: DateTime<Utc>,
) -> Result<(), MarketError> {
    sqlx::query(
        r#"
        UPDATE payments
        SET sweep_attempts = sweep_attempts + 1, sweep_after = $1, updated_at = now()
        WHERE session_id = $2 AND status = 'pending'
        "#,
    )
    .bind(until)
    .bind(session_id.as_str())
    .execute(&mut **tx)
    .await?;
    Ok(())
}
