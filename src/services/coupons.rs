use {
    crate::domain::{
        coupon::Coupon, error::MarketError, money::MoneyAmount, store::UnitOfWork,
    },
    chrono::{DateTime, Utc},
    uuid::Uuid,
};

/// Looks the code up and checks it against the pre-discount `gross`.
pub async fn validate(
    uow: &mut dyn UnitOfWork,
    code: &str,
    gross: MoneyAmount,
    now: DateTime<Utc>,
) -> Result<Coupon, MarketError> {
    let coupon = uow
        .coupon_by_code(code)
        .await?
        .ok_or_else(|| MarketError::InvalidCoupon(format!("unknown coupon {code}")))?;
    coupon.check(gross, now)?;
    Ok(coupon)
}

/// Records one use. Runs inside the settlement unit of work; a coupon that
/// hit its limit after checkout still honors the discount already paid, and
/// `false` is returned so the overrun can be reported.
pub async fn consume(
    uow: &mut dyn UnitOfWork,
    coupon_id: Uuid,
    discount: MoneyAmount,
) -> Result<bool, MarketError> {
    let consumed = uow.consume_coupon(coupon_id).await?;
    if !consumed {
        tracing::error!(
            %coupon_id,
            %discount,
            "coupon reached its usage limit before settlement, discount honored without consumption"
        );
    }
    Ok(consumed)
}
