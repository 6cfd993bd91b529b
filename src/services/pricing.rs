use {
    super::coupons,
    crate::domain::{
        catalog::{GearListing, Workshop},
        error::MarketError,
        event_order::EventOrder,
        money::MoneyAmount,
        pricing::{self, Quote},
        store::UnitOfWork,
    },
    chrono::{DateTime, Utc},
};

/// What is being paid for.
#[derive(Debug, Clone, Copy)]
pub enum Priceable<'a> {
    Event(&'a EventOrder),
    Gear(&'a [GearListing]),
    Workshop(&'a Workshop),
    Subscription { amount: MoneyAmount },
}

pub fn base_quote(item: Priceable<'_>) -> Result<Quote, MarketError> {
    match item {
        Priceable::Event(order) => pricing::event_quote(order),
        Priceable::Gear(listings) => pricing::gear_quote(listings),
        Priceable::Workshop(workshop) => Ok(pricing::workshop_quote(workshop)),
        Priceable::Subscription { amount } => pricing::subscription_quote(amount),
    }
}

/// Base quote plus the optional coupon overlay. A code is ignored when there
/// is no commission to discount.
pub async fn calculate(
    uow: &mut dyn UnitOfWork,
    item: Priceable<'_>,
    coupon_code: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Quote, MarketError> {
    let mut quote = base_quote(item)?;

    let Some(code) = coupon_code.map(str::trim).filter(|c| !c.is_empty()) else {
        return Ok(quote);
    };
    if quote.commission.is_zero() {
        tracing::debug!(coupon = code, "no commission to discount, coupon ignored");
        return Ok(quote);
    }

    let coupon = coupons::validate(uow, code, quote.gross, now).await?;
    let discount = quote.apply_coupon(&coupon);
    tracing::debug!(coupon = code, %discount, "coupon applied");
    Ok(quote)
}
