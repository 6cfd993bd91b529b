use {
    super::{
        catalog::{GearListing, ListingPrice, Workshop},
        coupon::Coupon,
        error::MarketError,
        event_order::EventOrder,
        money::MoneyAmount,
    },
    serde::{Deserialize, Serialize},
    uuid::Uuid,
};

/// One provider's part of a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderShare {
    pub provider_id: Uuid,
    /// Listing or order the share was priced from.
    pub ref_id: Uuid,
    pub amount: MoneyAmount,
    pub commission: MoneyAmount,
    pub net: MoneyAmount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub gross: MoneyAmount,
    pub commission: MoneyAmount,
    pub net: MoneyAmount,
    pub discount: MoneyAmount,
    pub coupon_id: Option<Uuid>,
    pub shares: Vec<ProviderShare>,
}

impl Quote {
    fn from_shares(shares: Vec<ProviderShare>) -> Self {
        Self {
            gross: shares.iter().map(|s| s.amount).sum(),
            commission: shares.iter().map(|s| s.commission).sum(),
            net: shares.iter().map(|s| s.net).sum(),
            discount: MoneyAmount::ZERO,
            coupon_id: None,
            shares,
        }
    }

    /// Takes the coupon out of the platform's commission. The provider's net
    /// is untouched and neither commission nor gross goes below zero.
    pub fn apply_coupon(&mut self, coupon: &Coupon) -> MoneyAmount {
        let discount = coupon.discount_for(self.commission);
        let mut remaining = discount;
        for share in &mut self.shares {
            if remaining.is_zero() {
                break;
            }
            let taken = remaining.min(share.commission);
            share.commission = share.commission - taken;
            share.amount = share.amount.saturating_sub(taken);
            remaining = remaining - taken;
        }

        self.commission = self.commission - discount;
        self.gross = self.gross.saturating_sub(discount);
        self.discount = discount;
        self.coupon_id = Some(coupon.id);
        discount
    }
}

/// commission = max(priceWithServiceFee − price, 0); net = max(total −
/// commission, 0); gross = total.
pub fn event_quote(order: &EventOrder) -> Result<Quote, MarketError> {
    let pricing = order.pricing.ok_or_else(|| {
        MarketError::Validation(format!("order {} has not been priced yet", order.id))
    })?;
    let commission = pricing
        .price_with_service_fee
        .saturating_sub(pricing.price);
    let net = pricing.total_price.saturating_sub(commission);

    Ok(Quote::from_shares(vec![ProviderShare {
        provider_id: order.provider_id,
        ref_id: order.id,
        amount: pricing.total_price,
        commission,
        net,
    }]))
}

/// commission = mainPrice − (price + VAT), clamped at zero; net = mainPrice −
/// commission; gross = mainPrice.
fn listing_share(provider_id: Uuid, ref_id: Uuid, price: &ListingPrice) -> ProviderShare {
    let base = price.price + price.vat();
    let commission = price.main_price.saturating_sub(base);
    ProviderShare {
        provider_id,
        ref_id,
        amount: price.main_price,
        commission,
        net: price.main_price - commission,
    }
}

pub fn workshop_quote(workshop: &Workshop) -> Quote {
    Quote::from_shares(vec![listing_share(
        workshop.author_id,
        workshop.id,
        &workshop.price,
    )])
}

/// Multi-seller checkout; one share per listing.
pub fn gear_quote(listings: &[GearListing]) -> Result<Quote, MarketError> {
    if listings.is_empty() {
        return Err(MarketError::Validation(
            "gear checkout needs at least one listing".into(),
        ));
    }
    Ok(Quote::from_shares(
        listings
            .iter()
            .map(|l| listing_share(l.seller_id, l.id, &l.price))
            .collect(),
    ))
}

/// Subscriptions carry no commission and no provider breakdown.
pub fn subscription_quote(amount: MoneyAmount) -> Result<Quote, MarketError> {
    if amount.is_zero() {
        return Err(MarketError::Validation(
            "subscription amount must be positive".into(),
        ));
    }
    Ok(Quote {
        gross: amount,
        commission: MoneyAmount::ZERO,
        net: amount,
        discount: MoneyAmount::ZERO,
        coupon_id: None,
        shares: Vec::new(),
    })
}
