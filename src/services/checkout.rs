use {
    super::pricing::{self, Priceable},
    crate::domain::{
        actor::Actor,
        catalog::{GearListing, GearStock},
        error::MarketError,
        gear_order::GearOrder,
        id::SessionId,
        money::{Currency, MoneyAmount},
        payment::{NewPaymentParams, Payment, PaymentRefs, PaymentType},
        pricing::Quote,
        provider::{CheckoutRequest, PaymentProvider},
        store::{Store, UnitOfWork},
        subscription,
    },
    chrono::{DateTime, Duration, Utc},
    serde::{Deserialize, Serialize},
    std::collections::HashSet,
    uuid::Uuid,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutPayload {
    pub payment_type: PaymentType,
    /// Event order id or workshop id.
    pub ref_id: Option<Uuid>,
    #[serde(default)]
    pub listing_ids: Vec<Uuid>,
    pub days: Option<u32>,
    pub amount: Option<MoneyAmount>,
    pub coupon_code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    pub checkout_url: String,
    pub payment_id: Uuid,
    pub session_id: SessionId,
}

/// Gateway-facing settings for new sessions.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    pub currency: Currency,
    pub success_url: String,
    pub cancel_url: String,
    /// How long a hosted page stays payable.
    pub session_ttl: Duration,
}

struct Prepared {
    quote: Quote,
    refs: PaymentRefs,
    description: String,
    listings: Vec<GearListing>,
}

/// Prices the checkout, opens a hosted session and records the pending
/// payment. Nothing is persisted if any step fails.
#[tracing::instrument(skip_all, fields(payer = %payer, payment_type = %payload.payment_type))]
pub async fn create_session(
    store: &dyn Store,
    provider: &dyn PaymentProvider,
    config: &CheckoutConfig,
    payer: &Actor,
    payload: CheckoutPayload,
) -> Result<CheckoutSession, MarketError> {
    let now = Utc::now();

    // Read-only; released before the gateway call.
    let prepared = {
        let mut uow = store.begin().await?;
        prepare(&mut *uow, payer, &payload, now).await?
    };
    if prepared.quote.gross.is_zero() {
        return Err(MarketError::Validation("nothing to charge".into()));
    }

    let payment_id = Uuid::now_v7();
    let hosted = provider
        .create_checkout_session(CheckoutRequest {
            payment_id,
            payer_id: payer.user_id,
            description: prepared.description.clone(),
            amount: prepared.quote.gross,
            currency: config.currency,
            success_url: config.success_url.clone(),
            cancel_url: config.cancel_url.clone(),
            expires_at: now + config.session_ttl,
        })
        .await?;

    let mut refs = prepared.refs;
    let mut uow = store.begin().await?;
    if let PaymentRefs::Gear { order_ids, .. } = &mut refs {
        for listing in &prepared.listings {
            let order = GearOrder::for_listing(payer.user_id, listing, now);
            uow.insert_gear_order(&order).await?;
            order_ids.push(order.id);
        }
    }
    let payment = Payment::pending(NewPaymentParams {
        id: payment_id,
        session_id: hosted.id.clone(),
        payer_id: payer.user_id,
        currency: config.currency,
        quote: prepared.quote,
        refs,
        created_at: now,
    });
    uow.insert_payment(&payment).await?;
    uow.commit().await?;

    tracing::info!(
        %payment_id,
        session_id = %hosted.id,
        gross = %payment.gross,
        discount = %payment.discount,
        "checkout session created"
    );

    Ok(CheckoutSession {
        checkout_url: hosted.url,
        payment_id,
        session_id: hosted.id,
    })
}

fn required_ref(payload: &CheckoutPayload) -> Result<Uuid, MarketError> {
    payload.ref_id.ok_or_else(|| {
        MarketError::Validation(format!("refId is required for {} checkout", payload.payment_type))
    })
}

async fn prepare(
    uow: &mut dyn UnitOfWork,
    payer: &Actor,
    payload: &CheckoutPayload,
    now: DateTime<Utc>,
) -> Result<Prepared, MarketError> {
    let coupon = payload.coupon_code.as_deref();

    match payload.payment_type {
        PaymentType::Event => {
            let order_id = required_ref(payload)?;
            let order = uow
                .event_order(order_id)
                .await?
                .filter(|o| !o.is_deleted)
                .ok_or_else(|| MarketError::not_found("event order", order_id))?;
            if !payer.is(order.requester_id) {
                return Err(MarketError::Forbidden(
                    "only the requester may pay for an order".into(),
                ));
            }
            if !order.awaits_payment() {
                return Err(MarketError::InvalidTransition(format!(
                    "order {order_id} is {}, payment needs an accepted unpaid order",
                    order.status()
                )));
            }
            let quote = pricing::calculate(uow, Priceable::Event(&order), coupon, now).await?;
            Ok(Prepared {
                quote,
                refs: PaymentRefs::Event { order_id },
                description: format!("Event order {order_id}"),
                listings: Vec::new(),
            })
        }
        PaymentType::Gear => {
            if payload.listing_ids.is_empty() {
                return Err(MarketError::Validation("listingIds is required".into()));
            }
            let mut seen = HashSet::new();
            let mut listings = Vec::with_capacity(payload.listing_ids.len());
            for &listing_id in &payload.listing_ids {
                if !seen.insert(listing_id) {
                    return Err(MarketError::Validation(format!(
                        "listing {listing_id} appears more than once"
                    )));
                }
                let listing = uow
                    .gear_listing(listing_id)
                    .await?
                    .ok_or_else(|| MarketError::not_found("gear listing", listing_id))?;
                if listing.stock == GearStock::SoldOut {
                    return Err(MarketError::Conflict(format!(
                        "gear listing {listing_id} is sold out"
                    )));
                }
                if payer.is(listing.seller_id) {
                    return Err(MarketError::Validation(
                        "sellers cannot buy their own listing".into(),
                    ));
                }
                listings.push(listing);
            }
            let quote = pricing::calculate(uow, Priceable::Gear(&listings), coupon, now).await?;
            Ok(Prepared {
                quote,
                refs: PaymentRefs::Gear {
                    order_ids: Vec::new(),
                    listing_ids: payload.listing_ids.clone(),
                },
                description: format!("Gear purchase ({} items)", listings.len()),
                listings,
            })
        }
        PaymentType::Workshop => {
            let workshop_id = required_ref(payload)?;
            let workshop = uow
                .workshop(workshop_id)
                .await?
                .ok_or_else(|| MarketError::not_found("workshop", workshop_id))?;
            if payer.is(workshop.author_id) {
                return Err(MarketError::Validation(
                    "authors cannot register for their own workshop".into(),
                ));
            }
            if uow
                .participant_for(workshop_id, payer.user_id)
                .await?
                .is_some()
            {
                return Err(MarketError::Conflict(format!(
                    "already registered for workshop {workshop_id}"
                )));
            }
            if workshop.starts_at <= now {
                return Err(MarketError::Validation(format!(
                    "workshop {workshop_id} has already started"
                )));
            }
            if !workshop.has_seat() {
                return Err(MarketError::Conflict(format!(
                    "workshop {workshop_id} is full"
                )));
            }
            let quote =
                pricing::calculate(uow, Priceable::Workshop(&workshop), coupon, now).await?;
            Ok(Prepared {
                quote,
                refs: PaymentRefs::Workshop { workshop_id },
                description: workshop.title,
                listings: Vec::new(),
            })
        }
        PaymentType::Subscription => {
            let days = payload
                .days
                .ok_or_else(|| MarketError::Validation("days is required".into()))
                .and_then(subscription::validate_days)?;
            let amount = payload
                .amount
                .ok_or_else(|| MarketError::Validation("amount is required".into()))?;
            let quote =
                pricing::calculate(uow, Priceable::Subscription { amount }, coupon, now).await?;
            Ok(Prepared {
                quote,
                refs: PaymentRefs::Subscription { days },
                description: format!("Subscription ({days} days)"),
                listings: Vec::new(),
            })
        }
    }
}
