use {
    super::{
        actor::Actor,
        catalog::GearListing,
        error::MarketError,
        lifecycle::{Lifecycle, StatusLog},
        money::MoneyAmount,
    },
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    std::fmt,
    uuid::Uuid,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GearOrderStatus {
    Pending,
    InProgress,
    DeliveryRequest,
    Delivered,
    Cancelled,
}

impl Lifecycle for GearOrderStatus {
    const FAMILY: &'static str = "gear order";

    fn successors(self) -> &'static [Self] {
        use GearOrderStatus::*;
        match self {
            Pending => &[InProgress, Cancelled],
            InProgress => &[DeliveryRequest, Cancelled],
            DeliveryRequest => &[Delivered, Cancelled],
            Delivered | Cancelled => &[],
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "inProgress",
            Self::DeliveryRequest => "deliveryRequest",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for GearOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for GearOrderStatus {
    type Error = MarketError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "pending" => Ok(Self::Pending),
            "inProgress" => Ok(Self::InProgress),
            "deliveryRequest" => Ok(Self::DeliveryRequest),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(MarketError::Validation(format!(
                "unknown gear order status: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GearOrder {
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub listing_id: Uuid,
    pub price: MoneyAmount,
    pub vat_amount: MoneyAmount,
    pub total_price: MoneyAmount,
    pub payment_id: Option<Uuid>,
    pub is_deleted: bool,
    pub log: StatusLog<GearOrderStatus>,
    pub created_at: DateTime<Utc>,
}

impl GearOrder {
    pub fn for_listing(buyer_id: Uuid, listing: &GearListing, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            buyer_id,
            seller_id: listing.seller_id,
            listing_id: listing.id,
            price: listing.price.price,
            vat_amount: listing.price.vat(),
            total_price: listing.price.main_price,
            payment_id: None,
            is_deleted: false,
            log: StatusLog::start(GearOrderStatus::Pending, None, at),
            created_at: at,
        }
    }

    pub fn status(&self) -> GearOrderStatus {
        self.log.status()
    }

    pub fn transition(
        &mut self,
        actor: &Actor,
        target: GearOrderStatus,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<(), MarketError> {
        use GearOrderStatus::*;

        self.log.check(target)?;
        let allowed = match target {
            InProgress => actor.is_system(),
            _ if actor.is_admin() || actor.is_system() => true,
            DeliveryRequest => actor.is(self.seller_id),
            Delivered => actor.is(self.buyer_id),
            Cancelled => actor.is(self.buyer_id) || actor.is(self.seller_id),
            Pending => false,
        };
        if !allowed {
            return Err(MarketError::Forbidden(format!(
                "{actor} may not move gear order {} to {target}",
                self.id
            )));
        }
        self.log.advance(target, reason, at)
    }
}
