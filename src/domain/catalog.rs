//! Read models for catalog content owned by other services. Only the gear
//! stock flag and the workshop participant count are written here.

use {
    super::{
        error::MarketError,
        event_order::OrderPricing,
        money::{MoneyAmount, Percent},
    },
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    uuid::Uuid,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePackage {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub title: String,
    pub pricing: OrderPricing,
    pub delivery_days: u32,
}

/// Listing price components shared by gear and workshops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingPrice {
    /// Provider's base price.
    pub price: MoneyAmount,
    pub vat_amount: Option<MoneyAmount>,
    pub vat_percent: Option<Percent>,
    /// What the buyer pays.
    pub main_price: MoneyAmount,
}

impl ListingPrice {
    /// Explicit VAT amount wins; otherwise derived from the percentage.
    pub fn vat(&self) -> MoneyAmount {
        match (self.vat_amount, self.vat_percent) {
            (Some(amount), _) => amount,
            (None, Some(percent)) => self.price.percent(percent),
            (None, None) => MoneyAmount::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GearStock {
    #[serde(rename = "Available")]
    Available,
    #[serde(rename = "Sold Out")]
    SoldOut,
}

impl GearStock {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "Available",
            Self::SoldOut => "Sold Out",
        }
    }
}

impl TryFrom<&str> for GearStock {
    type Error = MarketError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "Available" => Ok(Self::Available),
            "Sold Out" => Ok(Self::SoldOut),
            other => Err(MarketError::Validation(format!("unknown gear stock: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GearListing {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub title: String,
    pub price: ListingPrice,
    pub stock: GearStock,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workshop {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub price: ListingPrice,
    pub starts_at: DateTime<Utc>,
    pub capacity: u32,
    pub participant_count: u32,
}

impl Workshop {
    pub fn has_seat(&self) -> bool {
        self.participant_count < self.capacity
    }
}
