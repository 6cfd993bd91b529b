use {
    super::{
        actor::Actor,
        error::MarketError,
        lifecycle::{Lifecycle, StatusLog},
        money::MoneyAmount,
    },
    chrono::{DateTime, NaiveDate, Utc},
    serde::{Deserialize, Serialize},
    std::fmt,
    uuid::Uuid,
};

/// Scope key for the per-day participant order sequence.
pub const WORKSHOP_SEQUENCE: &str = "workshop";

/// `WORKSHOP-YYYYMMDD-NNNN`, numbered from 1 within each calendar day (UTC).
pub fn workshop_order_code(day: NaiveDate, seq: u32) -> String {
    format!("WORKSHOP-{}-{seq:04}", day.format("%Y%m%d"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParticipantStatus {
    InProgress,
    DeliveryRequest,
    Delivered,
    Cancelled,
}

impl Lifecycle for ParticipantStatus {
    const FAMILY: &'static str = "workshop participant";

    fn successors(self) -> &'static [Self] {
        use ParticipantStatus::*;
        match self {
            InProgress => &[DeliveryRequest, Cancelled],
            DeliveryRequest => &[Delivered, Cancelled],
            Delivered | Cancelled => &[],
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "inProgress",
            Self::DeliveryRequest => "deliveryRequest",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ParticipantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for ParticipantStatus {
    type Error = MarketError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "inProgress" => Ok(Self::InProgress),
            "deliveryRequest" => Ok(Self::DeliveryRequest),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(MarketError::Validation(format!(
                "unknown participant status: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayoutStatus {
    Pending,
    Paid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payout {
    pub provider_id: Uuid,
    pub amount: MoneyAmount,
    pub status: PayoutStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkshopParticipant {
    pub id: Uuid,
    /// Human-readable order id, see [`workshop_order_code`].
    pub order_code: String,
    pub workshop_id: Uuid,
    pub client_id: Uuid,
    pub author_id: Uuid,
    pub payment_id: Uuid,
    pub total_price: MoneyAmount,
    pub payout: Payout,
    pub is_deleted: bool,
    pub log: StatusLog<ParticipantStatus>,
    pub created_at: DateTime<Utc>,
}

impl WorkshopParticipant {
    pub fn status(&self) -> ParticipantStatus {
        self.log.status()
    }

    pub fn transition(
        &mut self,
        actor: &Actor,
        target: ParticipantStatus,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<(), MarketError> {
        use ParticipantStatus::*;

        self.log.check(target)?;
        let allowed = actor.is_admin()
            || actor.is_system()
            || match target {
                DeliveryRequest => actor.is(self.author_id),
                Delivered => actor.is(self.client_id),
                Cancelled => actor.is(self.client_id) || actor.is(self.author_id),
                InProgress => false,
            };
        if !allowed {
            return Err(MarketError::Forbidden(format!(
                "{actor} may not move participant {} to {target}",
                self.order_code
            )));
        }
        self.log.advance(target, reason, at)
    }
}
