use {
    super::{
        error::MarketError,
        id::SessionId,
        money::{Currency, MoneyAmount},
        pricing::{ProviderShare, Quote},
    },
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    std::fmt,
    uuid::Uuid,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// `Failed → Pending` is the operator reset; completed payments are final.
    pub fn can_transition_to(&self, next: &PaymentStatus) -> bool {
        matches!(
            (self, next),
            (PaymentStatus::Pending, PaymentStatus::Completed)
                | (PaymentStatus::Pending, PaymentStatus::Failed)
                | (PaymentStatus::Failed, PaymentStatus::Pending)
        )
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for PaymentStatus {
    type Error = MarketError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(MarketError::Validation(format!(
                "unknown payment status: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    Event,
    Gear,
    Workshop,
    Subscription,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Event => "event",
            Self::Gear => "gear",
            Self::Workshop => "workshop",
            Self::Subscription => "subscription",
        }
    }
}

impl fmt::Display for PaymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for PaymentType {
    type Error = MarketError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "event" => Ok(Self::Event),
            "gear" => Ok(Self::Gear),
            "workshop" => Ok(Self::Workshop),
            "subscription" => Ok(Self::Subscription),
            other => Err(MarketError::Validation(format!(
                "unknown payment type: {other}"
            ))),
        }
    }
}

/// What a payment settles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum PaymentRefs {
    Event { order_id: Uuid },
    Gear { order_ids: Vec<Uuid>, listing_ids: Vec<Uuid> },
    Workshop { workshop_id: Uuid },
    Subscription { days: u32 },
}

impl PaymentRefs {
    pub fn payment_type(&self) -> PaymentType {
        match self {
            Self::Event { .. } => PaymentType::Event,
            Self::Gear { .. } => PaymentType::Gear,
            Self::Workshop { .. } => PaymentType::Workshop,
            Self::Subscription { .. } => PaymentType::Subscription,
        }
    }
}

/// Full payment record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub session_id: SessionId,
    pub payer_id: Uuid,
    pub payment_type: PaymentType,
    pub status: PaymentStatus,
    pub currency: Currency,
    pub gross: MoneyAmount,
    pub commission: MoneyAmount,
    pub net: MoneyAmount,
    pub discount: MoneyAmount,
    pub coupon_id: Option<Uuid>,
    pub shares: Vec<ProviderShare>,
    pub refs: PaymentRefs,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

pub struct NewPaymentParams {
    pub id: Uuid,
    pub session_id: SessionId,
    pub payer_id: Uuid,
    pub currency: Currency,
    pub quote: Quote,
    pub refs: PaymentRefs,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn pending(p: NewPaymentParams) -> Self {
        Self {
            id: p.id,
            session_id: p.session_id,
            payer_id: p.payer_id,
            payment_type: p.refs.payment_type(),
            status: PaymentStatus::Pending,
            currency: p.currency,
            gross: p.quote.gross,
            commission: p.quote.commission,
            net: p.quote.net,
            discount: p.quote.discount,
            coupon_id: p.quote.coupon_id,
            shares: p.quote.shares,
            refs: p.refs,
            failure_reason: None,
            created_at: p.created_at,
            settled_at: None,
        }
    }

    pub fn transition_status(
        &mut self,
        new: PaymentStatus,
        at: DateTime<Utc>,
    ) -> Result<(), MarketError> {
        if !self.status.can_transition_to(&new) {
            return Err(MarketError::InvalidTransition(format!(
                "payment {}: {} → {}",
                self.session_id, self.status, new
            )));
        }
        self.status = new;
        self.settled_at = new.is_terminal().then_some(at);
        if new != PaymentStatus::Failed {
            self.failure_reason = None;
        }
        Ok(())
    }
}

/// Authoritative payment state reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayStatus {
    Succeeded,
    Failed,
    Pending,
}

#[derive(Debug)]
pub enum SettlementResult {
    /// Payment completed and order side effects applied.
    Settled(Payment),
    /// Gateway reported failure; payment marked failed.
    Failed(Payment),
    /// Payment had already reached a terminal state. Nothing changed.
    AlreadySettled(Payment),
    /// Gateway has not decided yet. Nothing changed.
    AwaitingPayment(Payment),
}

impl SettlementResult {
    pub fn payment(&self) -> &Payment {
        match self {
            Self::Settled(p) | Self::Failed(p) | Self::AlreadySettled(p) | Self::AwaitingPayment(p) => p,
        }
    }

    pub fn is_success(&self) -> bool {
        self.payment().status == PaymentStatus::Completed
    }
}
