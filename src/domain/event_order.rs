use {
    super::{
        actor::Actor,
        catalog::ServicePackage,
        error::MarketError,
        lifecycle::{Lifecycle, StatusLog},
        money::MoneyAmount,
    },
    chrono::{DateTime, Duration, Utc},
    serde::{Deserialize, Serialize},
    std::fmt,
    uuid::Uuid,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventOrderStatus {
    Pending,
    Accepted,
    Declined,
    InProgress,
    DeliveryRequest,
    DeliveryRequestDeclined,
    Delivered,
    CancelRequest,
    CancelRequestDeclined,
    Cancelled,
}

impl Lifecycle for EventOrderStatus {
    const FAMILY: &'static str = "event order";

    fn successors(self) -> &'static [Self] {
        use EventOrderStatus::*;
        match self {
            Pending => &[Accepted, Declined, CancelRequest],
            Accepted => &[InProgress, CancelRequest],
            InProgress => &[DeliveryRequest, CancelRequest],
            DeliveryRequest => &[Delivered, DeliveryRequestDeclined, CancelRequest],
            // Statuses are never re-entered, so a declined delivery is closed
            // by the requester confirming it or by cancellation.
            DeliveryRequestDeclined => &[Delivered, CancelRequest],
            CancelRequest => &[Cancelled, CancelRequestDeclined],
            // Resumes the flow that was interrupted; narrowed further by
            // `Cancellation::resume_from`.
            CancelRequestDeclined => &[
                Accepted,
                Declined,
                InProgress,
                DeliveryRequest,
                DeliveryRequestDeclined,
                Delivered,
            ],
            Delivered | Declined | Cancelled => &[],
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
            Self::InProgress => "inProgress",
            Self::DeliveryRequest => "deliveryRequest",
            Self::DeliveryRequestDeclined => "deliveryRequestDeclined",
            Self::Delivered => "delivered",
            Self::CancelRequest => "cancelRequest",
            Self::CancelRequestDeclined => "cancelRequestDeclined",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for EventOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for EventOrderStatus {
    type Error = MarketError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        use EventOrderStatus::*;
        [
            Pending,
            Accepted,
            Declined,
            InProgress,
            DeliveryRequest,
            DeliveryRequestDeclined,
            Delivered,
            CancelRequest,
            CancelRequestDeclined,
            Cancelled,
        ]
        .into_iter()
        .find(|s2| s2.as_str() == s)
        .ok_or_else(|| MarketError::Validation(format!("unknown event order status: {s}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderKind {
    /// Booked from a provider's package at a fixed price.
    Direct,
    /// Requested by a client; the provider prices it on acceptance.
    Custom,
}

impl OrderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Custom => "custom",
        }
    }
}

impl TryFrom<&str> for OrderKind {
    type Error = MarketError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "direct" => Ok(Self::Direct),
            "custom" => Ok(Self::Custom),
            other => Err(MarketError::Validation(format!("unknown order kind: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPricing {
    pub price: MoneyAmount,
    pub vat_amount: MoneyAmount,
    pub price_with_service_fee: MoneyAmount,
    pub total_price: MoneyAmount,
}

/// Fields a provider must supply when accepting a custom order.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomAcceptance {
    pub price: Option<MoneyAmount>,
    pub vat_amount: Option<MoneyAmount>,
    pub price_with_service_fee: Option<MoneyAmount>,
    pub total_price: Option<MoneyAmount>,
    pub delivery_date: Option<DateTime<Utc>>,
}

impl CustomAcceptance {
    fn resolve(&self, at: DateTime<Utc>) -> Result<(OrderPricing, DateTime<Utc>), MarketError> {
        let missing: Vec<&str> = [
            ("price", self.price.is_none()),
            ("vatAmount", self.vat_amount.is_none()),
            ("priceWithServiceFee", self.price_with_service_fee.is_none()),
            ("totalPrice", self.total_price.is_none()),
            ("deliveryDate", self.delivery_date.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, absent)| absent.then_some(name))
        .collect();

        let (
            Some(price),
            Some(vat_amount),
            Some(price_with_service_fee),
            Some(total_price),
            Some(delivery_date),
        ) = (
            self.price,
            self.vat_amount,
            self.price_with_service_fee,
            self.total_price,
            self.delivery_date,
        )
        else {
            return Err(MarketError::Validation(format!(
                "custom order acceptance requires: {}",
                missing.join(", ")
            )));
        };

        if price.is_zero() {
            return Err(MarketError::Validation("price must be positive".into()));
        }
        if delivery_date <= at {
            return Err(MarketError::Validation(
                "deliveryDate must be in the future".into(),
            ));
        }

        Ok((
            OrderPricing {
                price,
                vat_amount,
                price_with_service_fee,
                total_price,
            },
            delivery_date,
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtensionStatus {
    Pending,
    Accepted,
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionRequest {
    pub id: Uuid,
    pub requested_by: Uuid,
    pub new_delivery_date: DateTime<Utc>,
    pub reason: String,
    pub status: ExtensionStatus,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cancellation {
    pub requested_by: Uuid,
    pub reason: Option<String>,
    pub requested_at: DateTime<Utc>,
    /// Status the order was in when cancellation was requested.
    pub resume_from: EventOrderStatus,
    pub resolved_by: Option<Uuid>,
}

/// Optional data carried by a status change request.
#[derive(Debug, Clone, Default)]
pub struct StatusChange {
    pub reason: Option<String>,
    pub acceptance: Option<CustomAcceptance>,
}

impl StatusChange {
    pub fn reason(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            acceptance: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventOrder {
    pub id: Uuid,
    pub kind: OrderKind,
    pub requester_id: Uuid,
    pub provider_id: Uuid,
    pub package_id: Option<Uuid>,
    pub description: Option<String>,
    pub pricing: Option<OrderPricing>,
    pub delivery_date: Option<DateTime<Utc>>,
    pub extension_requests: Vec<ExtensionRequest>,
    pub cancellation: Option<Cancellation>,
    pub payment_id: Option<Uuid>,
    pub is_deleted: bool,
    pub log: StatusLog<EventOrderStatus>,
    pub created_at: DateTime<Utc>,
}

impl EventOrder {
    pub fn direct(
        requester_id: Uuid,
        package: &ServicePackage,
        at: DateTime<Utc>,
    ) -> Result<Self, MarketError> {
        if package.provider_id == requester_id {
            return Err(MarketError::Validation(
                "providers cannot book their own package".into(),
            ));
        }
        Ok(Self {
            id: Uuid::now_v7(),
            kind: OrderKind::Direct,
            requester_id,
            provider_id: package.provider_id,
            package_id: Some(package.id),
            description: None,
            pricing: Some(package.pricing),
            delivery_date: Some(at + Duration::days(i64::from(package.delivery_days))),
            extension_requests: Vec::new(),
            cancellation: None,
            payment_id: None,
            is_deleted: false,
            log: StatusLog::start(EventOrderStatus::Pending, None, at),
            created_at: at,
        })
    }

    pub fn custom(
        requester_id: Uuid,
        provider_id: Uuid,
        description: String,
        at: DateTime<Utc>,
    ) -> Result<Self, MarketError> {
        if provider_id == requester_id {
            return Err(MarketError::Validation(
                "a custom order must be addressed to another user".into(),
            ));
        }
        if description.trim().is_empty() {
            return Err(MarketError::Validation("description is required".into()));
        }
        Ok(Self {
            id: Uuid::now_v7(),
            kind: OrderKind::Custom,
            requester_id,
            provider_id,
            package_id: None,
            description: Some(description),
            pricing: None,
            delivery_date: None,
            extension_requests: Vec::new(),
            cancellation: None,
            payment_id: None,
            is_deleted: false,
            log: StatusLog::start(EventOrderStatus::Pending, None, at),
            created_at: at,
        })
    }

    pub fn status(&self) -> EventOrderStatus {
        self.log.status()
    }

    pub fn is_party(&self, actor: &Actor) -> bool {
        actor.is(self.requester_id) || actor.is(self.provider_id)
    }

    /// Unpaid and waiting for checkout: accepted, or back on the accepted
    /// flow after a cancellation request was declined.
    pub fn awaits_payment(&self) -> bool {
        if self.payment_id.is_some() {
            return false;
        }
        match self.status() {
            EventOrderStatus::Accepted => true,
            EventOrderStatus::CancelRequestDeclined => self
                .cancellation
                .as_ref()
                .is_some_and(|c| c.resume_from == EventOrderStatus::Accepted),
            _ => false,
        }
    }

    pub fn pending_extension(&self) -> Option<&ExtensionRequest> {
        self.extension_requests
            .iter()
            .find(|e| e.status == ExtensionStatus::Pending)
    }

    /// Applies a status change after running the status, actor and payload
    /// guards in that order. Nothing is modified when a guard fails.
    pub fn transition(
        &mut self,
        actor: &Actor,
        target: EventOrderStatus,
        change: StatusChange,
        at: DateTime<Utc>,
    ) -> Result<(), MarketError> {
        use EventOrderStatus::*;

        self.log.check(target)?;
        if self.status() == CancelRequestDeclined {
            self.check_resume(target)?;
        }
        self.authorize(actor, target)?;

        let accepted = match (target, self.kind) {
            (Accepted, OrderKind::Custom) => {
                let acceptance = change.acceptance.unwrap_or_default();
                Some(acceptance.resolve(at)?)
            }
            _ => None,
        };

        let previous = self.status();
        self.log.advance(target, change.reason.clone(), at)?;

        if let Some((pricing, delivery_date)) = accepted {
            self.pricing = Some(pricing);
            self.delivery_date = Some(delivery_date);
        }
        match target {
            CancelRequest => {
                self.cancellation = Some(Cancellation {
                    requested_by: actor.user_id,
                    reason: change.reason,
                    requested_at: at,
                    resume_from: previous,
                    resolved_by: None,
                });
            }
            Cancelled | CancelRequestDeclined => {
                if let Some(c) = self.cancellation.as_mut() {
                    c.resolved_by = Some(actor.user_id);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn check_resume(&self, target: EventOrderStatus) -> Result<(), MarketError> {
        let resume_from = self
            .cancellation
            .as_ref()
            .map(|c| c.resume_from)
            .unwrap_or(EventOrderStatus::Pending);
        if resume_from.can_transition_to(target) {
            Ok(())
        } else {
            Err(MarketError::InvalidTransition(format!(
                "event order: cannot resume to {target}, order was {resume_from} before cancellation was requested"
            )))
        }
    }

    fn authorize(&self, actor: &Actor, target: EventOrderStatus) -> Result<(), MarketError> {
        use EventOrderStatus::*;

        // Only settlement moves an order into progress; admins included.
        if target == InProgress {
            return if actor.is_system() {
                Ok(())
            } else {
                Err(MarketError::Forbidden(
                    "inProgress is entered only through payment".into(),
                ))
            };
        }
        if actor.is_admin() || actor.is_system() {
            return Ok(());
        }

        let allowed = match target {
            Accepted | Declined | DeliveryRequest => actor.is(self.provider_id),
            Delivered | DeliveryRequestDeclined => actor.is(self.requester_id),
            CancelRequest => self.is_party(actor),
            Cancelled | CancelRequestDeclined => match &self.cancellation {
                Some(c) => self.is_party(actor) && !actor.is(c.requested_by),
                None => false,
            },
            Pending | InProgress => false,
        };

        if allowed {
            Ok(())
        } else {
            Err(MarketError::Forbidden(format!(
                "{actor} may not move order {} to {target}",
                self.id
            )))
        }
    }

    pub fn request_extension(
        &mut self,
        actor: &Actor,
        new_delivery_date: DateTime<Utc>,
        reason: String,
        at: DateTime<Utc>,
    ) -> Result<Uuid, MarketError> {
        if self.status().is_terminal() {
            return Err(MarketError::InvalidTransition(format!(
                "order {} is {}",
                self.id,
                self.status()
            )));
        }
        if !(actor.is_admin() || actor.is(self.provider_id)) {
            return Err(MarketError::Forbidden(
                "only the provider may request an extension".into(),
            ));
        }
        if self.pending_extension().is_some() {
            return Err(MarketError::Conflict(format!(
                "order {} already has a pending extension request",
                self.id
            )));
        }
        if new_delivery_date <= at {
            return Err(MarketError::Validation(
                "new delivery date must be in the future".into(),
            ));
        }
        if reason.trim().is_empty() {
            return Err(MarketError::Validation("reason is required".into()));
        }

        let id = Uuid::now_v7();
        self.extension_requests.push(ExtensionRequest {
            id,
            requested_by: actor.user_id,
            new_delivery_date,
            reason,
            status: ExtensionStatus::Pending,
            created_at: at,
            decided_at: None,
        });
        Ok(id)
    }

    pub fn respond_extension(
        &mut self,
        actor: &Actor,
        extension_id: Uuid,
        accept: bool,
        at: DateTime<Utc>,
    ) -> Result<(), MarketError> {
        if !(actor.is_admin() || actor.is(self.requester_id)) {
            return Err(MarketError::Forbidden(
                "only the requester may answer an extension request".into(),
            ));
        }
        let request = self
            .extension_requests
            .iter_mut()
            .find(|e| e.id == extension_id)
            .ok_or_else(|| MarketError::not_found("extension request", extension_id))?;

        if request.status != ExtensionStatus::Pending {
            return Err(MarketError::InvalidTransition(format!(
                "extension request {extension_id} is no longer pending"
            )));
        }

        request.decided_at = Some(at);
        if accept {
            request.status = ExtensionStatus::Accepted;
            self.delivery_date = Some(request.new_delivery_date);
        } else {
            request.status = ExtensionStatus::Reject;
        }
        Ok(())
    }

    /// Soft delete. Allowed before acceptance or after the order ended.
    pub fn soft_delete(&mut self, actor: &Actor) -> Result<(), MarketError> {
        if !(actor.is_admin() || actor.is(self.requester_id)) {
            return Err(MarketError::Forbidden(
                "only the requester may delete an order".into(),
            ));
        }
        let status = self.status();
        if !(status == EventOrderStatus::Pending || status.is_terminal()) {
            return Err(MarketError::InvalidTransition(format!(
                "order {} cannot be deleted while {status}",
                self.id
            )));
        }
        self.is_deleted = true;
        Ok(())
    }
}
