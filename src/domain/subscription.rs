use {
    super::{
        error::MarketError,
        lifecycle::{Lifecycle, StatusLog},
    },
    chrono::{DateTime, Duration, Utc},
    serde::{Deserialize, Serialize},
    std::fmt,
    uuid::Uuid,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SubscriptionStatus {
    Active,
    /// Replaced by a renewal; rows are never deleted.
    Superseded,
    Expired,
}

impl Lifecycle for SubscriptionStatus {
    const FAMILY: &'static str = "subscription";

    fn successors(self) -> &'static [Self] {
        use SubscriptionStatus::*;
        match self {
            Active => &[Superseded, Expired],
            Superseded | Expired => &[],
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Superseded => "superseded",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Longest window a single purchase may buy.
pub const MAX_SUBSCRIPTION_DAYS: u32 = 3_650;

/// Rejects day counts outside `1..=MAX_SUBSCRIPTION_DAYS`.
pub fn validate_days(days: u32) -> Result<u32, MarketError> {
    if days == 0 || days > MAX_SUBSCRIPTION_DAYS {
        return Err(MarketError::Validation(format!(
            "days must be between 1 and {MAX_SUBSCRIPTION_DAYS}, got {days}"
        )));
    }
    Ok(days)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub payment_id: Uuid,
    pub days: u32,
    pub starts_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub log: StatusLog<SubscriptionStatus>,
}

impl Subscription {
    pub fn is_active(&self) -> bool {
        self.log.status() == SubscriptionStatus::Active
    }

    /// Opens a window that either continues `current` from its expiry or
    /// starts at `now` when there is nothing to extend. A window that lapsed
    /// but was not swept yet is not extended into the past.
    pub fn renew(
        owner_id: Uuid,
        payment_id: Uuid,
        days: u32,
        current: Option<&Subscription>,
        now: DateTime<Utc>,
    ) -> Result<Self, MarketError> {
        let days = validate_days(days)?;
        let starts_at = match current {
            Some(existing) if existing.is_active() => existing.expires_at.max(now),
            _ => now,
        };
        let reason = current
            .filter(|s| s.is_active())
            .map(|s| format!("extends {}", s.id));
        let expires_at = starts_at
            .checked_add_signed(Duration::days(i64::from(days)))
            .ok_or_else(|| {
                MarketError::Validation(format!("a {days} day window from {starts_at} overflows"))
            })?;
        Ok(Self {
            id: Uuid::now_v7(),
            owner_id,
            payment_id,
            days,
            starts_at,
            expires_at,
            log: StatusLog::start(SubscriptionStatus::Active, reason, now),
        })
    }

    pub fn close(
        &mut self,
        status: SubscriptionStatus,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<(), MarketError> {
        self.log.advance(status, reason, at)
    }
}

/// Per-owner subscription fields cached on the user profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionFlags {
    pub has_active_subscription: bool,
    pub subscription_expires_at: Option<DateTime<Utc>>,
    pub subscription_days: u32,
}

impl SubscriptionFlags {
    pub fn from_active(sub: &Subscription) -> Self {
        Self {
            has_active_subscription: true,
            subscription_expires_at: Some(sub.expires_at),
            subscription_days: sub.days,
        }
    }
}
