use {
    super::{error::MarketError, money::MoneyAmount},
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    uuid::Uuid,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub id: Uuid,
    pub code: String,
    pub minimum_spend: MoneyAmount,
    pub amount: MoneyAmount,
    pub usage_limit: u32,
    pub used_count: u32,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
}

impl Coupon {
    /// Eligibility for a checkout whose pre-discount total is `gross`.
    pub fn check(&self, gross: MoneyAmount, now: DateTime<Utc>) -> Result<(), MarketError> {
        if !self.is_active {
            return Err(MarketError::InvalidCoupon(format!(
                "coupon {} is not active",
                self.code
            )));
        }
        if self.expires_at <= now {
            return Err(MarketError::InvalidCoupon(format!(
                "coupon {} expired at {}",
                self.code, self.expires_at
            )));
        }
        if self.used_count >= self.usage_limit {
            return Err(MarketError::LimitExceeded(format!(
                "coupon {} used {}/{} times",
                self.code, self.used_count, self.usage_limit
            )));
        }
        if gross < self.minimum_spend {
            return Err(MarketError::MinimumSpendNotMet(format!(
                "coupon {} requires a minimum spend of {}, got {}",
                self.code, self.minimum_spend, gross
            )));
        }
        Ok(())
    }

    /// Never more than the commission being discounted.
    pub fn discount_for(&self, commission: MoneyAmount) -> MoneyAmount {
        self.amount.min(commission)
    }
}

/// Normalizes user-entered codes before lookup.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}
