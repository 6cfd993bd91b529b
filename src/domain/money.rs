use {
    super::error::MarketError,
    serde::{Deserialize, Serialize},
    std::fmt,
    std::iter::Sum,
    std::ops::{Add, Sub},
};

/// Non-negative amount in minor units (cents).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct MoneyAmount(i64);

impl MoneyAmount {
    pub const ZERO: MoneyAmount = MoneyAmount(0);

    pub fn new(cents: i64) -> Result<Self, MarketError> {
        if cents < 0 {
            return Err(MarketError::Validation(format!(
                "MoneyAmount cannot be negative, got: {cents}"
            )));
        }
        Ok(Self(cents))
    }

    pub fn cents(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: MoneyAmount) -> Option<MoneyAmount> {
        self.0.checked_add(other.0).map(MoneyAmount)
    }

    pub fn checked_sub(self, other: MoneyAmount) -> Option<MoneyAmount> {
        self.0
            .checked_sub(other.0)
            .filter(|&v| v >= 0)
            .map(MoneyAmount)
    }

    /// Subtraction clamped at zero.
    pub fn saturating_sub(self, other: MoneyAmount) -> MoneyAmount {
        MoneyAmount((self.0 - other.0).max(0))
    }

    /// `self × percent / 100`, rounded half-up to the cent.
    pub fn percent(self, percent: Percent) -> MoneyAmount {
        let scaled = i128::from(self.0) * i128::from(percent.basis_points());
        let rounded = (scaled + 5_000) / 10_000;
        MoneyAmount(i64::try_from(rounded).unwrap_or(i64::MAX))
    }
}

impl<'de> Deserialize<'de> for MoneyAmount {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let cents = i64::deserialize(deserializer)?;
        MoneyAmount::new(cents).map_err(serde::de::Error::custom)
    }
}

impl TryFrom<i64> for MoneyAmount {
    type Error = MarketError;

    fn try_from(cents: i64) -> Result<Self, Self::Error> {
        MoneyAmount::new(cents)
    }
}

impl Add for MoneyAmount {
    type Output = MoneyAmount;

    fn add(self, rhs: MoneyAmount) -> MoneyAmount {
        self.checked_add(rhs).expect("MoneyAmount overflow")
    }
}

impl Sub for MoneyAmount {
    type Output = MoneyAmount;

    fn sub(self, rhs: MoneyAmount) -> MoneyAmount {
        self.checked_sub(rhs).expect("MoneyAmount underflow")
    }
}

impl Sum for MoneyAmount {
    fn sum<I: Iterator<Item = MoneyAmount>>(iter: I) -> MoneyAmount {
        iter.fold(MoneyAmount::ZERO, |acc, x| acc + x)
    }
}

impl fmt::Display for MoneyAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A percentage with two decimals of precision, stored in basis points
/// (`1250` is 12.50%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Percent(u32);

impl Percent {
    pub fn from_basis_points(bp: u32) -> Self {
        Self(bp)
    }

    pub fn whole(percent: u32) -> Self {
        Self(percent * 100)
    }

    pub fn basis_points(&self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    Usd,
    Eur,
    Gbp,
    Jpy,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Usd => "usd",
            Self::Eur => "eur",
            Self::Gbp => "gbp",
            Self::Jpy => "jpy",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for Currency {
    type Error = MarketError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "usd" => Ok(Self::Usd),
            "eur" => Ok(Self::Eur),
            "gbp" => Ok(Self::Gbp),
            "jpy" => Ok(Self::Jpy),
            other => Err(MarketError::Validation(format!(
                "unknown currency: {other}"
            ))),
        }
    }
}
