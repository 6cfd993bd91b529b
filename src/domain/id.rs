use derive_more::Display;
use serde::{Deserialize, Serialize};

use super::error::MarketError;

/// Hosted checkout session identifier (`cs_xxx`). Doubles as the payment's
/// transaction id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Result<Self, MarketError> {
        let id = id.into();
        if !id.starts_with("cs_") || id.len() <= 3 {
            return Err(MarketError::Validation(format!(
                "SessionId must start with cs_, got: {id}"
            )));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<String> for SessionId {
    type Error = MarketError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        SessionId::new(value)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

/// Stripe event identifier (`evt_xxx`).
#[derive(Debug, Clone, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    pub fn new(id: impl Into<String>) -> Result<Self, MarketError> {
        let id = id.into();
        if !id.starts_with("evt_") {
            return Err(MarketError::Validation(format!(
                "EventId must start with evt_, got: {id}"
            )));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
