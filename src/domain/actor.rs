use {
    super::error::MarketError,
    serde::{Deserialize, Serialize},
    std::fmt,
    uuid::Uuid,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Client,
    Provider,
    Admin,
    /// Internal actor used by settlement. Never produced by the auth layer.
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Provider => "provider",
            Self::Admin => "admin",
            Self::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for Role {
    type Error = MarketError;

    /// Parses roles supplied by the auth collaborator. `system` is rejected.
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "client" | "user" => Ok(Self::Client),
            "provider" => Ok(Self::Provider),
            "admin" => Ok(Self::Admin),
            other => Err(MarketError::Validation(format!("unknown role: {other}"))),
        }
    }
}

/// The authenticated caller of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn system() -> Self {
        Self {
            user_id: Uuid::nil(),
            role: Role::System,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_system(&self) -> bool {
        self.role == Role::System
    }

    pub fn is(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.role, self.user_id)
    }
}
