use {
    crate::{
        adapters::api_errors::ApiError,
        domain::{
            actor::{Actor, Role},
            error::MarketError,
        },
    },
    axum::{extract::FromRequestParts, http::request::Parts},
    uuid::Uuid,
};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Caller identity as asserted by the upstream auth gateway.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub Actor);

fn header<'a>(parts: &'a Parts, name: &'static str) -> Result<&'a str, MarketError> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| MarketError::Forbidden(format!("missing {name} header")))
}

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header(parts, USER_ID_HEADER)?
            .parse::<Uuid>()
            .map_err(|e| MarketError::Forbidden(format!("invalid {USER_ID_HEADER}: {e}")))?;
        let role = Role::try_from(header(parts, USER_ROLE_HEADER)?)
            .map_err(|e| MarketError::Forbidden(e.to_string()))?;
        Ok(Caller(Actor::new(user_id, role)))
    }
}
