use crate::errors::AppError;
use crate::models::OwnerId;
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};

pub const OWNER_HEADER: &str = "x-user-id";

/// The calling user, taken from the `x-user-id` header.
pub struct Owner(pub OwnerId);

#[async_trait]
impl<S> FromRequestParts<S> for Owner
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(OWNER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| Owner(OwnerId::new(value)))
            .ok_or_else(|| AppError::unauthorized(format!("missing {OWNER_HEADER} header")))
    }
}
