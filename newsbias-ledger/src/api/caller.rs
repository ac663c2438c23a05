//! Caller identity extractor
//!
//! The current caller is taken from the `X-Principal` header on every request.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::api::error::ApiError;
use crate::authorization::Principal;

pub const CALLER_HEADER: &str = "x-principal";

/// Principal making the request
#[derive(Debug, Clone)]
pub struct Caller(pub Principal);

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(CALLER_HEADER)
            .ok_or(ApiError::MissingCaller)?
            .to_str()
            .map_err(|_| ApiError::BadRequest("caller header is not valid text".to_string()))?
            .trim();

        if value.is_empty() {
            return Err(ApiError::MissingCaller);
        }
        Ok(Caller(Principal::new(value)))
    }
}
