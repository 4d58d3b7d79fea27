//! Bearer-token extractor.
//!
//! Handlers that take [`Authenticated`] as their first argument never run,
//! and never reach the store, unless the request carries a valid token.

use std::sync::Arc;

use axum::{
  extract::{FromRef, FromRequestParts},
  http::{HeaderMap, header, request::Parts},
};
use chrono::Utc;
use quickdesk_core::user::Actor;

use crate::{error::ApiError, token::TokenKeys};

/// The verified identity behind a request.
#[derive(Debug, Clone, Copy)]
pub struct Authenticated(pub Actor);

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
  let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
  let (scheme, token) = value.split_once(' ')?;
  scheme.eq_ignore_ascii_case("bearer").then(|| token.trim())
}

/// Resolve the request's bearer token to an [`Actor`].
pub fn verify_bearer(headers: &HeaderMap, keys: &TokenKeys) -> Result<Actor, ApiError> {
  let token = bearer_token(headers)
    .filter(|t| !t.is_empty())
    .ok_or_else(|| ApiError::Unauthorized("Authentication required.".into()))?;

  keys.verify(token, Utc::now()).map_err(|e| {
    tracing::debug!(error = %e, "bearer token rejected");
    ApiError::Unauthorized("Invalid or expired token.".into())
  })
}

impl<St> FromRequestParts<St> for Authenticated
where
  St: Send + Sync,
  Arc<TokenKeys>: FromRef<St>,
{
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, state: &St) -> Result<Self, Self::Rejection> {
    let keys = Arc::<TokenKeys>::from_ref(state);
    verify_bearer(&parts.headers, &keys).map(Authenticated)
  }
}
