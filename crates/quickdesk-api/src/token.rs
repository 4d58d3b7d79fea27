//! Self-verifying bearer tokens.
//!
//! A token is `<claims>.<signature>`: the claims are base64url JSON
//! (`{"sub", "role", "exp"}`), the signature is the hex HMAC-SHA256 of the
//! encoded claims under the server secret. Verification needs only the
//! secret, never the store.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD as B64};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use quickdesk_core::user::{Actor, Role, UserId};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
  #[error("token secret must not be empty")]
  EmptySecret,

  #[error("malformed token")]
  Malformed,

  #[error("bad token signature")]
  BadSignature,

  #[error("token expired")]
  Expired,

  #[error("cannot encode token claims: {0}")]
  Encode(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
  sub:  UserId,
  role: Role,
  exp:  i64,
}

/// A freshly issued token and the instant it stops being accepted.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
  pub token:      String,
  pub expires_at: DateTime<Utc>,
}

/// Issues and verifies bearer tokens under one secret.
#[derive(Clone)]
pub struct TokenKeys {
  mac: HmacSha256,
  ttl: Duration,
}

impl TokenKeys {
  pub const DEFAULT_TTL_HOURS: i64 = 24;

  pub fn new(secret: impl AsRef<[u8]>, ttl: Duration) -> Result<Self, TokenError> {
    let secret = secret.as_ref();
    if secret.is_empty() {
      return Err(TokenError::EmptySecret);
    }
    let mac = HmacSha256::new_from_slice(secret).map_err(|_| TokenError::EmptySecret)?;
    Ok(Self { mac, ttl })
  }

  pub fn ttl(&self) -> Duration { self.ttl }

  fn sign(&self, payload: &str) -> HmacSha256 {
    let mut mac = self.mac.clone();
    mac.update(payload.as_bytes());
    mac
  }

  pub fn issue(&self, actor: Actor, now: DateTime<Utc>) -> Result<IssuedToken, TokenError> {
    let expires_at = now + self.ttl;
    let claims = Claims {
      sub:  actor.user_id,
      role: actor.role,
      exp:  expires_at.timestamp(),
    };
    let json = serde_json::to_vec(&claims).map_err(|e| TokenError::Encode(e.to_string()))?;
    let payload = B64.encode(json);
    let signature = hex::encode(self.sign(&payload).finalize().into_bytes());

    Ok(IssuedToken {
      token: format!("{payload}.{signature}"),
      expires_at,
    })
  }

  /// Check the signature first, then the expiry.
  pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Actor, TokenError> {
    let (payload, signature) = token.split_once('.').ok_or(TokenError::Malformed)?;
    let signature = hex::decode(signature).map_err(|_| TokenError::Malformed)?;

    self
      .sign(payload)
      .verify_slice(&signature)
      .map_err(|_| TokenError::BadSignature)?;

    let json = B64.decode(payload).map_err(|_| TokenError::Malformed)?;
    let claims: Claims = serde_json::from_slice(&json).map_err(|_| TokenError::Malformed)?;

    if now.timestamp() >= claims.exp {
      return Err(TokenError::Expired);
    }
    Ok(Actor { user_id: claims.sub, role: claims.role })
  }
}
