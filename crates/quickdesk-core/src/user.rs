//! Users, roles, and the authenticated identity carried by every request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub type UserId = i64;

/// Minimum accepted password length, in characters.
pub const MIN_PASSWORD_LEN: usize = 6;

/// What a user is allowed to do. New accounts start as [`Role::Requester`].
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
  #[default]
  Requester,
  Agent,
  Admin,
}

impl Role {
  /// Agents and admins work tickets; requesters only file them.
  pub fn is_staff(self) -> bool { matches!(self, Self::Agent | Self::Admin) }
}

/// A registered account. The password hash never leaves the store except
/// through [`Credentials`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub id:         UserId,
  pub name:       String,
  pub email:      String,
  pub role:       Role,
  pub created_at: DateTime<Utc>,
}

/// A user together with their stored password hash, for login.
#[derive(Debug, Clone)]
pub struct Credentials {
  pub user:          User,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
}

/// The identity resolved from a bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
  pub user_id: UserId,
  pub role:    Role,
}

impl From<&User> for Actor {
  fn from(user: &User) -> Self { Self { user_id: user.id, role: user.role } }
}

/// Emails compare case-insensitively; store and look them up in this form.
pub fn normalize_email(email: &str) -> String { email.trim().to_lowercase() }

// ─── Registration ────────────────────────────────────────────────────────────

/// Raw sign-up input, before hashing.
#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
  pub name:     String,
  pub email:    String,
  pub password: String,
}

impl Registration {
  /// Check required fields and normalise name and email.
  pub fn validate(self) -> Result<Self> {
    let name = self.name.trim().to_owned();
    let email = normalize_email(&self.email);

    if name.is_empty() || email.is_empty() || self.password.is_empty() {
      return Err(Error::validation("All fields are required."));
    }
    if !email.contains('@') {
      return Err(Error::validation("A valid email address is required."));
    }
    if self.password.chars().count() < MIN_PASSWORD_LEN {
      return Err(Error::validation(format!(
        "Password must be at least {MIN_PASSWORD_LEN} characters."
      )));
    }

    Ok(Self { name, email, password: self.password })
  }
}

/// Input to [`crate::store::HelpdeskStore::create_user`].
#[derive(Debug, Clone)]
pub struct NewUser {
  pub name:          String,
  pub email:         String,
  pub password_hash: String,
  pub role:          Role,
}
