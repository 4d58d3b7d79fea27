//! Handlers for accounts: registration, login, and role management.
//!
//! | Method  | Path | Notes |
//! |---------|------|-------|
//! | `POST`  | `/auth/register` | Body: `{"name", "email", "password"}` |
//! | `POST`  | `/auth/login` | Body: `{"email", "password"}` |
//! | `GET`   | `/users/me` | The caller's own account |
//! | `PATCH` | `/users/:id/role` | Admin only. Body: `{"role":"agent"}` |

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use axum::{
  Json,
  extract::State,
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use quickdesk_core::{
  attachment::AttachmentStorage,
  authz,
  store::HelpdeskStore,
  user::{Actor, NewUser, Registration, Role, User, UserId},
};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
  AppState,
  auth::Authenticated,
  error::ApiError,
  extract::{ApiJson, ApiPath},
};

const INVALID_LOGIN: &str = "Invalid email or password.";

// ─── Password hashing ────────────────────────────────────────────────────────

/// Hash `password` with argon2 and a fresh random salt, off the async
/// runtime.
pub async fn hash_password(password: String) -> Result<String, ApiError> {
  tokio::task::spawn_blocking(move || {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .map(|hash| hash.to_string())
  })
  .await
  .map_err(|e| ApiError::Internal(format!("hashing task failed: {e}")))?
  .map_err(|e| ApiError::Internal(format!("password hashing failed: {e}")))
}

async fn verify_password(password: String, hash: String) -> Result<bool, ApiError> {
  tokio::task::spawn_blocking(move || {
    let Ok(parsed) = PasswordHash::new(&hash) else {
      return false;
    };
    Argon2::default()
      .verify_password(password.as_bytes(), &parsed)
      .is_ok()
  })
  .await
  .map_err(|e| ApiError::Internal(format!("hashing task failed: {e}")))
}

// ─── Register ────────────────────────────────────────────────────────────────

/// `POST /auth/register`
pub async fn register<S, A>(
  State(state): State<AppState<S, A>>,
  ApiJson(body): ApiJson<Registration>,
) -> Result<impl IntoResponse, ApiError>
where
  S: HelpdeskStore + 'static,
  A: AttachmentStorage + 'static,
{
  let registration = body.validate()?;
  let password_hash = hash_password(registration.password).await?;

  let user = state
    .store
    .create_user(NewUser {
      name: registration.name,
      email: registration.email,
      password_hash,
      role: Role::Requester,
    })
    .await
    .map_err(ApiError::store)?;

  tracing::info!(user_id = user.id, "user registered");
  Ok((
    StatusCode::CREATED,
    Json(json!({ "message": "Registration successful.", "user": user })),
  ))
}

// ─── Login ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LoginBody {
  pub email:    String,
  pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
  pub token:      String,
  pub expires_at: DateTime<Utc>,
  pub user:       User,
}

/// `POST /auth/login`
pub async fn login<S, A>(
  State(state): State<AppState<S, A>>,
  ApiJson(body): ApiJson<LoginBody>,
) -> Result<Json<LoginResponse>, ApiError>
where
  S: HelpdeskStore + 'static,
  A: AttachmentStorage + 'static,
{
  if body.email.trim().is_empty() || body.password.is_empty() {
    return Err(ApiError::Validation("All fields are required.".into()));
  }

  let credentials = state
    .store
    .find_credentials(body.email.clone())
    .await
    .map_err(ApiError::store)?;

  let Some(credentials) = credentials else {
    tracing::warn!(email = %body.email.trim(), "login for unknown email");
    return Err(ApiError::Unauthorized(INVALID_LOGIN.into()));
  };
  if !verify_password(body.password, credentials.password_hash).await? {
    tracing::warn!(user_id = credentials.user.id, "login with wrong password");
    return Err(ApiError::Unauthorized(INVALID_LOGIN.into()));
  }

  let user = credentials.user;
  let issued = state
    .tokens
    .issue(Actor::from(&user), Utc::now())
    .map_err(|e| ApiError::Internal(format!("issuing token failed: {e}")))?;
  tracing::info!(user_id = user.id, "user logged in");

  Ok(Json(LoginResponse {
    token: issued.token,
    expires_at: issued.expires_at,
    user,
  }))
}

// ─── Me ──────────────────────────────────────────────────────────────────────

/// `GET /users/me`
pub async fn me<S, A>(
  Authenticated(actor): Authenticated,
  State(state): State<AppState<S, A>>,
) -> Result<Json<User>, ApiError>
where
  S: HelpdeskStore + 'static,
  A: AttachmentStorage + 'static,
{
  let user = state
    .store
    .get_user(actor.user_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
  Ok(Json(user))
}

// ─── Role ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RoleBody {
  pub role: Role,
}

/// `PATCH /users/:id/role`, body `{"role":"agent"}`
pub async fn set_role<S, A>(
  Authenticated(actor): Authenticated,
  State(state): State<AppState<S, A>>,
  ApiPath(id): ApiPath<UserId>,
  ApiJson(body): ApiJson<RoleBody>,
) -> Result<Json<User>, ApiError>
where
  S: HelpdeskStore + 'static,
  A: AttachmentStorage + 'static,
{
  authz::require_admin(&actor, "change roles")?;
  let user = state
    .store
    .set_role(id, body.role)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(user))
}
