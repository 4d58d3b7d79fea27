//! JSON REST API for QuickDesk.
//!
//! Exposes an axum [`Router`] backed by any
//! [`quickdesk_core::store::HelpdeskStore`] and
//! [`quickdesk_core::attachment::AttachmentStorage`]. TLS, static files and
//! the fallback for unknown paths are the caller's responsibility; a known
//! path with an unsupported method is answered here with
//! [`endpoint_not_found`].
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", quickdesk_api::api_router(state.clone()))
//! ```

pub mod accounts;
pub mod auth;
pub mod categories;
pub mod comments;
pub mod error;
pub mod extract;
pub mod tickets;
pub mod token;
pub mod votes;

use std::sync::Arc;

use axum::{
  Router,
  extract::FromRef,
  routing::{get, patch, post},
};
use quickdesk_core::{attachment::AttachmentStorage, store::HelpdeskStore};

pub use auth::Authenticated;
pub use error::{ApiError, ErrorDetail, reveal_error_detail};
pub use token::{IssuedToken, TokenError, TokenKeys};

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all API handlers.
pub struct AppState<S, A> {
  pub store:       Arc<S>,
  pub attachments: Arc<A>,
  pub tokens:      Arc<TokenKeys>,
}

impl<S, A> AppState<S, A> {
  pub fn new(store: S, attachments: A, tokens: TokenKeys) -> Self {
    Self {
      store:       Arc::new(store),
      attachments: Arc::new(attachments),
      tokens:      Arc::new(tokens),
    }
  }
}

// Not derived: the derive would demand `S: Clone` and `A: Clone`.
impl<S, A> Clone for AppState<S, A> {
  fn clone(&self) -> Self {
    Self {
      store:       Arc::clone(&self.store),
      attachments: Arc::clone(&self.attachments),
      tokens:      Arc::clone(&self.tokens),
    }
  }
}

impl<S, A> FromRef<AppState<S, A>> for Arc<TokenKeys> {
  fn from_ref(state: &AppState<S, A>) -> Self { Arc::clone(&state.tokens) }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, A>(state: AppState<S, A>) -> Router<()>
where
  S: HelpdeskStore + 'static,
  A: AttachmentStorage + 'static,
{
  Router::new()
    // Accounts
    .route("/auth/register", post(accounts::register::<S, A>))
    .route("/auth/login", post(accounts::login::<S, A>))
    .route("/users/me", get(accounts::me::<S, A>))
    .route("/users/{id}/role", patch(accounts::set_role::<S, A>))
    // Categories
    .route(
      "/categories",
      get(categories::list::<S, A>).post(categories::create::<S, A>),
    )
    // Tickets
    .route("/tickets", get(tickets::list::<S, A>).post(tickets::create::<S, A>))
    .route(
      "/tickets/{id}",
      get(tickets::get_one::<S, A>).delete(tickets::delete_one::<S, A>),
    )
    .route("/tickets/{id}/status", patch(tickets::update_status::<S, A>))
    .route("/tickets/{id}/assignee", patch(tickets::assign::<S, A>))
    // Votes
    .route("/tickets/{id}/vote", post(votes::cast::<S, A>))
    // Comments
    .route(
      "/tickets/{id}/comments",
      get(comments::list::<S, A>).post(comments::create::<S, A>),
    )
    // Must follow the routes: it only applies to routes already added.
    .method_not_allowed_fallback(endpoint_not_found)
    .with_state(state)
}

/// Answer for a request no route accepts, whatever its method.
pub async fn endpoint_not_found() -> ApiError { ApiError::NotFound("Endpoint not found".into()) }
