//! Error types for `quickdesk-core`.
//!
//! These are the domain failures every backend reports in the same shape, so
//! the HTTP layer can map them to status codes without knowing which store
//! produced them.

use thiserror::Error;

use crate::ticket::TicketStatus;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
  /// Malformed or missing input.
  #[error("{0}")]
  Validation(String),

  /// An identifier that does not resolve, e.g. `"ticket 42"`.
  #[error("{0} not found")]
  NotFound(String),

  /// A uniqueness rule would be broken (duplicate email, category name).
  #[error("{0}")]
  Conflict(String),

  #[error("cannot move a ticket from {from} to {to}")]
  InvalidTransition {
    from: TicketStatus,
    to:   TicketStatus,
  },

  /// Authenticated, but the actor's role does not allow the action.
  #[error("{0}")]
  Forbidden(String),
}

impl Error {
  pub fn validation(msg: impl Into<String>) -> Self { Self::Validation(msg.into()) }

  pub fn not_found(what: impl Into<String>) -> Self { Self::NotFound(what.into()) }

  pub fn forbidden(msg: impl Into<String>) -> Self { Self::Forbidden(msg.into()) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
