//! The `HelpdeskStore` trait.
//!
//! The trait is implemented by storage backends (e.g.
//! `quickdesk-store-sqlite`). Higher layers (`quickdesk-api`,
//! `quickdesk-server`) depend on this abstraction, not on any concrete
//! backend.

use std::future::Future;

use crate::{
  category::Category,
  comment::{Comment, NewComment},
  ticket::{NewTicket, Ticket, TicketDetail, TicketFilter, TicketId, TicketStatus, TicketSummary},
  user::{Credentials, NewUser, Role, User, UserId},
  vote::{VoteOutcome, VoteValue},
};

// ─── Error classification ────────────────────────────────────────────────────

/// Lets callers tell domain failures and timeouts apart from opaque storage
/// faults without knowing the backend's error type.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  /// The domain failure this error carries, if it is one.
  fn domain(&self) -> Option<&crate::Error>;

  /// Whether the operation ran past the store's deadline.
  fn is_timeout(&self) -> bool;
}

impl StoreError for std::convert::Infallible {
  fn domain(&self) -> Option<&crate::Error> { match *self {} }

  fn is_timeout(&self) -> bool { match *self {} }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a QuickDesk storage backend.
///
/// Each method is all-or-nothing: a failed call leaves no partial mutation
/// behind. Vote and status changes must be atomic with respect to concurrent
/// calls on the same ticket.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait HelpdeskStore: Send + Sync {
  type Error: StoreError;

  // ── Users ─────────────────────────────────────────────────────────────

  /// Persist a new account. Fails with `Conflict` if the email is taken.
  fn create_user(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  /// Look up a user and password hash by (normalised) email.
  fn find_credentials(
    &self,
    email: String,
  ) -> impl Future<Output = Result<Option<Credentials>, Self::Error>> + Send + '_;

  fn get_user(
    &self,
    id: UserId,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// Change a user's role. Fails with `NotFound` for an unknown user.
  fn set_role(
    &self,
    id: UserId,
    role: Role,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  // ── Categories ────────────────────────────────────────────────────────

  /// All categories, ordered by name.
  fn list_categories(
    &self,
  ) -> impl Future<Output = Result<Vec<Category>, Self::Error>> + Send + '_;

  /// Create a category. Fails with `Conflict` if the name is taken.
  fn create_category(
    &self,
    name: String,
  ) -> impl Future<Output = Result<Category, Self::Error>> + Send + '_;

  /// Return the category with this name, creating it if absent.
  fn ensure_category(
    &self,
    name: String,
  ) -> impl Future<Output = Result<Category, Self::Error>> + Send + '_;

  // ── Tickets ───────────────────────────────────────────────────────────

  /// Create a ticket in status `open` with no votes. Fails with
  /// `Validation` if the category does not resolve.
  fn create_ticket(
    &self,
    input: NewTicket,
  ) -> impl Future<Output = Result<Ticket, Self::Error>> + Send + '_;

  /// Tickets matching `filter`, most recently updated first (ties broken by
  /// id, descending). `viewer` determines `my_vote`.
  fn list_tickets(
    &self,
    filter: TicketFilter,
    viewer: UserId,
  ) -> impl Future<Output = Result<Vec<TicketSummary>, Self::Error>> + Send + '_;

  /// A single ticket with display names resolved. `None` if not found.
  fn get_ticket(
    &self,
    id: TicketId,
    viewer: UserId,
  ) -> impl Future<Output = Result<Option<TicketDetail>, Self::Error>> + Send + '_;

  /// Move a ticket to `to`, compare-and-set against its current status.
  ///
  /// Fails with `NotFound` or `InvalidTransition`. When `claim` is set and
  /// the ticket is unassigned, it is assigned to that user in the same
  /// update.
  fn update_status(
    &self,
    id: TicketId,
    to: TicketStatus,
    claim: Option<UserId>,
  ) -> impl Future<Output = Result<Ticket, Self::Error>> + Send + '_;

  /// Set or clear the assignee. Fails with `NotFound` for an unknown ticket
  /// and `Validation` for an unknown or non-staff assignee.
  fn assign_ticket(
    &self,
    id: TicketId,
    assignee: Option<UserId>,
  ) -> impl Future<Output = Result<Ticket, Self::Error>> + Send + '_;

  /// Delete a ticket with its votes and comments. Returns the removed
  /// ticket, or `None` if it did not exist.
  fn delete_ticket(
    &self,
    id: TicketId,
  ) -> impl Future<Output = Result<Option<Ticket>, Self::Error>> + Send + '_;

  // ── Votes ─────────────────────────────────────────────────────────────

  /// Record `user`'s vote on a ticket and return the new aggregate.
  ///
  /// A repeated vote replaces the previous one; resubmitting the same value
  /// is a no-op. Fails with `NotFound` for an unknown ticket.
  fn cast_vote(
    &self,
    ticket_id: TicketId,
    user_id: UserId,
    value: VoteValue,
  ) -> impl Future<Output = Result<VoteOutcome, Self::Error>> + Send + '_;

  // ── Comments ──────────────────────────────────────────────────────────

  /// Append a comment and refresh the ticket's `updated_at`.
  /// Fails with `NotFound` for an unknown ticket.
  fn add_comment(
    &self,
    input: NewComment,
  ) -> impl Future<Output = Result<Comment, Self::Error>> + Send + '_;

  /// The ticket's thread in posting order. Fails with `NotFound` for an
  /// unknown ticket.
  fn list_comments(
    &self,
    ticket_id: TicketId,
  ) -> impl Future<Output = Result<Vec<Comment>, Self::Error>> + Send + '_;
}
