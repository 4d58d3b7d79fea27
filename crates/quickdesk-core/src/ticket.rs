//! Tickets and their status lifecycle.
//!
//! A ticket is the canonical record. Display fields such as the category or
//! creator name are never stored on it; the read models [`TicketSummary`] and
//! [`TicketDetail`] are assembled by the store with joins.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  category::CategoryId,
  user::UserId,
  vote::VoteValue,
};

pub type TicketId = i64;

/// Longest accepted subject line, in characters.
pub const MAX_SUBJECT_LEN: usize = 200;

// ─── Status ──────────────────────────────────────────────────────────────────

/// Where a ticket is in its lifecycle.
///
/// ```text
/// open ──▶ in_progress ──▶ resolved ──▶ closed
///  ▲                          │           │
///  └──────────────────────────┴───────────┘   (reopen)
/// ```
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
pub enum TicketStatus {
  #[default]
  Open,
  InProgress,
  Resolved,
  Closed,
}

impl TicketStatus {
  /// Whether the lifecycle allows moving from `self` to `to`.
  /// Staying in the same status is not a transition.
  pub fn can_transition_to(self, to: Self) -> bool {
    use TicketStatus::*;
    matches!(
      (self, to),
      (Open, InProgress)
        | (InProgress, Resolved)
        | (Resolved, Closed)
        | (Resolved, Open)
        | (Closed, Open)
    )
  }

  /// Like [`Self::can_transition_to`], but as an error.
  pub fn check_transition(self, to: Self) -> Result<()> {
    if self.can_transition_to(to) {
      Ok(())
    } else {
      Err(Error::InvalidTransition { from: self, to })
    }
  }

  /// Parse a filter value; an unknown status is a validation failure.
  pub fn parse_filter(raw: &str) -> Result<Self> {
    raw
      .trim()
      .parse()
      .map_err(|_| Error::validation(format!("unknown status {raw:?}")))
  }
}

// ─── Ticket ──────────────────────────────────────────────────────────────────

/// The canonical ticket record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
  pub id:              TicketId,
  pub subject:         String,
  pub description:     String,
  pub category_id:     CategoryId,
  pub created_by:      UserId,
  pub assigned_to:     Option<UserId>,
  pub status:          TicketStatus,
  /// Path under the `/uploads` prefix, stored verbatim.
  pub attachment_path: Option<String>,
  /// Signed sum of all current votes; maintained by the store.
  pub vote_count:      i64,
  pub created_at:      DateTime<Utc>,
  /// Refreshed by every mutation, including votes and comments.
  pub updated_at:      DateTime<Utc>,
}

/// Input to [`crate::store::HelpdeskStore::create_ticket`].
/// Status, vote count and timestamps are always set by the store.
#[derive(Debug, Clone)]
pub struct NewTicket {
  pub subject:         String,
  pub description:     String,
  pub category_id:     CategoryId,
  pub created_by:      UserId,
  pub attachment_path: Option<String>,
}

impl NewTicket {
  /// Trim text fields and reject empty ones. Whether `category_id` resolves
  /// is up to the store.
  pub fn validate(self) -> Result<Self> {
    let subject = self.subject.trim().to_owned();
    let description = self.description.trim().to_owned();

    if subject.is_empty() || description.is_empty() {
      return Err(Error::validation(
        "All fields except attachment are required.",
      ));
    }
    if subject.chars().count() > MAX_SUBJECT_LEN {
      return Err(Error::validation(format!(
        "Subject must be at most {MAX_SUBJECT_LEN} characters."
      )));
    }

    Ok(Self { subject, description, ..self })
  }
}

/// Parse the `category_id` form field. Empty means the field was left unset.
pub fn parse_category_id(raw: &str) -> Result<CategoryId> {
  let raw = raw.trim();
  if raw.is_empty() {
    return Err(Error::validation(
      "All fields except attachment are required.",
    ));
  }
  raw
    .parse::<CategoryId>()
    .ok()
    .filter(|id| *id > 0)
    .ok_or_else(|| Error::validation(format!("invalid category id {raw:?}")))
}

// ─── Read models ─────────────────────────────────────────────────────────────

/// One row of the ticket list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketSummary {
  pub id:              TicketId,
  pub subject:         String,
  pub status:          TicketStatus,
  pub category_id:     CategoryId,
  pub category_name:   String,
  pub created_by:      UserId,
  pub created_by_name: String,
  pub assigned_to:     Option<UserId>,
  pub vote_count:      i64,
  /// The viewing user's own vote, if any.
  pub my_vote:         Option<VoteValue>,
  pub created_at:      DateTime<Utc>,
  pub updated_at:      DateTime<Utc>,
}

/// A ticket with its display names resolved for the viewing user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketDetail {
  #[serde(flatten)]
  pub ticket:           Ticket,
  pub category_name:    String,
  pub created_by_name:  String,
  pub assigned_to_name: Option<String>,
  pub my_vote:          Option<VoteValue>,
}

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`crate::store::HelpdeskStore::list_tickets`].
#[derive(Debug, Clone, Default)]
pub struct TicketFilter {
  /// Exact status match.
  pub status:      Option<TicketStatus>,
  /// Case-insensitive substring over subject and description.
  pub search:      Option<String>,
  pub category_id: Option<CategoryId>,
  /// Restrict to tickets filed by this user.
  pub created_by:  Option<UserId>,
  pub limit:       Option<usize>,
  pub offset:      Option<usize>,
}

impl TicketFilter {
  pub const DEFAULT_LIMIT: usize = 100;
  pub const MAX_LIMIT: usize = 500;

  pub fn effective_limit(&self) -> usize {
    self
      .limit
      .unwrap_or(Self::DEFAULT_LIMIT)
      .clamp(1, Self::MAX_LIMIT)
  }

  /// The trimmed search text, or `None` when blank.
  pub fn search_text(&self) -> Option<&str> {
    self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use TicketStatus::*;

  #[test]
  fn forward_path_is_allowed() {
    assert!(Open.can_transition_to(InProgress));
    assert!(InProgress.can_transition_to(Resolved));
    assert!(Resolved.can_transition_to(Closed));
  }

  #[test]
  fn reopen_from_resolved_or_closed() {
    assert!(Resolved.can_transition_to(Open));
    assert!(Closed.can_transition_to(Open));
    assert!(!InProgress.can_transition_to(Open));
  }

  #[test]
  fn skipping_steps_is_rejected() {
    assert_eq!(
      Open.check_transition(Resolved),
      Err(Error::InvalidTransition { from: Open, to: Resolved })
    );
    assert!(!Open.can_transition_to(Closed));
    assert!(!Closed.can_transition_to(InProgress));
  }

  #[test]
  fn same_status_is_not_a_transition() {
    for s in [Open, InProgress, Resolved, Closed] {
      assert!(!s.can_transition_to(s), "{s} -> {s}");
    }
  }

  #[test]
  fn status_strings_match_the_wire_format() {
    assert_eq!(InProgress.as_ref(), "in_progress");
    assert_eq!(TicketStatus::parse_filter(" resolved ").unwrap(), Resolved);
    assert!(TicketStatus::parse_filter("done").is_err());
    assert_eq!(
      serde_json::to_string(&InProgress).unwrap(),
      "\"in_progress\""
    );
  }

  #[test]
  fn new_ticket_requires_subject_and_description() {
    let t = NewTicket {
      subject:         "  ".into(),
      description:     "printer is on fire".into(),
      category_id:     1,
      created_by:      1,
      attachment_path: None,
    };
    assert!(matches!(t.validate(), Err(Error::Validation(_))));
  }

  #[test]
  fn category_id_parsing() {
    assert_eq!(parse_category_id(" 7 ").unwrap(), 7);
    assert!(parse_category_id("").is_err());
    assert!(parse_category_id("0").is_err());
    assert!(parse_category_id("seven").is_err());
  }

  #[test]
  fn filter_limit_is_clamped() {
    let f = TicketFilter { limit: Some(10_000), ..Default::default() };
    assert_eq!(f.effective_limit(), TicketFilter::MAX_LIMIT);
    assert_eq!(TicketFilter::default().effective_limit(), 100);
  }

  #[test]
  fn blank_search_is_no_search() {
    let f = TicketFilter { search: Some("   ".into()), ..Default::default() };
    assert_eq!(f.search_text(), None);
  }
}
