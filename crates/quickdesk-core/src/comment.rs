//! Comments: the append-only discussion thread on a ticket.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, ticket::TicketId, user::UserId};

pub type CommentId = i64;

/// Longest accepted comment, in characters.
pub const MAX_MESSAGE_LEN: usize = 5000;

/// A posted comment. Never updated or deleted, except by ticket cascade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
  /// Monotonically increasing; the thread is ordered by it.
  pub id:         CommentId,
  pub ticket_id:  TicketId,
  pub user_id:    UserId,
  /// Author display name, resolved by join.
  pub user_name:  String,
  pub message:    String,
  pub created_at: DateTime<Utc>,
}

/// Input to [`crate::store::HelpdeskStore::add_comment`].
#[derive(Debug, Clone)]
pub struct NewComment {
  pub ticket_id: TicketId,
  pub author_id: UserId,
  pub message:   String,
}

impl NewComment {
  /// Trim the message; reject it when nothing is left or it is too long.
  pub fn validate(self) -> Result<Self> {
    let message = self.message.trim().to_owned();
    if message.is_empty() {
      return Err(Error::validation("Comment cannot be empty."));
    }
    if message.chars().count() > MAX_MESSAGE_LEN {
      return Err(Error::validation(format!(
        "Comment must be at most {MAX_MESSAGE_LEN} characters."
      )));
    }
    Ok(Self { message, ..self })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn comment(message: &str) -> NewComment {
    NewComment { ticket_id: 1, author_id: 1, message: message.into() }
  }

  #[test]
  fn whitespace_only_is_empty() {
    assert_eq!(
      comment(" \n\t ").validate().unwrap_err(),
      Error::validation("Comment cannot be empty.")
    );
  }

  #[test]
  fn message_is_trimmed() {
    assert_eq!(comment("  thanks!  ").validate().unwrap().message, "thanks!");
  }

  #[test]
  fn overlong_message_rejected() {
    let long = "x".repeat(MAX_MESSAGE_LEN + 1);
    assert!(comment(&long).validate().is_err());
  }
}
