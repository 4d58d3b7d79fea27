//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`
//! suffix) so that lexical order in SQL equals chronological order. Enums are
//! stored as their snake_case names; votes as the integers 1 and -1.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use quickdesk_core::{
  comment::Comment,
  ticket::{Ticket, TicketDetail, TicketStatus, TicketSummary},
  user::{Credentials, Role, User},
  vote::VoteValue,
};
use rusqlite::{Row, types::Type};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Enums ───────────────────────────────────────────────────────────────────

pub fn decode_status(s: &str) -> Result<TicketStatus> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown ticket status: {s:?}")))
}

pub fn decode_role(s: &str) -> Result<Role> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown role: {s:?}")))
}

pub fn decode_vote(v: Option<i64>) -> Result<Option<VoteValue>> {
  v.map(|v| VoteValue::try_from(v).map_err(|e| Error::Decode(e.to_string())))
    .transpose()
}

/// Parse a text column inside a connection closure, where only
/// `rusqlite::Error` can escape.
pub fn parse_column<T>(idx: usize, raw: &str) -> rusqlite::Result<T>
where
  T: FromStr,
  T::Err: std::error::Error + Send + Sync + 'static,
{
  raw
    .parse()
    .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

// ─── LIKE patterns ───────────────────────────────────────────────────────────

/// Wrap `text` for a substring `LIKE … ESCAPE '\'` match, treating `%` and
/// `_` in the user's text literally.
pub fn like_pattern(text: &str) -> String {
  let mut out = String::with_capacity(text.len() + 2);
  out.push('%');
  for c in text.chars() {
    if matches!(c, '%' | '_' | '\\') {
      out.push('\\');
    }
    out.push(c);
  }
  out.push('%');
  out
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Columns selected for a user, in order.
pub const USER_COLUMNS: &str = "u.user_id, u.name, u.email, u.role, u.created_at";

/// Raw values read from a `users` row.
pub struct RawUser {
  pub user_id:    i64,
  pub name:       String,
  pub email:      String,
  pub role:       String,
  pub created_at: String,
}

impl RawUser {
  /// Read [`USER_COLUMNS`] starting at column `at`.
  pub fn from_row(row: &Row<'_>, at: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:    row.get(at)?,
      name:       row.get(at + 1)?,
      email:      row.get(at + 2)?,
      role:       row.get(at + 3)?,
      created_at: row.get(at + 4)?,
    })
  }

  pub fn into_user(self) -> Result<User> {
    Ok(User {
      id:         self.user_id,
      name:       self.name,
      email:      self.email,
      role:       decode_role(&self.role)?,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// A user row plus its password hash.
pub struct RawCredentials {
  pub user:          RawUser,
  pub password_hash: String,
}

impl RawCredentials {
  pub fn into_credentials(self) -> Result<Credentials> {
    Ok(Credentials {
      user:          self.user.into_user()?,
      password_hash: self.password_hash,
    })
  }
}

/// Columns selected for a ticket, in order.
pub const TICKET_COLUMNS: &str = "t.ticket_id, t.subject, t.description, t.category_id, \
   t.created_by, t.assigned_to, t.status, t.attachment_path, t.vote_count, \
   t.created_at, t.updated_at";

/// Raw values read from a `tickets` row.
pub struct RawTicket {
  pub ticket_id:       i64,
  pub subject:         String,
  pub description:     String,
  pub category_id:     i64,
  pub created_by:      i64,
  pub assigned_to:     Option<i64>,
  pub status:          String,
  pub attachment_path: Option<String>,
  pub vote_count:      i64,
  pub created_at:      String,
  pub updated_at:      String,
}

impl RawTicket {
  /// Number of columns in [`TICKET_COLUMNS`].
  pub const WIDTH: usize = 11;

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      ticket_id:       row.get(0)?,
      subject:         row.get(1)?,
      description:     row.get(2)?,
      category_id:     row.get(3)?,
      created_by:      row.get(4)?,
      assigned_to:     row.get(5)?,
      status:          row.get(6)?,
      attachment_path: row.get(7)?,
      vote_count:      row.get(8)?,
      created_at:      row.get(9)?,
      updated_at:      row.get(10)?,
    })
  }

  pub fn into_ticket(self) -> Result<Ticket> {
    Ok(Ticket {
      id:              self.ticket_id,
      subject:         self.subject,
      description:     self.description,
      category_id:     self.category_id,
      created_by:      self.created_by,
      assigned_to:     self.assigned_to,
      status:          decode_status(&self.status)?,
      attachment_path: self.attachment_path,
      vote_count:      self.vote_count,
      created_at:      decode_dt(&self.created_at)?,
      updated_at:      decode_dt(&self.updated_at)?,
    })
  }
}

/// A ticket row joined with its display names and the viewer's vote.
pub struct RawTicketDetail {
  pub ticket:           RawTicket,
  pub category_name:    String,
  pub created_by_name:  String,
  pub assigned_to_name: Option<String>,
  pub my_vote:          Option<i64>,
}

impl RawTicketDetail {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    let at = RawTicket::WIDTH;
    Ok(Self {
      ticket:           RawTicket::from_row(row)?,
      category_name:    row.get(at)?,
      created_by_name:  row.get(at + 1)?,
      assigned_to_name: row.get(at + 2)?,
      my_vote:          row.get(at + 3)?,
    })
  }

  pub fn into_detail(self) -> Result<TicketDetail> {
    Ok(TicketDetail {
      ticket:           self.ticket.into_ticket()?,
      category_name:    self.category_name,
      created_by_name:  self.created_by_name,
      assigned_to_name: self.assigned_to_name,
      my_vote:          decode_vote(self.my_vote)?,
    })
  }
}

/// Raw values for one row of the ticket list.
pub struct RawTicketSummary {
  pub ticket_id:       i64,
  pub subject:         String,
  pub status:          String,
  pub category_id:     i64,
  pub category_name:   String,
  pub created_by:      i64,
  pub created_by_name: String,
  pub assigned_to:     Option<i64>,
  pub vote_count:      i64,
  pub my_vote:         Option<i64>,
  pub created_at:      String,
  pub updated_at:      String,
}

impl RawTicketSummary {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      ticket_id:       row.get(0)?,
      subject:         row.get(1)?,
      status:          row.get(2)?,
      category_id:     row.get(3)?,
      category_name:   row.get(4)?,
      created_by:      row.get(5)?,
      created_by_name: row.get(6)?,
      assigned_to:     row.get(7)?,
      vote_count:      row.get(8)?,
      my_vote:         row.get(9)?,
      created_at:      row.get(10)?,
      updated_at:      row.get(11)?,
    })
  }

  pub fn into_summary(self) -> Result<TicketSummary> {
    Ok(TicketSummary {
      id:              self.ticket_id,
      subject:         self.subject,
      status:          decode_status(&self.status)?,
      category_id:     self.category_id,
      category_name:   self.category_name,
      created_by:      self.created_by,
      created_by_name: self.created_by_name,
      assigned_to:     self.assigned_to,
      vote_count:      self.vote_count,
      my_vote:         decode_vote(self.my_vote)?,
      created_at:      decode_dt(&self.created_at)?,
      updated_at:      decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw values read from a `comments` row joined with its author.
pub struct RawComment {
  pub comment_id: i64,
  pub ticket_id:  i64,
  pub author_id:  i64,
  pub user_name:  String,
  pub message:    String,
  pub created_at: String,
}

impl RawComment {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      comment_id: row.get(0)?,
      ticket_id:  row.get(1)?,
      author_id:  row.get(2)?,
      user_name:  row.get(3)?,
      message:    row.get(4)?,
      created_at: row.get(5)?,
    })
  }

  pub fn into_comment(self) -> Result<Comment> {
    Ok(Comment {
      id:         self.comment_id,
      ticket_id:  self.ticket_id,
      user_id:    self.author_id,
      user_name:  self.user_name,
      message:    self.message,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn timestamps_sort_lexically() {
    let a = Utc.timestamp_opt(1_700_000_000, 5_000).unwrap();
    let b = Utc.timestamp_opt(1_700_000_000, 120_000_000).unwrap();
    let c = Utc.timestamp_opt(1_700_000_001, 0).unwrap();
    let (ea, eb, ec) = (encode_dt(a), encode_dt(b), encode_dt(c));
    assert!(ea < eb && eb < ec, "{ea} {eb} {ec}");
    assert_eq!(ea.len(), ec.len());
    assert_eq!(decode_dt(&eb).unwrap(), b);
  }

  #[test]
  fn like_pattern_escapes_wildcards() {
    assert_eq!(like_pattern("login"), "%login%");
    assert_eq!(like_pattern("100%_done\\"), "%100\\%\\_done\\\\%");
  }

  #[test]
  fn unknown_enum_values_are_decode_errors() {
    assert!(matches!(decode_status("pending"), Err(Error::Decode(_))));
    assert!(matches!(decode_role("root"), Err(Error::Decode(_))));
    assert!(matches!(decode_vote(Some(0)), Err(Error::Decode(_))));
    assert_eq!(decode_vote(None).unwrap(), None);
  }
}
